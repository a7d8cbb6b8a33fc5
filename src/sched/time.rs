//! Relógio monotônico do núcleo de tasking.
//!
//! Milissegundos desde o boot. Avançado apenas pelo tick do núcleo de boot;
//! lido por todos os waiters com prazo.

use core::sync::atomic::{AtomicU64, Ordering};

pub struct Clock {
    millis: AtomicU64,
}

impl Clock {
    pub const fn new() -> Self {
        Self {
            millis: AtomicU64::new(0),
        }
    }

    /// Avança o relógio. Chamado pelo handler do timer.
    #[inline]
    pub fn update_milliseconds(&self, delta: u64) -> u64 {
        self.millis.fetch_add(delta, Ordering::Relaxed) + delta
    }

    /// Milissegundos desde o boot
    #[inline]
    pub fn millis(&self) -> u64 {
        self.millis.load(Ordering::Relaxed)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// Prazo absoluto a partir de um timeout relativo
#[inline]
pub fn deadline_after(now: u64, timeout_ms: Option<u64>) -> Option<u64> {
    timeout_ms.map(|timeout| now.saturating_add(timeout))
}
