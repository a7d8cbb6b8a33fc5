//! Operações atômicas

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Wrapper para AtomicBool com API mais limpa
pub struct AtomicFlag(AtomicBool);

impl AtomicFlag {
    pub const fn new(value: bool) -> Self {
        Self(AtomicBool::new(value))
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set(&self, value: bool) {
        self.0.store(value, Ordering::Release);
    }

    /// Test-and-set: retorna valor anterior
    pub fn test_and_set(&self) -> bool {
        self.0.swap(true, Ordering::AcqRel)
    }

    /// Consome o flag: retorna valor anterior e deixa `false`
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Contador atômico (geração de IDs, estatísticas)
pub struct AtomicCounter(AtomicU64);

impl AtomicCounter {
    pub const fn new(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Incrementa e retorna o valor anterior
    pub fn inc(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel)
    }

    pub fn add(&self, value: u64) -> u64 {
        self.0.fetch_add(value, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_returns_previous_value() {
        let counter = AtomicCounter::new(1);
        assert_eq!(counter.inc(), 1);
        assert_eq!(counter.inc(), 2);
        assert_eq!(counter.add(10), 3);
        assert_eq!(counter.get(), 13);
    }

    #[test]
    fn flag_test_and_set_reports_old_state() {
        let flag = AtomicFlag::new(false);
        assert!(!flag.test_and_set());
        assert!(flag.test_and_set());
        assert!(flag.take());
        assert!(!flag.get());
        assert!(!flag.take());
    }
}
