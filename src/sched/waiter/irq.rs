//! Espera de IRQ.
//!
//! O handler de interrupção marca a IRQ como pendente em `IrqTable::fire`;
//! o check de um waiter consome a marca.

use super::{settle, Deadline, WaitContext, WaitStatus, WaitSubject};
use crate::sync::AtomicFlag;

/// Linhas de IRQ rastreadas
pub const IRQ_COUNT: usize = 64;

/// IRQs disparadas e ainda não consumidas
pub struct IrqTable {
    pending: [AtomicFlag; IRQ_COUNT],
}

impl IrqTable {
    pub const fn new() -> Self {
        const CLEAR: AtomicFlag = AtomicFlag::new(false);
        Self {
            pending: [CLEAR; IRQ_COUNT],
        }
    }

    /// Marca `irq` como disparada. Retorna `false` se fora do intervalo.
    pub fn fire(&self, irq: u8) -> bool {
        match self.pending.get(irq as usize) {
            Some(flag) => {
                flag.set(true);
                true
            }
            None => false,
        }
    }

    /// Consome a marca de `irq`
    pub fn take(&self, irq: u8) -> bool {
        self.pending
            .get(irq as usize)
            .map_or(false, |flag| flag.take())
    }

    pub fn is_pending(&self, irq: u8) -> bool {
        self.pending
            .get(irq as usize)
            .map_or(false, |flag| flag.get())
    }
}

impl Default for IrqTable {
    fn default() -> Self {
        Self::new()
    }
}

pub struct IrqWaiter {
    irq: u8,
    deadline: Deadline,
    outcome: Option<WaitStatus>,
}

impl IrqWaiter {
    pub fn new(irq: u8, deadline: Deadline) -> Self {
        Self {
            irq,
            deadline,
            outcome: None,
        }
    }

    pub fn check(&mut self, ctx: &WaitContext<'_>, subject: WaitSubject) -> bool {
        let irq = self.irq;
        settle(&mut self.outcome, subject, self.deadline, ctx.now, || {
            ctx.irqs.take(irq)
        })
    }

    pub fn finish(self) -> WaitStatus {
        self.outcome.unwrap_or(WaitStatus::Interrupted)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{subject, Fixture};
    use super::*;

    #[test]
    fn fired_irq_is_consumed_once() {
        let fixture = Fixture::new(&[]);
        let mut first = IrqWaiter::new(1, Deadline::NEVER);
        let mut second = IrqWaiter::new(1, Deadline::NEVER);

        assert!(first.check(&fixture.at(0), subject(3)));
        assert!(fixture.irqs.fire(1));
        assert!(!first.check(&fixture.at(1), subject(3)));
        assert!(second.check(&fixture.at(1), subject(4)));
        assert_eq!(first.finish(), WaitStatus::Completed);
        assert!(!fixture.irqs.is_pending(1));
    }

    #[test]
    fn out_of_range_irq_is_ignored() {
        let table = IrqTable::new();
        assert!(!table.fire(IRQ_COUNT as u8));
        assert!(!table.take(IRQ_COUNT as u8));
    }
}
