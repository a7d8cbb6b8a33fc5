//! Sleep explícito: só o prazo (ou um sinal) acorda a thread.

use super::{settle, Deadline, WaitContext, WaitStatus, WaitSubject};

pub struct SleepWaiter {
    until: u64,
    outcome: Option<WaitStatus>,
}

impl SleepWaiter {
    pub fn new(until: u64) -> Self {
        Self {
            until,
            outcome: None,
        }
    }

    pub fn check(&mut self, ctx: &WaitContext<'_>, subject: WaitSubject) -> bool {
        let until = self.until;
        settle(&mut self.outcome, subject, Deadline::NEVER, ctx.now, || {
            ctx.now >= until
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
    fn wakes_at_deadline() {
        let fixture = Fixture::new(&[]);
        let mut waiter = SleepWaiter::new(30);
        assert!(waiter.check(&fixture.at(29), subject(1)));
        assert!(!waiter.check(&fixture.at(30), subject(1)));
        assert_eq!(waiter.finish(), WaitStatus::Completed);
    }
}
