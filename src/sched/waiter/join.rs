//! Espera de término de outra thread (join).

use super::{settle, Deadline, WaitContext, WaitStatus, WaitSubject};
use crate::sys::types::Tid;

pub struct JoinWaiter {
    target: Tid,
    deadline: Deadline,
    outcome: Option<WaitStatus>,
}

impl JoinWaiter {
    pub fn new(target: Tid, deadline: Deadline) -> Self {
        Self {
            target,
            deadline,
            outcome: None,
        }
    }

    pub fn target(&self) -> Tid {
        self.target
    }

    pub fn check(&mut self, ctx: &WaitContext<'_>, subject: WaitSubject) -> bool {
        let target = self.target;
        settle(&mut self.outcome, subject, self.deadline, ctx.now, || {
            !ctx.liveness.is_alive(target)
        })
    }

    pub fn finish(self) -> WaitStatus {
        self.outcome.unwrap_or(WaitStatus::Interrupted)
    }
}
