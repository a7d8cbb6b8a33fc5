//! Espera de send bloqueante.
//!
//! Estacionada quando a mailbox de destino está cheia; o check reenvia o
//! payload (que o waiter possui) até que o status deixe de ser `QueueFull`.

use super::{Deadline, WaitContext, WaitResult, WaitStatus, WaitSubject};
use crate::ipc::SendStatus;
use crate::sys::types::{Tid, TransactionId};
use alloc::vec::Vec;

pub struct SendWaiter {
    target: Tid,
    transaction: TransactionId,
    payload: Vec<u8>,
    deadline: Deadline,
    status: SendStatus,
    outcome: Option<WaitStatus>,
}

impl SendWaiter {
    pub fn new(target: Tid, transaction: TransactionId, payload: Vec<u8>, deadline: Deadline) -> Self {
        Self {
            target,
            transaction,
            payload,
            deadline,
            status: SendStatus::QueueFull,
            outcome: None,
        }
    }

    pub fn check(&mut self, ctx: &WaitContext<'_>, subject: WaitSubject) -> bool {
        if self.outcome.is_some() {
            return false;
        }

        if subject.interrupted {
            self.outcome = Some(WaitStatus::Interrupted);
            return false;
        }

        self.status = ctx.messages.send_if_alive(
            self.target,
            subject.tid,
            &self.payload,
            self.transaction,
            |tid| ctx.liveness.is_alive(tid),
        );
        if self.status != SendStatus::QueueFull {
            self.outcome = Some(WaitStatus::Completed);
            return false;
        }

        if self.deadline.expired(ctx.now) {
            self.outcome = Some(WaitStatus::TimedOut);
            return false;
        }
        true
    }

    pub fn finish(self) -> WaitResult {
        WaitResult::Send {
            status: self.status,
            wait: self.outcome.unwrap_or(WaitStatus::Interrupted),
        }
    }
}
