//! Espera de receive de mensagem.
//!
//! O check chama o `receive` não bloqueante do controller. Sinal pendente
//! quebra a espera antes de qualquer tentativa.

use super::{Deadline, WaitContext, WaitResult, WaitSubject};
use crate::ipc::{receive_buffer_len, ReceiveStatus};
use crate::sys::types::{Tid, TransactionId};
use alloc::vec;
use alloc::vec::Vec;

pub struct ReceiveWaiter {
    mailbox: Tid,
    transaction: TransactionId,
    buffer: Vec<u8>,
    deadline: Deadline,
    status: Option<ReceiveStatus>,
}

impl ReceiveWaiter {
    /// `max_len` inclui o header e é limitado a `MAX_FRAME_SIZE`.
    pub fn new(mailbox: Tid, transaction: TransactionId, max_len: usize, deadline: Deadline) -> Self {
        Self {
            mailbox,
            transaction,
            buffer: vec![0u8; receive_buffer_len(max_len)],
            deadline,
            status: None,
        }
    }

    pub fn check(&mut self, ctx: &WaitContext<'_>, subject: WaitSubject) -> bool {
        if self.status.is_some() {
            return false;
        }

        if subject.interrupted {
            self.status = Some(ReceiveStatus::Interrupted);
            return false;
        }

        match ctx
            .messages
            .receive(self.mailbox, &mut self.buffer, self.transaction)
        {
            ReceiveStatus::QueueEmpty if !self.deadline.expired(ctx.now) => true,
            ReceiveStatus::QueueEmpty => {
                crate::ktrace!("(Waiter) Receive expirou TID=", subject.tid.as_u32());
                self.status = Some(ReceiveStatus::TimedOut);
                false
            }
            status => {
                self.status = Some(status);
                false
            }
        }
    }

    pub fn finish(mut self) -> WaitResult {
        let status = self.status.unwrap_or(ReceiveStatus::Interrupted);
        let message = match status {
            ReceiveStatus::Successful => {
                let total = crate::ipc::MessageHeader::read_from(&self.buffer)
                    .map_or(0, |header| header.total_size());
                self.buffer.truncate(total);
                Some(self.buffer)
            }
            _ => None,
        };
        WaitResult::Receive { status, message }
    }
}
