//! # IPC Syscalls (Message Passing)
//!
//! Mensagens endereçadas por TID, com receive seletivo por transação.
//!
//! ## 🏗️ Arquitetura
//! - O controller é sempre não bloqueante. O bloqueio é montado aqui:
//!   se o receive encontra a fila vazia (ou o send a encontra cheia), a
//!   thread é estacionada com um waiter que repete a operação a cada
//!   ciclo do scheduler.
//! - Quando a thread volta a rodar, `sys_resume_*` entrega o resultado
//!   guardado pelo waiter.
//!
//! ## ⚠️ Pontos de Atenção
//! - O send bloqueante copia o payload para o waiter: o buffer do usuário
//!   pode ser reutilizado logo após a suspensão.

use super::{SysResult, SyscallOutcome, WaitMode};
use crate::ipc::{receive_buffer_len, MessageHeader, ReceiveStatus, SendStatus, HEADER_SIZE};
use crate::sched::time::deadline_after;
use crate::sched::waiter::{Deadline, ReceiveWaiter, SendWaiter, WaitResult, WaitStatus, Waiter};
use crate::sched::Tasking;
use crate::sys::error::Errno;
use crate::sys::types::{Tid, TransactionId};
use alloc::vec;
use alloc::vec::Vec;

/// Resultado de um receive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    pub status: ReceiveStatus,
    /// Header + payload no layout de wire, quando `status` é `Successful`
    pub message: Option<Vec<u8>>,
}

impl Received {
    pub fn header(&self) -> Option<MessageHeader> {
        self.message.as_deref().and_then(MessageHeader::read_from)
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.message.as_deref().map(|message| &message[HEADER_SIZE..])
    }
}

fn deadline(tasking: &Tasking, timeout_ms: Option<u64>) -> Deadline {
    Deadline::at(deadline_after(tasking.now(), timeout_ms))
}

/// Envia uma mensagem para a mailbox de `target`.
///
/// # Retorno
/// Status do envio. Em modo bloqueante com a fila cheia a thread é
/// estacionada e o status sai de `sys_resume_send`.
pub fn sys_message_send(
    tasking: &Tasking,
    caller: Tid,
    target: Tid,
    payload: &[u8],
    transaction: TransactionId,
    mode: WaitMode,
) -> SysResult<SyscallOutcome<SendStatus>> {
    let status = tasking.send(caller, target, payload, transaction);

    match (status, mode) {
        (SendStatus::QueueFull, WaitMode::Blocking { timeout_ms }) => {
            let waiter = SendWaiter::new(
                target,
                transaction,
                payload.to_vec(),
                deadline(tasking, timeout_ms),
            );
            tasking.block(caller, Waiter::Send(waiter))?;
            crate::ktrace!("(Syscall) send bloqueado, mailbox cheia TID=", target.as_u32());
            Ok(SyscallOutcome::Suspended)
        }
        (status, _) => Ok(SyscallOutcome::Done(status)),
    }
}

/// Completa um send bloqueante.
pub fn sys_resume_send(tasking: &Tasking, caller: Tid) -> SysResult<SendStatus> {
    match tasking.take_wait_result(caller)? {
        Some(WaitResult::Send {
            status,
            wait: WaitStatus::Completed,
        }) => Ok(status),
        Some(WaitResult::Send {
            wait: WaitStatus::TimedOut,
            ..
        }) => Err(Errno::ETIMEDOUT),
        Some(WaitResult::Send {
            wait: WaitStatus::Interrupted,
            ..
        }) => Err(Errno::EINTR),
        _ => Err(Errno::EINVAL),
    }
}

/// Recebe da mailbox da thread chamadora.
///
/// `max_len` inclui o header. Com `transaction` diferente de `NONE` só
/// aceita a primeira mensagem daquela transação.
pub fn sys_message_receive(
    tasking: &Tasking,
    caller: Tid,
    max_len: usize,
    transaction: TransactionId,
    mode: WaitMode,
) -> SysResult<SyscallOutcome<Received>> {
    let mut buffer = vec![0u8; receive_buffer_len(max_len)];
    let status = tasking.receive(caller, &mut buffer, transaction);

    match (status, mode) {
        (ReceiveStatus::QueueEmpty, WaitMode::Blocking { timeout_ms }) => {
            let waiter = ReceiveWaiter::new(
                caller,
                transaction,
                max_len,
                deadline(tasking, timeout_ms),
            );
            tasking.block(caller, Waiter::Receive(waiter))?;
            Ok(SyscallOutcome::Suspended)
        }
        (ReceiveStatus::Successful, _) => {
            let total = MessageHeader::read_from(&buffer).map_or(0, |header| header.total_size());
            buffer.truncate(total);
            Ok(SyscallOutcome::Done(Received {
                status,
                message: Some(buffer),
            }))
        }
        (status, _) => Ok(SyscallOutcome::Done(Received {
            status,
            message: None,
        })),
    }
}

/// Completa um receive bloqueante.
pub fn sys_resume_receive(tasking: &Tasking, caller: Tid) -> SysResult<Received> {
    match tasking.take_wait_result(caller)? {
        Some(WaitResult::Receive { status, message }) => Ok(Received { status, message }),
        _ => Err(Errno::EINVAL),
    }
}
