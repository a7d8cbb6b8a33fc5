//! # Waiter Framework
//!
//! Um `Waiter` descreve por que uma thread está bloqueada e como testar se
//! ela pode voltar a rodar. O scheduler chama `check` uma vez por ciclo para
//! cada thread da wait queue, sem saber o que está sendo esperado.
//!
//! ## Contrato de `check`
//!
//! - `true`: continua esperando; `false`: terminou (sucesso, erro ou
//!   timeout já registrados nos dados do próprio waiter).
//! - Não bloqueia e faz trabalho limitado.
//! - Só toca nos próprios dados e no subsistema consultado.
//! - Idempotente: depois de terminar, novas chamadas retornam `false` sem
//!   alterar o resultado.
//!
//! Timeouts vivem inteiramente no waiter (prazo absoluto comparado com o
//! relógio em `WaitContext::now`).

pub mod irq;
pub mod join;
pub mod receive;
pub mod send;
pub mod sleep;

pub use irq::{IrqTable, IrqWaiter, IRQ_COUNT};
pub use join::JoinWaiter;
pub use receive::ReceiveWaiter;
pub use send::SendWaiter;
pub use sleep::SleepWaiter;

use crate::ipc::{MessageController, ReceiveStatus, SendStatus};
use crate::sys::types::Tid;
use alloc::vec::Vec;

/// Consulta de vida de threads em qualquer núcleo (diretório global).
pub trait ThreadLiveness {
    fn is_alive(&self, tid: Tid) -> bool;
}

/// Estado global visível aos checks durante um ciclo de scheduling.
pub struct WaitContext<'a> {
    /// Milissegundos desde o boot
    pub now: u64,
    pub messages: &'a MessageController,
    pub irqs: &'a IrqTable,
    pub liveness: &'a dyn ThreadLiveness,
}

/// Thread dona do waiter, como vista pelo check.
#[derive(Debug, Clone, Copy)]
pub struct WaitSubject {
    pub tid: Tid,
    /// Condição de quebra (sinal pendente)
    pub interrupted: bool,
}

/// Como uma espera genérica terminou
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    Completed,
    TimedOut,
    Interrupted,
}

/// Resultado entregue à thread quando ela volta a rodar
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitResult {
    /// `message` contém header + payload quando `status` é `Successful`
    Receive {
        status: ReceiveStatus,
        message: Option<Vec<u8>>,
    },
    Send {
        status: SendStatus,
        wait: WaitStatus,
    },
    Irq(WaitStatus),
    Join(WaitStatus),
    Sleep(WaitStatus),
}

/// Tipo de espera (diagnóstico)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitKind {
    Receive,
    Send,
    Irq,
    Join,
    Sleep,
}

impl WaitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Receive => "receive",
            Self::Send => "send",
            Self::Irq => "irq",
            Self::Join => "join",
            Self::Sleep => "sleep",
        }
    }
}

pub enum Waiter {
    Receive(ReceiveWaiter),
    Send(SendWaiter),
    Irq(IrqWaiter),
    Join(JoinWaiter),
    Sleep(SleepWaiter),
}

impl Waiter {
    /// `true` = continua esperando.
    pub fn check(&mut self, ctx: &WaitContext<'_>, subject: WaitSubject) -> bool {
        match self {
            Self::Receive(waiter) => waiter.check(ctx, subject),
            Self::Send(waiter) => waiter.check(ctx, subject),
            Self::Irq(waiter) => waiter.check(ctx, subject),
            Self::Join(waiter) => waiter.check(ctx, subject),
            Self::Sleep(waiter) => waiter.check(ctx, subject),
        }
    }

    /// Consome o waiter e produz o resultado. Um waiter que não terminou
    /// (acordado à força) reporta interrupção.
    pub fn finish(self) -> WaitResult {
        match self {
            Self::Receive(waiter) => waiter.finish(),
            Self::Send(waiter) => waiter.finish(),
            Self::Irq(waiter) => WaitResult::Irq(waiter.finish()),
            Self::Join(waiter) => WaitResult::Join(waiter.finish()),
            Self::Sleep(waiter) => WaitResult::Sleep(waiter.finish()),
        }
    }

    pub fn kind(&self) -> WaitKind {
        match self {
            Self::Receive(_) => WaitKind::Receive,
            Self::Send(_) => WaitKind::Send,
            Self::Irq(_) => WaitKind::Irq,
            Self::Join(_) => WaitKind::Join,
            Self::Sleep(_) => WaitKind::Sleep,
        }
    }
}

/// Prazo comum às esperas com timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Option<u64>);

impl Deadline {
    pub const NEVER: Deadline = Deadline(None);

    pub fn at(millis: Option<u64>) -> Self {
        Self(millis)
    }

    #[inline]
    pub fn expired(&self, now: u64) -> bool {
        matches!(self.0, Some(deadline) if now >= deadline)
    }
}

/// Desfecho comum de IRQ, join e sleep: interrupção, condição e prazo,
/// nesta ordem de precedência.
pub(crate) fn settle(
    outcome: &mut Option<WaitStatus>,
    subject: WaitSubject,
    deadline: Deadline,
    now: u64,
    condition: impl FnOnce() -> bool,
) -> bool {
    if outcome.is_some() {
        return false;
    }

    let status = if subject.interrupted {
        WaitStatus::Interrupted
    } else if condition() {
        WaitStatus::Completed
    } else if deadline.expired(now) {
        WaitStatus::TimedOut
    } else {
        return true;
    };

    *outcome = Some(status);
    false
}
