//! # Syscall Layer
//!
//! Ponto de entrada dos handlers de syscall no núcleo de tasking. Cada
//! função recebe o facade e a thread chamadora e devolve um valor pronto
//! para a ABI, ou `Suspended` quando a thread foi estacionada com um
//! waiter.
//!
//! # Módulos
//!
//! - `process`: criação, fork, término, nomes e memória de processo
//! - `ipc`: envio e recebimento de mensagens (bloqueantes ou não)
//! - `wait`: espera genérica (IRQ, join, sleep) e tick do timer
//!
//! ## Retomada
//!
//! Uma syscall suspensa é completada pela variante `resume_*` quando a
//! thread volta a rodar: ela consome o `WaitResult` guardado na thread.

pub mod ipc;
pub mod process;
pub mod wait;

use crate::sys::error::Errno;

/// Resultado de syscall: Ok(valor) ou Err(Errno)
pub type SysResult<T> = Result<T, Errno>;

/// Desfecho de uma syscall que pode bloquear
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyscallOutcome<T> {
    /// Completou sem bloquear
    Done(T),
    /// Thread estacionada; completar com `resume_*` ao voltar a rodar
    Suspended,
}

/// Como uma operação bloqueante se comporta
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    /// Retorna o status imediatamente
    NonBlocking,
    /// Estaciona a thread; `None` espera sem prazo
    Blocking { timeout_ms: Option<u64> },
}

/// Helper para converter SysResult<usize> em isize para retorno
pub fn result_to_isize(result: SysResult<usize>) -> isize {
    match result {
        Ok(value) => value as isize,
        Err(errno) => errno.as_isize(),
    }
}
