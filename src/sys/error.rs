//! # Error Codes
//!
//! Dois níveis:
//! - `TaskingError`: falhas de recurso e de argumento do núcleo de tasking.
//!   Sempre retornadas ao chamador, nunca panic.
//! - `Errno`: códigos POSIX devolvidos à camada de syscall (`as_isize`).
//!
//! Violações de protocolo de IPC não são erros: são status
//! (`ipc::SendStatus`, `ipc::ReceiveStatus`).

use crate::mm::MmError;

/// Erros do núcleo de tasking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskingError {
    /// Sem memória (pool de mensagens, heap do kernel)
    OutOfMemory,
    /// Provedor de memória não conseguiu alocar uma stack
    StackAllocationFailed,
    /// Provedor de memória não conseguiu criar/copiar o espaço de endereçamento
    AddressSpaceFailed,
    /// Thread inexistente (ou já destruída)
    NoSuchThread,
    /// Processo inexistente
    NoSuchProcess,
    /// Índice de núcleo fora do intervalo configurado
    NoSuchCore,
    /// Identificador já registrado por outra thread
    IdentifierTaken,
    /// Parâmetro inválido
    InvalidArgument,
    /// Operação não permitida para o nível de segurança / tipo de thread
    NotPermitted,
}

impl TaskingError {
    /// Retorna descrição legível do erro
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OutOfMemory => "sem memória disponível",
            Self::StackAllocationFailed => "falha ao alocar stack",
            Self::AddressSpaceFailed => "falha ao criar espaço de endereçamento",
            Self::NoSuchThread => "thread inexistente",
            Self::NoSuchProcess => "processo inexistente",
            Self::NoSuchCore => "núcleo inexistente",
            Self::IdentifierTaken => "identificador já registrado",
            Self::InvalidArgument => "parâmetro inválido",
            Self::NotPermitted => "operação não permitida",
        }
    }

    /// Código POSIX equivalente
    pub fn errno(&self) -> Errno {
        match self {
            Self::OutOfMemory | Self::StackAllocationFailed | Self::AddressSpaceFailed => {
                Errno::ENOMEM
            }
            Self::NoSuchThread | Self::NoSuchProcess => Errno::ESRCH,
            Self::NoSuchCore | Self::InvalidArgument => Errno::EINVAL,
            Self::IdentifierTaken => Errno::EEXIST,
            Self::NotPermitted => Errno::EPERM,
        }
    }
}

impl core::fmt::Display for TaskingError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<MmError> for TaskingError {
    fn from(err: MmError) -> Self {
        match err {
            MmError::OutOfMemory => Self::OutOfMemory,
            MmError::StackUnavailable => Self::StackAllocationFailed,
            MmError::SpaceUnavailable => Self::AddressSpaceFailed,
            MmError::InvalidSize | MmError::NotAllocated => Self::InvalidArgument,
        }
    }
}

/// Tipo Result específico do núcleo de tasking
pub type TaskingResult<T> = Result<T, TaskingError>;

/// Códigos de erro devolvidos à camada de syscall.
///
/// Segue a numeração POSIX/Linux. Valores negativos em retornos (isize).
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Errno {
    Success = 0,
    EPERM = 1,      // Operation not permitted
    ESRCH = 3,      // No such process
    EINTR = 4,      // Interrupted system call
    EAGAIN = 11,    // Try again
    ENOMEM = 12,    // Out of memory
    EEXIST = 17,    // File exists
    EINVAL = 22,    // Invalid argument
    EMSGSIZE = 90,  // Message too long
    ENOBUFS = 105,  // No buffer space available
    ETIMEDOUT = 110, // Connection timed out
}

impl Errno {
    pub fn as_isize(self) -> isize {
        -(self as i32) as isize
    }
}

impl From<TaskingError> for Errno {
    fn from(err: TaskingError) -> Self {
        err.errno()
    }
}
