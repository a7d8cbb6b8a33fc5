//! Tasking Core Library.
//!
//! Núcleo de concorrência do microkernel: scheduler por núcleo, ciclo de
//! vida de threads e processos, framework de waiters e IPC por mensagens.
//!
//! Consome um provedor de memória (`mm::MemoryProvider`) e um sink de
//! debug (`debug::DebugSink`); todo o resto vive aqui.

#![cfg_attr(not(test), no_std)]

// Habilitar alocação dinâmica (necessário para Vec/Box/BTreeMap)
extern crate alloc;

// --- Infraestrutura (macros de log primeiro) ---
#[macro_use]
pub mod debug; // Logging e sink de debug
pub mod klib; // Arena, listas intrusivas, cmdline, self tests
pub mod sync; // Primitivas atômicas
pub mod sys; // Tipos de ID e códigos de erro

// --- Contratos externos ---
pub mod mm; // Provedor de memória, ranges virtuais

// --- Subsistemas ---
pub mod ipc; // Mensagens, mailboxes e pool
pub mod sched; // Scheduler, threads/processos, waiters, facade
pub mod syscall; // Entrada dos handlers de syscall

pub use sched::{ProcessSpec, Tasking, TaskingConfig, ThreadHandle};
pub use sys::{CoreId, Pid, Tid, TransactionId};
