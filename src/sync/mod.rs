//! # Synchronization Primitives
//!
//! Os locks do núcleo de tasking são `spin::Mutex` (seções curtas, sem
//! dormir, chamados com interrupções desabilitadas pelo caminho de trap).
//!
//! ## Ordem de Lock
//!
//! ```text
//! global (cross-core) → scheduler do núcleo → diretório de threads
//! scheduler do núcleo → tabela de mailboxes → pool (classe → heap de apoio)
//! ```
//!
//! Tabela de processos e registro de identificadores nunca são adquiridos
//! com o lock de um scheduler em mãos.

/// Operações atômicas
pub mod atomic;

pub use atomic::{AtomicCounter, AtomicFlag};
