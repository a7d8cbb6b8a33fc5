//! System Definitions.
//!
//! Tipos de identificação e códigos de erro compartilhados por todos os
//! subsistemas do núcleo de tasking.

pub mod error;
pub mod types;

pub use error::{Errno, TaskingError, TaskingResult};
pub use types::{CoreId, Pid, Tid, TransactionId};
