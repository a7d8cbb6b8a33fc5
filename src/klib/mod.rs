//! # Kernel Library
//!
//! Utilitários internos sem dependência de subsistemas:
//! arena com handles estáveis, listas intrusivas por índice, parser da
//! linha de comando e o framework de self tests.

pub mod arena;
pub mod cmdline;
pub mod list;
pub mod test_framework;

pub use arena::{Arena, SlotId};
pub use list::{IndexList, Linked, Links};
