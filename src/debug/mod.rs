//! # Debug & Logging
//!
//! Saída de diagnóstico do núcleo de tasking.
//!
//! - `logging`: macros `kerror!`..`ktrace!` filtradas em tempo de compilação.
//! - `sink`: ponto de conexão com o colaborador externo de debug/log.
//!
//! Nada aqui está em caminho de corretude: uma falha ou ausência do sink
//! nunca altera o resultado de scheduling ou IPC.

pub mod logging;
pub mod sink;

pub use sink::{set_sink, DebugSink};
