//! # Multitasking & Scheduler Subsystem
//!
//! Núcleo de concorrência: um scheduler por núcleo físico, o modelo de
//! threads e processos, o framework de waiters e o facade que multiplexa
//! tudo isso.
//!
//! ## 🏗️ Arquitetura
//!
//! ```text
//! trap ─► Tasking::save ─► Scheduler::save
//!      └► Tasking::schedule ─► Scheduler::schedule ─► waiters ─► IPC / IRQ / diretório
//! ```
//!
//! - **Por núcleo:** cada `Scheduler` só é tocado pelo trap do próprio
//!   núcleo, exceto pelas operações cross-core do facade (lock global).
//! - **Espera genérica:** uma thread bloqueada carrega um `Waiter`; o
//!   scheduler só pergunta "ainda esperando?" uma vez por ciclo.
//! - **Destruição em duas fases:** marcar morta, remover das filas no
//!   próximo ciclo, liberar recursos fora do lock do núcleo.
//!
//! ## ⚠️ Limitações conhecidas
//! - Sem detecção de deadlock: uma passada que deixa só a idle executável
//!   gera apenas um log de debug.
//! - Sem migração de threads entre núcleos depois do placement.

pub mod config;
pub mod core;
pub mod task;
pub mod tasking;
pub mod time;
pub mod waiter;

pub use config::TaskingConfig;
pub use tasking::{Directory, ProcessSpec, Selection, Tasking, ThreadHandle};
