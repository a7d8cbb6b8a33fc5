//! Scheduler por núcleo
//!
//! | Módulo      | Responsabilidade |
//! |-------------|------------------|
//! | `queue`     | Entrada de fila (run/wait) na arena do scheduler |
//! | `scheduler` | Seleção round-robin, wait queue, remoção de mortas |
//! | `switch`    | Estado por núcleo instalado ao trocar de thread |

pub mod queue;
pub mod scheduler;
pub mod switch;

pub use queue::{QueueEntry, QueueKind};
pub use scheduler::{ScheduleEnv, Scheduler, SchedulerStats};
pub use switch::CoreState;
