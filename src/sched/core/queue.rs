//! Entrada de fila do scheduler.
//!
//! Cada thread de um núcleo vive numa `QueueEntry` da arena do scheduler e
//! está encadeada em no máximo uma fila (run ou wait).

use crate::klib::{Linked, Links};
use crate::sched::task::Thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Run,
    Wait,
}

impl QueueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Wait => "wait",
        }
    }
}

pub struct QueueEntry {
    pub thread: Thread,
    links: Links,
    /// Fila atual (`None` para a idle thread e entre transições)
    pub(super) queue: Option<QueueKind>,
}

impl QueueEntry {
    pub fn new(thread: Thread) -> Self {
        Self {
            thread,
            links: Links::default(),
            queue: None,
        }
    }

    pub fn queue(&self) -> Option<QueueKind> {
        self.queue
    }
}

impl Linked for QueueEntry {
    fn links(&self) -> &Links {
        &self.links
    }

    fn links_mut(&mut self) -> &mut Links {
        &mut self.links
    }
}
