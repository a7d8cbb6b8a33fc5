//! # Inter-Process Communication (IPC)
//!
//! Único mecanismo de comunicação entre tarefas: mensagens síncronas
//! endereçadas por TID, com receive seletivo por transação.
//!
//! | Módulo       | Responsabilidade |
//! |--------------|------------------|
//! | `message`    | Header de wire, limites e status |
//! | `pool`       | Buffers por classe de tamanho (32/64/256/2048) |
//! | `mailbox`    | Fila FIFO por thread (lista intrusiva) |
//! | `controller` | `send` / `receive` / `clear` |
//!
//! Nada aqui bloqueia. A espera é montada em cima, pelo framework de
//! waiters do scheduler.

// =============================================================================
// MESSAGE PASSING
// =============================================================================

pub mod controller;
pub mod mailbox;
pub mod message;
pub mod pool;

pub use controller::MessageController;
pub use message::{
    receive_buffer_len, MessageHeader, ReceiveStatus, SendStatus, HEADER_SIZE, MAX_FRAME_SIZE,
    MAX_MESSAGE_LENGTH, MAX_QUEUE_CONTENT,
};
pub use pool::{MessagePool, SizeClass};

// =============================================================================
// TESTS
// =============================================================================

#[cfg(feature = "self_test")]
pub mod test;
