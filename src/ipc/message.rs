//! Mensagem IPC: header de wire e status das operações.
//!
//! Layout no buffer (preservado bit a bit entre implementações):
//!
//! ```text
//! +-------------+------------------+-----------------+------------------+
//! | sender: u32 | transaction: u32 | length: usize   | payload[length]  |
//! +-------------+------------------+-----------------+------------------+
//! ```

use crate::sys::types::{Tid, TransactionId};
use core::mem::size_of;

/// Tamanho máximo de payload de uma mensagem
pub const MAX_MESSAGE_LENGTH: usize = 2048;

/// Soma máxima de payloads enfileirados numa mailbox
pub const MAX_QUEUE_CONTENT: usize = 65536;

/// Header da mensagem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct MessageHeader {
    pub sender: u32,
    pub transaction: u32,
    pub length: usize,
}

/// Tamanho do header no wire
pub const HEADER_SIZE: usize = size_of::<MessageHeader>();

const _: () = assert!(HEADER_SIZE == 8 + size_of::<usize>());

/// Maior mensagem completa (header + payload) que um receive pode entregar
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_MESSAGE_LENGTH;

/// Buffer de receive efetivo para um `max_len` pedido.
pub const fn receive_buffer_len(max_len: usize) -> usize {
    if max_len < MAX_FRAME_SIZE {
        max_len
    } else {
        MAX_FRAME_SIZE
    }
}

impl MessageHeader {
    pub fn new(sender: Tid, transaction: TransactionId, length: usize) -> Self {
        Self {
            sender: sender.as_u32(),
            transaction: transaction.as_u32(),
            length,
        }
    }

    pub fn sender(&self) -> Tid {
        Tid::new(self.sender)
    }

    pub fn transaction(&self) -> TransactionId {
        TransactionId::new(self.transaction)
    }

    /// Header + payload
    pub fn total_size(&self) -> usize {
        HEADER_SIZE + self.length
    }

    /// Serializa no início de `out` (que deve ter `HEADER_SIZE` bytes).
    pub fn write_to(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&self.sender.to_ne_bytes());
        out[4..8].copy_from_slice(&self.transaction.to_ne_bytes());
        out[8..HEADER_SIZE].copy_from_slice(&self.length.to_ne_bytes());
    }

    /// Lê o header do início de `buf`.
    pub fn read_from(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        let mut length = [0u8; size_of::<usize>()];
        length.copy_from_slice(&buf[8..HEADER_SIZE]);
        Some(Self {
            sender: u32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]),
            transaction: u32::from_ne_bytes([buf[4], buf[5], buf[6], buf[7]]),
            length: usize::from_ne_bytes(length),
        })
    }
}

/// Resultado de `send`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Successful,
    /// A mailbox passaria de `MAX_QUEUE_CONTENT`
    QueueFull,
    /// Payload maior que `MAX_MESSAGE_LENGTH`
    ExceedsMaximum,
    /// Falha de alocação do pool (ou destino inexistente no facade)
    Failed,
}

/// Resultado de `receive`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveStatus {
    Successful,
    QueueEmpty,
    /// Buffer menor que header + payload. A mensagem continua na fila.
    ExceedsBufferSize,
    /// Espera quebrada por sinal pendente
    Interrupted,
    /// Prazo da espera expirou
    TimedOut,
    Failed,
}

impl SendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Successful => "successful",
            Self::QueueFull => "queue full",
            Self::ExceedsMaximum => "exceeds maximum",
            Self::Failed => "failed",
        }
    }
}

impl ReceiveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Successful => "successful",
            Self::QueueEmpty => "queue empty",
            Self::ExceedsBufferSize => "exceeds buffer size",
            Self::Interrupted => "interrupted",
            Self::TimedOut => "timed out",
            Self::Failed => "failed",
        }
    }
}
