//! # Message Controller
//!
//! Tabela de mailboxes (uma por TID de destino) e as operações não
//! bloqueantes `send`/`receive`/`clear`. Receive bloqueante é um waiter
//! (`sched::waiter`) que chama `receive` a cada ciclo; este módulo não sabe
//! nada de scheduling.
//!
//! Ordem de lock: tabela → pool. O teste de vida de `send_if_alive` roda
//! com a tabela travada.

use super::mailbox::{Mailbox, MessageNode};
use super::message::{
    MessageHeader, ReceiveStatus, SendStatus, HEADER_SIZE, MAX_MESSAGE_LENGTH, MAX_QUEUE_CONTENT,
};
use super::pool::MessagePool;
use crate::klib::Arena;
use crate::sys::types::{Tid, TransactionId};
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use spin::Mutex;

struct MailboxTable {
    boxes: BTreeMap<Tid, Mailbox>,
    nodes: Arena<MessageNode>,
}

pub struct MessageController {
    table: Mutex<MailboxTable>,
    pool: MessagePool,
}

impl MessageController {
    pub fn new(pool: MessagePool) -> Self {
        Self {
            table: Mutex::new(MailboxTable {
                boxes: BTreeMap::new(),
                nodes: Arena::new(),
            }),
            pool,
        }
    }

    pub fn pool(&self) -> &MessagePool {
        &self.pool
    }

    /// Enfileira `payload` na mailbox de `target`.
    ///
    /// Rejeições (`ExceedsMaximum`, `QueueFull`, `Failed`) não alteram a
    /// tabela.
    pub fn send(
        &self,
        target: Tid,
        source: Tid,
        payload: &[u8],
        tx: TransactionId,
    ) -> SendStatus {
        self.send_if_alive(target, source, payload, tx, |_| true)
    }

    /// `send` condicionado a `is_alive(target)`, avaliado sob o lock da
    /// tabela. Quem destrói a thread a tira do diretório antes do `clear`,
    /// então um destino destruído nunca ganha mailbox nova.
    pub fn send_if_alive(
        &self,
        target: Tid,
        source: Tid,
        payload: &[u8],
        tx: TransactionId,
        is_alive: impl FnOnce(Tid) -> bool,
    ) -> SendStatus {
        let length = payload.len();
        if length > MAX_MESSAGE_LENGTH {
            crate::kwarn!("(IPC) send: Mensagem excede o máximo, bytes=", length);
            return SendStatus::ExceedsMaximum;
        }

        let mut table = self.table.lock();
        if !is_alive(target) {
            crate::ktrace!("(IPC) send: Destino inexistente, TID=", target.as_u32());
            return SendStatus::Failed;
        }

        let MailboxTable { boxes, nodes } = &mut *table;
        let queued = boxes.get(&target).map_or(0, |mailbox| mailbox.total());
        if queued + length > MAX_QUEUE_CONTENT {
            crate::ktrace!("(IPC) send: Mailbox cheia, TID=", target.as_u32());
            return SendStatus::QueueFull;
        }

        let header = MessageHeader::new(source, tx, length);
        let mut block = match self.pool.acquire(header.total_size()) {
            Ok(block) => block,
            Err(_) => {
                crate::kerror!("(IPC) send: Pool sem memória, TID=", target.as_u32());
                return SendStatus::Failed;
            }
        };

        let bytes = block.bytes_mut();
        header.write_to(&mut bytes[..HEADER_SIZE]);
        bytes[HEADER_SIZE..header.total_size()].copy_from_slice(payload);

        let id = nodes.insert(MessageNode::new(header, block));
        boxes
            .entry(target)
            .or_insert_with(Mailbox::new)
            .push(nodes, id);

        crate::ktrace!("(IPC) send: Mensagem enfileirada para TID=", target.as_u32());
        SendStatus::Successful
    }

    /// Retira uma mensagem de `target` copiando header + payload para `out`.
    ///
    /// Com `tx` definido, retorna a primeira mensagem daquela transação
    /// (fura a fila). Se `out` for pequeno demais, a mensagem fica onde está.
    pub fn receive(&self, target: Tid, out: &mut [u8], tx: TransactionId) -> ReceiveStatus {
        let mut table = self.table.lock();
        let MailboxTable { boxes, nodes } = &mut *table;

        let mailbox = match boxes.get_mut(&target) {
            Some(mailbox) => mailbox,
            None => return ReceiveStatus::QueueEmpty,
        };
        let id = match mailbox.find(nodes, tx) {
            Some(id) => id,
            None => return ReceiveStatus::QueueEmpty,
        };

        let total_size = nodes[id].header.total_size();
        if total_size > out.len() {
            crate::ktrace!("(IPC) receive: Buffer insuficiente, precisa=", total_size);
            return ReceiveStatus::ExceedsBufferSize;
        }

        let node = match mailbox.take(nodes, id) {
            Some(node) => node,
            None => return ReceiveStatus::Failed,
        };
        drop(table);

        out[..total_size].copy_from_slice(&node.block.bytes()[..total_size]);
        self.pool.release(node.block);

        crate::ktrace!("(IPC) receive: Mensagem entregue a TID=", target.as_u32());
        ReceiveStatus::Successful
    }

    /// Descarta a mailbox de `target` e todas as suas mensagens.
    /// Retorna quantas mensagens foram liberadas.
    pub fn clear(&self, target: Tid) -> usize {
        let released = {
            let mut table = self.table.lock();
            let MailboxTable { boxes, nodes } = &mut *table;
            match boxes.remove(&target) {
                Some(mut mailbox) => mailbox.drain(nodes),
                None => return 0,
            }
        };

        let count = released.len();
        for node in released {
            self.pool.release(node.block);
        }

        if count > 0 {
            crate::kdebug!("(IPC) clear: Mensagens descartadas=", count);
        }
        count
    }

    /// Mensagens pendentes para `target`
    pub fn pending(&self, target: Tid) -> usize {
        self.table
            .lock()
            .boxes
            .get(&target)
            .map_or(0, |mailbox| mailbox.len())
    }

    /// Bytes de payload enfileirados para `target`
    pub fn total_content(&self, target: Tid) -> usize {
        self.table
            .lock()
            .boxes
            .get(&target)
            .map_or(0, |mailbox| mailbox.total())
    }

    pub fn has_mailbox(&self, target: Tid) -> bool {
        self.table.lock().boxes.contains_key(&target)
    }

    /// Transações enfileiradas, em ordem
    pub fn queued_transactions(&self, target: Tid) -> Vec<TransactionId> {
        let table = self.table.lock();
        match table.boxes.get(&target) {
            Some(mailbox) => mailbox.transactions(&table.nodes).collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::pool::SizeClass;

    const A: Tid = Tid(1);
    const B: Tid = Tid(2);

    fn controller() -> MessageController {
        MessageController::new(MessagePool::with_backing_size(256 * 1024, 32))
    }

    fn payload_of(buf: &[u8]) -> &[u8] {
        let header = MessageHeader::read_from(buf).unwrap();
        &buf[HEADER_SIZE..header.total_size()]
    }

    #[test]
    fn untagged_receive_is_fifo() {
        let ipc = controller();
        for byte in 0u8..5 {
            assert_eq!(ipc.send(B, A, &[byte; 3], TransactionId::NONE), SendStatus::Successful);
        }

        let mut buf = [0u8; 64];
        for byte in 0u8..5 {
            assert_eq!(ipc.receive(B, &mut buf, TransactionId::NONE), ReceiveStatus::Successful);
            assert_eq!(payload_of(&buf), &[byte; 3]);
        }
        assert_eq!(ipc.receive(B, &mut buf, TransactionId::NONE), ReceiveStatus::QueueEmpty);
        assert_eq!(ipc.total_content(B), 0);
    }

    #[test]
    fn selective_receive_keeps_remaining_order() {
        let ipc = controller();
        let (ta, tb) = (TransactionId(10), TransactionId(20));
        ipc.send(B, A, b"a1", ta);
        ipc.send(B, A, b"b", tb);
        ipc.send(B, A, b"a2", ta);

        let mut buf = [0u8; 64];
        assert_eq!(ipc.receive(B, &mut buf, tb), ReceiveStatus::Successful);
        assert_eq!(payload_of(&buf), b"b");
        assert_eq!(ipc.queued_transactions(B), [ta, ta]);

        ipc.receive(B, &mut buf, ta);
        assert_eq!(payload_of(&buf), b"a1");
        ipc.receive(B, &mut buf, TransactionId::NONE);
        assert_eq!(payload_of(&buf), b"a2");
    }

    #[test]
    fn too_small_buffer_leaves_message_queued() {
        let ipc = controller();
        ipc.send(B, A, &[7u8; 100], TransactionId(3));

        let mut small = [0u8; HEADER_SIZE + 99];
        assert_eq!(
            ipc.receive(B, &mut small, TransactionId(3)),
            ReceiveStatus::ExceedsBufferSize
        );
        assert_eq!(ipc.pending(B), 1);
        assert_eq!(ipc.total_content(B), 100);

        let mut exact = [0u8; HEADER_SIZE + 100];
        assert_eq!(ipc.receive(B, &mut exact, TransactionId(3)), ReceiveStatus::Successful);
        let header = MessageHeader::read_from(&exact).unwrap();
        assert_eq!(header.sender(), A);
        assert_eq!(header.length, 100);
    }

    #[test]
    fn quota_rejects_without_side_effects() {
        let ipc = controller();
        let full = [0u8; MAX_MESSAGE_LENGTH];
        for _ in 0..32 {
            assert_eq!(ipc.send(B, A, &full, TransactionId::NONE), SendStatus::Successful);
        }
        assert_eq!(ipc.total_content(B), MAX_QUEUE_CONTENT);

        assert_eq!(ipc.send(B, A, &full, TransactionId::NONE), SendStatus::QueueFull);
        assert_eq!(ipc.send(B, A, &[1], TransactionId::NONE), SendStatus::QueueFull);
        assert_eq!(ipc.pending(B), 32);
        assert_eq!(ipc.total_content(B), MAX_QUEUE_CONTENT);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let ipc = controller();
        let big = [0u8; MAX_MESSAGE_LENGTH + 1];
        assert_eq!(ipc.send(B, A, &big, TransactionId::NONE), SendStatus::ExceedsMaximum);
        assert_eq!(ipc.pending(B), 0);
    }

    #[test]
    fn clear_returns_blocks_to_pool() {
        let ipc = controller();
        ipc.send(B, A, b"x", TransactionId::NONE);
        ipc.send(B, A, b"y", TransactionId::NONE);
        let free_before = ipc.pool().free_blocks(SizeClass::Tiny);

        assert_eq!(ipc.clear(B), 2);
        assert!(!ipc.has_mailbox(B));
        assert_eq!(ipc.pool().free_blocks(SizeClass::Tiny), free_before + 2);
        assert_eq!(ipc.clear(B), 0);
    }

    #[test]
    fn pool_exhaustion_reports_failed() {
        let ipc = MessageController::new(MessagePool::with_backing_size(1024, 32));
        assert_eq!(
            ipc.send(B, A, &[0u8; 1500], TransactionId::NONE),
            SendStatus::Failed
        );
        assert_eq!(ipc.pending(B), 0);
        assert!(!ipc.has_mailbox(B));
    }

    #[test]
    fn dead_target_never_gets_a_mailbox() {
        let ipc = controller();
        ipc.send(B, A, b"x", TransactionId::NONE);
        assert_eq!(ipc.clear(B), 1);

        let free_before = ipc.pool().free_blocks(SizeClass::Tiny);
        assert_eq!(
            ipc.send_if_alive(B, A, b"late", TransactionId::NONE, |_| false),
            SendStatus::Failed
        );
        assert!(!ipc.has_mailbox(B));
        assert_eq!(ipc.pool().free_blocks(SizeClass::Tiny), free_before);

        assert_eq!(
            ipc.send_if_alive(A, B, b"ok", TransactionId::NONE, |tid| tid == A),
            SendStatus::Successful
        );
        assert_eq!(ipc.pending(A), 1);
    }
}
