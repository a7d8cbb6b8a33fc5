//! Mailbox: fila FIFO de mensagens de uma thread.
//!
//! As mensagens vivem numa `Arena` compartilhada pela tabela de mailboxes;
//! cada mailbox é só uma `IndexList` sobre ela mais o total de bytes.

use super::message::MessageHeader;
use super::pool::PoolBlock;
use crate::klib::{Arena, IndexList, Linked, Links, SlotId};
use crate::sys::types::TransactionId;
use alloc::vec::Vec;

/// Mensagem enfileirada: header em cache + bloco com header e payload.
pub struct MessageNode {
    pub header: MessageHeader,
    pub block: PoolBlock,
    links: Links,
}

impl MessageNode {
    pub fn new(header: MessageHeader, block: PoolBlock) -> Self {
        Self {
            header,
            block,
            links: Links::default(),
        }
    }
}

impl Linked for MessageNode {
    fn links(&self) -> &Links {
        &self.links
    }

    fn links_mut(&mut self) -> &mut Links {
        &mut self.links
    }
}

#[derive(Default)]
pub struct Mailbox {
    queue: IndexList,
    /// Soma de `length` das mensagens enfileiradas
    total: usize,
}

impl Mailbox {
    pub const fn new() -> Self {
        Self {
            queue: IndexList::new(),
            total: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn push(&mut self, nodes: &mut Arena<MessageNode>, id: SlotId) {
        self.total += nodes[id].header.length;
        self.queue.push_back(nodes, id);
    }

    /// Primeira mensagem (FIFO) ou primeira com a transação pedida.
    pub fn find(&self, nodes: &Arena<MessageNode>, tx: TransactionId) -> Option<SlotId> {
        if tx.is_none() {
            return self.queue.head();
        }
        self.queue
            .iter(nodes)
            .find(|&id| nodes[id].header.transaction() == tx)
    }

    /// Desencadeia e remove a mensagem da arena.
    pub fn take(&mut self, nodes: &mut Arena<MessageNode>, id: SlotId) -> Option<MessageNode> {
        self.queue.unlink(nodes, id);
        let node = nodes.remove(id)?;
        self.total -= node.header.length;
        Some(node)
    }

    /// Esvazia a mailbox, devolvendo as mensagens em ordem.
    pub fn drain(&mut self, nodes: &mut Arena<MessageNode>) -> Vec<MessageNode> {
        let mut drained = Vec::with_capacity(self.queue.len());
        while let Some(id) = self.queue.pop_front(nodes) {
            if let Some(node) = nodes.remove(id) {
                drained.push(node);
            }
        }
        self.total = 0;
        drained
    }

    /// Transações na ordem da fila (diagnóstico e testes)
    pub fn transactions<'a>(
        &self,
        nodes: &'a Arena<MessageNode>,
    ) -> impl Iterator<Item = TransactionId> + 'a {
        self.queue.iter(nodes).map(move |id| nodes[id].header.transaction())
    }
}
