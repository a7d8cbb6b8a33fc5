//! Lista duplamente encadeada intrusiva por índice.
//!
//! Os ponteiros `prev`/`next` ficam dentro dos elementos de uma `Arena`
//! (como `SlotId`, não referências). Inserção e remoção arbitrária são O(1)
//! sem aliasing mutável.
//!
//! Um elemento pertence a no máximo uma lista por vez: quem chama é
//! responsável por esse invariante (o scheduler o verifica).

use super::arena::{Arena, SlotId};

/// Ponteiros embutidos no elemento
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Links {
    prev: Option<SlotId>,
    next: Option<SlotId>,
}

/// Elemento que pode ser encadeado numa `IndexList`
pub trait Linked {
    fn links(&self) -> &Links;
    fn links_mut(&mut self) -> &mut Links;
}

/// Cabeça de lista (head, tail, tamanho)
#[derive(Debug, Default)]
pub struct IndexList {
    head: Option<SlotId>,
    tail: Option<SlotId>,
    len: usize,
}

impl IndexList {
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn head(&self) -> Option<SlotId> {
        self.head
    }

    pub fn tail(&self) -> Option<SlotId> {
        self.tail
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Anexa no final. O(1).
    pub fn push_back<T: Linked>(&mut self, arena: &mut Arena<T>, id: SlotId) {
        *arena[id].links_mut() = Links {
            prev: self.tail,
            next: None,
        };
        match self.tail {
            Some(tail) => arena[tail].links_mut().next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        self.len += 1;
    }

    /// Insere no início. O(1).
    pub fn push_front<T: Linked>(&mut self, arena: &mut Arena<T>, id: SlotId) {
        *arena[id].links_mut() = Links {
            prev: None,
            next: self.head,
        };
        match self.head {
            Some(head) => arena[head].links_mut().prev = Some(id),
            None => self.tail = Some(id),
        }
        self.head = Some(id);
        self.len += 1;
    }

    /// Remove um elemento qualquer desta lista. O(1).
    pub fn unlink<T: Linked>(&mut self, arena: &mut Arena<T>, id: SlotId) {
        let Links { prev, next } = *arena[id].links();

        match prev {
            Some(prev) => arena[prev].links_mut().next = next,
            None => {
                debug_assert_eq!(self.head, Some(id), "(List) unlink de elemento alheio");
                self.head = next;
            }
        }
        match next {
            Some(next) => arena[next].links_mut().prev = prev,
            None => self.tail = prev,
        }

        *arena[id].links_mut() = Links::default();
        self.len -= 1;
    }

    /// Remove e retorna o primeiro elemento
    pub fn pop_front<T: Linked>(&mut self, arena: &mut Arena<T>) -> Option<SlotId> {
        let head = self.head?;
        self.unlink(arena, head);
        Some(head)
    }

    pub fn next_of<T: Linked>(&self, arena: &Arena<T>, id: SlotId) -> Option<SlotId> {
        arena[id].links().next
    }

    pub fn prev_of<T: Linked>(&self, arena: &Arena<T>, id: SlotId) -> Option<SlotId> {
        arena[id].links().prev
    }

    /// Itera sobre os handles em ordem
    pub fn iter<'a, T: Linked>(&self, arena: &'a Arena<T>) -> ListIter<'a, T> {
        ListIter {
            arena,
            cursor: self.head,
        }
    }
}

pub struct ListIter<'a, T> {
    arena: &'a Arena<T>,
    cursor: Option<SlotId>,
}

impl<'a, T: Linked> Iterator for ListIter<'a, T> {
    type Item = SlotId;

    fn next(&mut self) -> Option<SlotId> {
        let id = self.cursor?;
        self.cursor = self.arena[id].links().next;
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Node {
        value: u32,
        links: Links,
    }

    impl Linked for Node {
        fn links(&self) -> &Links {
            &self.links
        }
        fn links_mut(&mut self) -> &mut Links {
            &mut self.links
        }
    }

    fn node(value: u32) -> Node {
        Node {
            value,
            links: Links::default(),
        }
    }

    fn values(list: &IndexList, arena: &Arena<Node>) -> Vec<u32> {
        list.iter(arena).map(|id| arena[id].value).collect()
    }

    #[test]
    fn unlink_from_middle_keeps_order() {
        let mut arena = Arena::new();
        let mut list = IndexList::new();
        let ids: Vec<_> = (1..=4).map(|v| arena.insert(node(v))).collect();
        for &id in &ids {
            list.push_back(&mut arena, id);
        }

        list.unlink(&mut arena, ids[1]);
        assert_eq!(values(&list, &arena), [1, 3, 4]);

        list.unlink(&mut arena, ids[3]);
        assert_eq!(list.tail(), Some(ids[2]));
        assert_eq!(values(&list, &arena), [1, 3]);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn push_front_then_pop() {
        let mut arena = Arena::new();
        let mut list = IndexList::new();
        let a = arena.insert(node(1));
        let b = arena.insert(node(2));
        list.push_back(&mut arena, a);
        list.push_front(&mut arena, b);

        assert_eq!(values(&list, &arena), [2, 1]);
        assert_eq!(list.pop_front(&mut arena), Some(b));
        assert_eq!(list.pop_front(&mut arena), Some(a));
        assert!(list.pop_front(&mut arena).is_none());
        assert!(list.is_empty());
    }
}
