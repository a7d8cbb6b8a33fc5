//! Arena com handles inteiros estáveis.
//!
//! Um `SlotId` continua válido enquanto o elemento não for removido.
//! Slots livres são reaproveitados (LIFO), então um handle antigo pode
//! apontar para um elemento novo depois de `remove`.

use alloc::vec::Vec;

/// Handle de um slot da arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct SlotId(u32);

impl SlotId {
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

enum Slot<T> {
    Occupied(T),
    Free { next_free: Option<SlotId> },
}

pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<SlotId>,
    len: usize,
}

impl<T> Arena<T> {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            len: 0,
        }
    }

    /// Insere elemento e retorna seu handle
    pub fn insert(&mut self, value: T) -> SlotId {
        self.len += 1;
        match self.free_head {
            Some(id) => {
                let slot = &mut self.slots[id.as_usize()];
                self.free_head = match slot {
                    Slot::Free { next_free } => *next_free,
                    Slot::Occupied(_) => unreachable!("free list aponta para slot ocupado"),
                };
                *slot = Slot::Occupied(value);
                id
            }
            None => {
                let id = SlotId(self.slots.len() as u32);
                self.slots.push(Slot::Occupied(value));
                id
            }
        }
    }

    /// Remove elemento, devolvendo-o
    pub fn remove(&mut self, id: SlotId) -> Option<T> {
        let slot = self.slots.get_mut(id.as_usize())?;
        if matches!(slot, Slot::Free { .. }) {
            return None;
        }

        let old = core::mem::replace(
            slot,
            Slot::Free {
                next_free: self.free_head,
            },
        );
        self.free_head = Some(id);
        self.len -= 1;

        match old {
            Slot::Occupied(value) => Some(value),
            Slot::Free { .. } => None,
        }
    }

    pub fn get(&self, id: SlotId) -> Option<&T> {
        match self.slots.get(id.as_usize()) {
            Some(Slot::Occupied(value)) => Some(value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        match self.slots.get_mut(id.as_usize()) {
            Some(Slot::Occupied(value)) => Some(value),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Itera sobre (handle, elemento) ocupados
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied(value) => Some((SlotId(index as u32), value)),
                Slot::Free { .. } => None,
            })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SlotId, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied(value) => Some((SlotId(index as u32), value)),
                Slot::Free { .. } => None,
            })
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> core::ops::Index<SlotId> for Arena<T> {
    type Output = T;

    fn index(&self, id: SlotId) -> &T {
        match self.get(id) {
            Some(value) => value,
            None => panic!("(Arena) slot livre acessado"),
        }
    }
}

impl<T> core::ops::IndexMut<SlotId> for Arena<T> {
    fn index_mut(&mut self, id: SlotId) -> &mut T {
        match self.get_mut(id) {
            Some(value) => value,
            None => panic!("(Arena) slot livre acessado"),
        }
    }
}
