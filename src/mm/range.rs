//! Alocador de ranges virtuais do processo.
//!
//! First-fit sobre uma lista de buracos ordenada por endereço, granularidade
//! de página. Buracos adjacentes são fundidos no `free`. Não é copiado no
//! fork: o filho recomeça com o range inteiro livre.

use super::{pages_to_bytes, MmError, MmResult, VirtAddr, PAGE_SIZE};
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Hole {
    base: u64,
    pages: usize,
}

impl Hole {
    fn end(&self) -> u64 {
        self.base + pages_to_bytes(self.pages)
    }
}

pub struct VirtualRangePool {
    start: VirtAddr,
    end: VirtAddr,
    holes: Vec<Hole>,
    allocated: BTreeMap<u64, usize>,
}

impl VirtualRangePool {
    /// Cria o pool sobre `[start, end)`. Limites são alinhados para dentro.
    pub fn new(start: VirtAddr, end: VirtAddr) -> Self {
        let base = (start.as_u64() + PAGE_SIZE - 1) & !(PAGE_SIZE - 1);
        let limit = end.as_u64() & !(PAGE_SIZE - 1);
        let pages = if limit > base {
            ((limit - base) / PAGE_SIZE) as usize
        } else {
            0
        };

        let mut holes = Vec::new();
        if pages > 0 {
            holes.push(Hole { base, pages });
        }

        Self {
            start: VirtAddr::new(base),
            end: VirtAddr::new(base + pages_to_bytes(pages)),
            holes,
            allocated: BTreeMap::new(),
        }
    }

    pub fn start(&self) -> VirtAddr {
        self.start
    }

    pub fn end(&self) -> VirtAddr {
        self.end
    }

    /// Reserva `pages` páginas contíguas (primeiro buraco que couber).
    pub fn allocate(&mut self, pages: usize) -> MmResult<VirtAddr> {
        if pages == 0 {
            return Err(MmError::InvalidSize);
        }

        let index = self
            .holes
            .iter()
            .position(|hole| hole.pages >= pages)
            .ok_or(MmError::OutOfMemory)?;

        let hole = &mut self.holes[index];
        let base = hole.base;
        if hole.pages == pages {
            self.holes.remove(index);
        } else {
            hole.base += pages_to_bytes(pages);
            hole.pages -= pages;
        }

        self.allocated.insert(base, pages);
        Ok(VirtAddr::new(base))
    }

    /// Libera um range obtido por `allocate`. Retorna o número de páginas.
    pub fn free(&mut self, base: VirtAddr) -> MmResult<usize> {
        let pages = self
            .allocated
            .remove(&base.as_u64())
            .ok_or(MmError::NotAllocated)?;

        let freed = Hole {
            base: base.as_u64(),
            pages,
        };
        let index = self.holes.partition_point(|hole| hole.base < freed.base);
        self.holes.insert(index, freed);

        // Funde com o vizinho da direita, depois com o da esquerda
        if index + 1 < self.holes.len() && self.holes[index].end() == self.holes[index + 1].base {
            self.holes[index].pages += self.holes[index + 1].pages;
            self.holes.remove(index + 1);
        }
        if index > 0 && self.holes[index - 1].end() == self.holes[index].base {
            self.holes[index - 1].pages += self.holes[index].pages;
            self.holes.remove(index);
        }

        Ok(pages)
    }

    /// Páginas livres no total
    pub fn free_pages(&self) -> usize {
        self.holes.iter().map(|hole| hole.pages).sum()
    }

    /// Número de ranges alocados
    pub fn allocations(&self) -> usize {
        self.allocated.len()
    }
}
