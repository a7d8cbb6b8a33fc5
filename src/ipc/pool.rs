//! # Message Pool
//!
//! Alocador de buffers de mensagem por classe de tamanho (32/64/256/2048).
//! Cada classe é uma pilha de blocos livres com lock próprio; quando
//! esvazia, é reabastecida em lote a partir do heap de apoio
//! (`linked_list_allocator::Heap`).
//!
//! Blocos maiores que a maior classe (header + 2048) são alocados no tamanho
//! exato e devolvidos direto ao heap.
//!
//! Ordem de lock: classe → heap de apoio.

use crate::mm::{MmError, MmResult};
use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use core::alloc::Layout;
use core::ptr::NonNull;
use linked_list_allocator::Heap;
use spin::Mutex;

/// Alinhamento de todos os blocos (header contém `usize`)
const BLOCK_ALIGN: usize = core::mem::align_of::<usize>();

/// Classe de tamanho
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    Tiny,
    Small,
    Medium,
    Large,
}

impl SizeClass {
    pub const ALL: [SizeClass; 4] = [Self::Tiny, Self::Small, Self::Medium, Self::Large];

    pub const fn block_size(self) -> usize {
        match self {
            Self::Tiny => 32,
            Self::Small => 64,
            Self::Medium => 256,
            Self::Large => 2048,
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Tiny => 0,
            Self::Small => 1,
            Self::Medium => 2,
            Self::Large => 3,
        }
    }

    /// Menor classe que comporta `size` bytes
    pub fn for_size(size: usize) -> Option<SizeClass> {
        Self::ALL.into_iter().find(|class| size <= class.block_size())
    }
}

/// Bloco de buffer emprestado do pool.
///
/// Possuído exclusivamente por quem o obteve até voltar ao pool.
#[derive(Debug)]
pub struct PoolBlock {
    ptr: NonNull<u8>,
    capacity: usize,
    class: Option<SizeClass>,
}

// Blocos são exclusivos do dono; a memória de apoio vive pelo tempo do kernel.
unsafe impl Send for PoolBlock {}

impl PoolBlock {
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn class(&self) -> Option<SizeClass> {
        self.class
    }

    pub fn bytes(&self) -> &[u8] {
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.capacity) }
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.capacity) }
    }

    fn layout(&self) -> Layout {
        // Construído a partir de um Layout válido em `allocate_raw`
        unsafe { Layout::from_size_align_unchecked(self.capacity, BLOCK_ALIGN) }
    }
}

/// Contadores do pool
#[derive(Debug, Default, Clone, Copy)]
pub struct PoolStats {
    pub refills: u64,
    pub refill_failures: u64,
    pub exact_allocations: u64,
}

pub struct MessagePool {
    classes: [Mutex<Vec<PoolBlock>>; 4],
    backing: Mutex<Heap>,
    refill_batch: usize,
    stats: Mutex<PoolStats>,
}

impl MessagePool {
    /// Cria o pool sobre uma região de memória de tempo de vida do kernel.
    pub fn new(region: &'static mut [u8], refill_batch: usize) -> Self {
        // A região é 'static e exclusiva: nada mais a referencia.
        let heap = unsafe { Heap::new(region.as_mut_ptr(), region.len()) };
        crate::kdebug!("(Pool) Heap de apoio bytes=", region.len());

        Self {
            classes: [
                Mutex::new(Vec::new()),
                Mutex::new(Vec::new()),
                Mutex::new(Vec::new()),
                Mutex::new(Vec::new()),
            ],
            backing: Mutex::new(heap),
            refill_batch: refill_batch.max(1),
            stats: Mutex::new(PoolStats::default()),
        }
    }

    /// Reserva `size` bytes do heap do kernel como região de apoio.
    pub fn with_backing_size(size: usize, refill_batch: usize) -> Self {
        let region: &'static mut [u8] = Box::leak(vec![0u8; size].into_boxed_slice());
        Self::new(region, refill_batch)
    }

    /// Obtém um bloco com pelo menos `size` bytes.
    pub fn acquire(&self, size: usize) -> MmResult<PoolBlock> {
        if size == 0 {
            return Err(MmError::InvalidSize);
        }

        let class = match SizeClass::for_size(size) {
            Some(class) => class,
            None => {
                let block = self.allocate_raw(size, None)?;
                self.stats.lock().exact_allocations += 1;
                return Ok(block);
            }
        };

        let mut free = self.classes[class.index()].lock();
        if free.is_empty() {
            self.refill(class, &mut free)?;
        }
        free.pop().ok_or(MmError::OutOfMemory)
    }

    /// Devolve um bloco.
    pub fn release(&self, block: PoolBlock) {
        match block.class {
            Some(class) => self.classes[class.index()].lock().push(block),
            None => {
                let layout = block.layout();
                unsafe { self.backing.lock().deallocate(block.ptr, layout) };
            }
        }
    }

    /// Reabastece uma classe com até `refill_batch` blocos. Um lote parcial
    /// é aceito; nenhum bloco é falha de alocação.
    fn refill(&self, class: SizeClass, free: &mut Vec<PoolBlock>) -> MmResult<()> {
        let mut added = 0;
        for _ in 0..self.refill_batch {
            match self.allocate_raw(class.block_size(), Some(class)) {
                Ok(block) => {
                    free.push(block);
                    added += 1;
                }
                Err(_) => break,
            }
        }

        let mut stats = self.stats.lock();
        if added == 0 {
            stats.refill_failures += 1;
            crate::kerror!("(Pool) Falha no refill, classe=", class.block_size());
            return Err(MmError::OutOfMemory);
        }

        stats.refills += 1;
        if added < self.refill_batch {
            crate::kwarn!("(Pool) Refill parcial, blocos=", added);
        } else {
            crate::ktrace!("(Pool) Refill classe=", class.block_size());
        }
        Ok(())
    }

    fn allocate_raw(&self, size: usize, class: Option<SizeClass>) -> MmResult<PoolBlock> {
        let layout = Layout::from_size_align(size, BLOCK_ALIGN).map_err(|_| MmError::InvalidSize)?;
        let ptr = self
            .backing
            .lock()
            .allocate_first_fit(layout)
            .map_err(|_| MmError::OutOfMemory)?;
        Ok(PoolBlock {
            ptr,
            capacity: size,
            class,
        })
    }

    /// Blocos livres numa classe
    pub fn free_blocks(&self, class: SizeClass) -> usize {
        self.classes[class.index()].lock().len()
    }

    /// Bytes livres no heap de apoio
    pub fn backing_free(&self) -> usize {
        self.backing.lock().free()
    }

    pub fn stats(&self) -> PoolStats {
        *self.stats.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_smallest_fitting_class() {
        assert_eq!(SizeClass::for_size(1), Some(SizeClass::Tiny));
        assert_eq!(SizeClass::for_size(32), Some(SizeClass::Tiny));
        assert_eq!(SizeClass::for_size(33), Some(SizeClass::Small));
        assert_eq!(SizeClass::for_size(200), Some(SizeClass::Medium));
        assert_eq!(SizeClass::for_size(2048), Some(SizeClass::Large));
        assert_eq!(SizeClass::for_size(2049), None);
    }

    #[test]
    fn empty_class_refills_in_batch() {
        let pool = MessagePool::with_backing_size(64 * 1024, 8);
        let block = pool.acquire(20).unwrap();
        assert_eq!(block.capacity(), 32);
        assert_eq!(pool.free_blocks(SizeClass::Tiny), 7);

        pool.release(block);
        assert_eq!(pool.free_blocks(SizeClass::Tiny), 8);
        assert_eq!(pool.stats().refills, 1);
    }

    #[test]
    fn partial_refill_is_accepted_and_empty_heap_fails() {
        // Cabe menos que um lote de blocos de 2048
        let pool = MessagePool::with_backing_size(3 * 2048 + 512, 32);
        let first = pool.acquire(2000).unwrap();
        let refilled = pool.free_blocks(SizeClass::Large) + 1;
        assert!(refilled > 0 && refilled < 32);

        let mut held = alloc::vec![first];
        while pool.free_blocks(SizeClass::Large) > 0 {
            held.push(pool.acquire(2000).unwrap());
        }
        assert_eq!(pool.acquire(2000).unwrap_err(), MmError::OutOfMemory);
        assert_eq!(pool.stats().refill_failures, 1);

        for block in held {
            pool.release(block);
        }
        assert!(pool.acquire(2000).is_ok());
    }

    #[test]
    fn oversize_block_goes_back_to_heap() {
        let pool = MessagePool::with_backing_size(16 * 1024, 4);
        let before = pool.backing_free();
        let block = pool.acquire(2048 + 16).unwrap();
        assert_eq!(block.class(), None);
        assert!(pool.backing_free() < before);

        pool.release(block);
        assert_eq!(pool.backing_free(), before);
        assert_eq!(pool.stats().exact_allocations, 1);
    }
}
