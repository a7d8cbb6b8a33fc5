//! Provedor de memória falso para testes de host.

use super::{AddressSpace, MemoryProvider, MmError, MmResult, VirtAddr, PAGE_SIZE};
use core::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// Espaço do kernel no provedor falso
pub const FAKE_KERNEL_SPACE: AddressSpace = AddressSpace(0x1000);

/// Entrega stacks e espaços a partir de contadores, e conta tudo.
pub struct FakeMemory {
    next_stack: AtomicU64,
    next_space: AtomicU64,
    pub stacks_live: AtomicUsize,
    pub spaces_live: AtomicUsize,
    pub switches: AtomicUsize,
    pub last_switch: AtomicU64,
    pub cow_copies: AtomicUsize,
    /// Falha as próximas N alocações de stack
    pub fail_stacks: AtomicUsize,
    /// Falha a próxima alocação de stack depois de N sucessos
    pub fail_stack_after: AtomicUsize,
    pub fail_spaces: AtomicBool,
}

impl FakeMemory {
    pub const fn new() -> Self {
        Self {
            next_stack: AtomicU64::new(0x10_0000),
            next_space: AtomicU64::new(0x2000),
            stacks_live: AtomicUsize::new(0),
            spaces_live: AtomicUsize::new(0),
            switches: AtomicUsize::new(0),
            last_switch: AtomicU64::new(0),
            cow_copies: AtomicUsize::new(0),
            fail_stacks: AtomicUsize::new(0),
            fail_stack_after: AtomicUsize::new(usize::MAX),
            fail_spaces: AtomicBool::new(false),
        }
    }

    pub fn stacks(&self) -> usize {
        self.stacks_live.load(Ordering::SeqCst)
    }

    pub fn spaces(&self) -> usize {
        self.spaces_live.load(Ordering::SeqCst)
    }
}

impl Default for FakeMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProvider for FakeMemory {
    fn allocate_stack(&self, _space: AddressSpace, pages: usize) -> MmResult<VirtAddr> {
        if pages == 0 {
            return Err(MmError::InvalidSize);
        }
        if self.fail_stacks.load(Ordering::SeqCst) > 0 {
            self.fail_stacks.fetch_sub(1, Ordering::SeqCst);
            return Err(MmError::StackUnavailable);
        }
        let remaining = self.fail_stack_after.load(Ordering::SeqCst);
        if remaining == 0 {
            self.fail_stack_after.store(usize::MAX, Ordering::SeqCst);
            return Err(MmError::StackUnavailable);
        }
        if remaining != usize::MAX {
            self.fail_stack_after.store(remaining - 1, Ordering::SeqCst);
        }

        // Um page de guarda entre stacks
        let span = (pages as u64 + 1) * PAGE_SIZE;
        let base = self.next_stack.fetch_add(span, Ordering::SeqCst);
        self.stacks_live.fetch_add(1, Ordering::SeqCst);
        Ok(VirtAddr::new(base))
    }

    fn release_stack(&self, _space: AddressSpace, _base: VirtAddr, _pages: usize) {
        self.stacks_live.fetch_sub(1, Ordering::SeqCst);
    }

    fn kernel_space(&self) -> AddressSpace {
        FAKE_KERNEL_SPACE
    }

    fn create_space(&self) -> MmResult<AddressSpace> {
        if self.fail_spaces.load(Ordering::SeqCst) {
            return Err(MmError::SpaceUnavailable);
        }
        self.spaces_live.fetch_add(1, Ordering::SeqCst);
        Ok(AddressSpace(self.next_space.fetch_add(0x1000, Ordering::SeqCst)))
    }

    fn map_cow(&self, _parent: AddressSpace) -> MmResult<AddressSpace> {
        let child = self.create_space()?;
        self.cow_copies.fetch_add(1, Ordering::SeqCst);
        Ok(child)
    }

    fn release_space(&self, _space: AddressSpace) {
        self.spaces_live.fetch_sub(1, Ordering::SeqCst);
    }

    unsafe fn switch_space(&self, space: AddressSpace) {
        self.switches.fetch_add(1, Ordering::SeqCst);
        self.last_switch.store(space.as_u64(), Ordering::SeqCst);
    }
}
