//! # Memory Contract
//!
//! O núcleo de tasking não gerencia memória: ele *consome* um provedor
//! externo (PMM/VMM do kernel) através de `MemoryProvider`. Este módulo
//! define apenas o contrato e os tipos compartilhados:
//!
//! | Módulo     | Responsabilidade |
//! |------------|------------------|
//! | `error`    | `MmError` / `MmResult` |
//! | `provider` | Trait do provedor (stacks, espaços de endereçamento) |
//! | `range`    | Alocador first-fit de ranges virtuais por processo |
//! | `testing`  | Provedor falso para testes de host |

pub mod error;
pub mod provider;
pub mod range;

#[cfg(test)]
pub mod testing;

pub use error::{MmError, MmResult};
pub use provider::{AddressSpace, MemoryProvider};
pub use range::VirtualRangePool;

use core::fmt;

/// Tamanho de página (4 KiB)
pub const PAGE_SIZE: u64 = 4096;

/// Endereço virtual
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct VirtAddr(u64);

impl VirtAddr {
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    pub fn is_page_aligned(self) -> bool {
        self.0 % PAGE_SIZE == 0
    }

    pub fn add(self, offset: u64) -> Self {
        Self(self.0 + offset)
    }
}

impl fmt::Debug for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtAddr({:#x})", self.0)
    }
}

impl fmt::LowerHex for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// Converte páginas em bytes
#[inline]
pub const fn pages_to_bytes(pages: usize) -> u64 {
    pages as u64 * PAGE_SIZE
}
