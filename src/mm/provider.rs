//! Provedor de memória (colaborador externo)
//!
//! Implementado pelo VMM do kernel. O scheduler só chama operações opacas:
//! alocar/liberar stacks, criar/copiar/liberar espaços e trocar o espaço
//! ativo do núcleo.

use super::{MmResult, VirtAddr};

/// Handle opaco de espaço de endereçamento (ex.: CR3 / raiz da page table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct AddressSpace(pub u64);

impl AddressSpace {
    pub const fn new(handle: u64) -> Self {
        Self(handle)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

pub trait MemoryProvider: Send + Sync {
    /// Reserva `pages` páginas de stack em `space`. Retorna a base.
    fn allocate_stack(&self, space: AddressSpace, pages: usize) -> MmResult<VirtAddr>;

    /// Devolve uma stack obtida por `allocate_stack`.
    fn release_stack(&self, space: AddressSpace, base: VirtAddr, pages: usize);

    /// Espaço do kernel (compartilhado por threads de kernel).
    fn kernel_space(&self) -> AddressSpace;

    /// Cria um espaço vazio para um novo processo.
    fn create_space(&self) -> MmResult<AddressSpace>;

    /// Cria o espaço do filho no fork, marcado copy-on-write. Depois disso
    /// pai e filho possuem espaços independentes.
    fn map_cow(&self, parent: AddressSpace) -> MmResult<AddressSpace>;

    /// Libera um espaço criado por `create_space`/`map_cow`.
    fn release_space(&self, space: AddressSpace);

    /// Ativa `space` no núcleo corrente.
    ///
    /// # Safety
    ///
    /// Chamado apenas no caminho de troca de contexto, com interrupções
    /// desabilitadas, e `space` deve estar vivo.
    unsafe fn switch_space(&self, space: AddressSpace);
}
