//! Finalização da troca de contexto.
//!
//! Depois que o scheduler escolhe a próxima thread, o estado por núcleo é
//! ajustado (topo da stack de kernel, TLS) e o espaço de endereçamento é
//! trocado se mudou. A troca de registradores em si acontece no retorno do
//! trap, fora deste núcleo, a partir do `CpuState` da thread escolhida.

use crate::mm::{AddressSpace, MemoryProvider, VirtAddr};
use crate::sched::task::Thread;

/// Estado de hardware instalado em um núcleo
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreState {
    /// Stack usada na próxima entrada no kernel (TSS.rsp0)
    pub kernel_stack_top: VirtAddr,
    /// Base de TLS (FS base)
    pub tls: VirtAddr,
    pub active_space: Option<AddressSpace>,
    /// Trocas de espaço efetivas
    pub space_switches: u64,
}

/// Instala a thread escolhida no núcleo.
pub fn finalize(core: &mut CoreState, thread: &Thread, memory: &dyn MemoryProvider) {
    core.kernel_stack_top = thread.kernel_stack_top();
    core.tls = thread.tls;

    if core.active_space != Some(thread.space) {
        // O espaço pertence a um processo vivo: a thread escolhida o referencia.
        unsafe { memory.switch_space(thread.space) };
        core.active_space = Some(thread.space);
        core.space_switches += 1;
        crate::ktrace!("(Sched) Espaço trocado para=", thread.space.as_u64());
    }
}
