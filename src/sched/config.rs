//! Constantes de configuração do Scheduler
//!
//! Valores padrão em tempo de compilação; `TaskingConfig` permite
//! sobrescrever parte deles pela linha de comando do kernel.

use crate::klib::cmdline::CommandLine;

/// Núcleos gerenciados (um scheduler por núcleo)
pub const DEFAULT_CORES: usize = 1;

/// Limite de núcleos suportados
pub const MAX_CORES: usize = 64;

/// Páginas da stack de kernel de cada thread (16 KiB)
pub const KERNEL_STACK_PAGES: usize = 4;

/// Páginas da stack de usuário de cada thread (64 KiB)
pub const USER_STACK_PAGES: usize = 16;

/// Intervalo do timer em milissegundos
pub const DEFAULT_TICK_MS: u64 = 10;

/// Blocos obtidos por refill de uma classe do pool de mensagens
pub const POOL_REFILL_BATCH: usize = 32;

/// Heap de apoio do pool de mensagens (512 KiB)
pub const IPC_BACKING_HEAP_SIZE: usize = 512 * 1024;

/// Tamanho máximo de um identificador de thread
pub const IDENTIFIER_MAX_LEN: usize = 64;

/// Base e limite do heap (`sbrk`) de processos de usuário
pub const USER_HEAP_START: u64 = 0x1000_0000;
pub const USER_HEAP_LIMIT: u64 = 0x4000_0000;

/// Janela do alocador de ranges virtuais de usuário
pub const USER_RANGE_START: u64 = 0x4000_0000;
pub const USER_RANGE_END: u64 = 0x7000_0000_0000;

/// Configuração efetiva do núcleo de tasking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskingConfig {
    pub cores: usize,
    pub kernel_stack_pages: usize,
    pub user_stack_pages: usize,
    pub tick_ms: u64,
    pub refill_batch: usize,
    pub backing_heap_size: usize,
}

impl Default for TaskingConfig {
    fn default() -> Self {
        Self {
            cores: DEFAULT_CORES,
            kernel_stack_pages: KERNEL_STACK_PAGES,
            user_stack_pages: USER_STACK_PAGES,
            tick_ms: DEFAULT_TICK_MS,
            refill_batch: POOL_REFILL_BATCH,
            backing_heap_size: IPC_BACKING_HEAP_SIZE,
        }
    }
}

impl TaskingConfig {
    pub fn with_cores(mut self, cores: usize) -> Self {
        self.cores = cores.clamp(1, MAX_CORES);
        self
    }

    /// Aplica `sched.*` / `ipc.*` da linha de comando sobre os padrões.
    ///
    /// Chaves desconhecidas desses namespaces geram aviso; valores
    /// inválidos (não numéricos ou zero) mantêm o padrão.
    pub fn from_cmdline(cmdline: &CommandLine) -> Self {
        let mut config = Self::default();

        for (key, _) in cmdline.entries() {
            if !(key.starts_with("sched.") || key.starts_with("ipc.")) {
                continue;
            }

            let value = match cmdline.get_usize(key) {
                Some(value) if value > 0 => value,
                _ => {
                    crate::kwarn!("(Sched) Valor inválido na cmdline, mantendo padrão");
                    continue;
                }
            };

            match key {
                "sched.cores" => config.cores = value.min(MAX_CORES),
                "sched.kstack_pages" => config.kernel_stack_pages = value,
                "sched.ustack_pages" => config.user_stack_pages = value,
                "sched.tick_ms" => config.tick_ms = value as u64,
                "ipc.refill_batch" => config.refill_batch = value,
                _ => crate::kwarn!("(Sched) Chave desconhecida na cmdline"),
            }
        }

        config
    }
}
