//! Thread Control Block

use super::process::SignalSet;
use crate::mm::{pages_to_bytes, AddressSpace, VirtAddr};
use crate::sched::waiter::{WaitResult, Waiter};
use crate::sys::types::{Pid, Tid};
use alloc::string::String;

/// Tipo da thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadType {
    /// Primeira thread de um processo
    Main,
    /// Thread adicional
    Sub,
    /// Thread em modo virtual-8086 (não pode fazer fork)
    Vm86,
}

/// Prioridade de scheduling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadPriority {
    Normal,
    /// Apenas a idle thread de cada núcleo
    Idle,
}

/// Estado de uma thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Na run queue, esperando CPU
    Ready,
    /// Executando no seu núcleo
    Running,
    /// Na wait queue, com waiter
    Waiting,
    /// Morta, aguardando remoção pelo scheduler
    Dead,
}

impl ThreadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Waiting => "waiting",
            Self::Dead => "dead",
        }
    }
}

/// Flags iniciais: IF ligado
pub const INITIAL_FLAGS: u64 = 0x202;

/// Flag VM (virtual-8086)
pub const VM86_FLAG: u64 = 1 << 17;

/// Estado de registradores salvo no trap.
///
/// Opaco para o scheduler: só é copiado para dentro e para fora da thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct CpuState {
    pub ip: u64,
    pub sp: u64,
    pub flags: u64,
    /// Registrador de retorno de syscall (rax)
    pub return_value: u64,
    pub regs: [u64; 14],
}

impl CpuState {
    pub fn new(entry: VirtAddr, stack_top: VirtAddr, flags: u64) -> Self {
        Self {
            ip: entry.as_u64(),
            sp: stack_top.as_u64(),
            flags,
            ..Self::default()
        }
    }
}

/// Região de stack possuída pela thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stack {
    pub base: VirtAddr,
    pub pages: usize,
}

impl Stack {
    pub fn top(&self) -> VirtAddr {
        self.base.add(pages_to_bytes(self.pages))
    }
}

/// Contadores por thread
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadAccounting {
    /// Vezes escolhida pelo scheduler
    pub times_scheduled: u64,
    /// Vezes que entrou na wait queue
    pub times_waited: u64,
}

pub struct Thread {
    pub tid: Tid,
    pub process: Pid,
    /// Espaço do processo dono (cópia do handle)
    pub space: AddressSpace,
    pub thread_type: ThreadType,
    pub priority: ThreadPriority,
    pub state: ThreadState,
    pub cpu: CpuState,
    pub kernel_stack: Stack,
    pub user_stack: Option<Stack>,
    /// Base do TLS instalada no núcleo ao rodar
    pub tls: VirtAddr,
    pub waiter: Option<Waiter>,
    pub wait_result: Option<WaitResult>,
    pub identifier: Option<String>,
    pub alive: bool,
    /// Sinais com handler ainda não drenados. Enquanto não vazio, quebra
    /// qualquer espera.
    pub pending_signals: SignalSet,
    pub accounting: ThreadAccounting,
}

impl Thread {
    pub fn is_idle(&self) -> bool {
        self.priority == ThreadPriority::Idle
    }

    /// Topo de stack usado ao entrar no kernel
    pub fn kernel_stack_top(&self) -> VirtAddr {
        self.kernel_stack.top()
    }

    /// Marca como morta. Remoção acontece no próximo `schedule` do núcleo.
    pub fn mark_dead(&mut self) {
        self.alive = false;
        self.state = ThreadState::Dead;
    }

    pub fn info(&self) -> ThreadInfo {
        ThreadInfo {
            tid: self.tid,
            process: self.process,
            thread_type: self.thread_type,
            priority: self.priority,
            state: self.state,
            identifier: self.identifier.clone(),
            accounting: self.accounting,
        }
    }
}

/// Snapshot de uma thread para introspecção
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    pub tid: Tid,
    pub process: Pid,
    pub thread_type: ThreadType,
    pub priority: ThreadPriority,
    pub state: ThreadState,
    pub identifier: Option<String>,
    pub accounting: ThreadAccounting,
}

#[cfg(test)]
impl Thread {
    /// Thread sem stacks reais, para testes de fila.
    pub(crate) fn bare(tid: u32, process: u32, priority: ThreadPriority) -> Self {
        let stack = Stack {
            base: VirtAddr::new(0x10_0000 + tid as u64 * 0x1_0000),
            pages: 1,
        };
        Self {
            tid: Tid::new(tid),
            process: Pid::new(process),
            space: AddressSpace::new(0x1000 * (process as u64 + 1)),
            thread_type: ThreadType::Main,
            priority,
            state: ThreadState::Ready,
            cpu: CpuState::default(),
            kernel_stack: stack,
            user_stack: None,
            tls: VirtAddr::new(0),
            waiter: None,
            wait_result: None,
            identifier: None,
            alive: true,
            pending_signals: SignalSet::empty(),
            accounting: ThreadAccounting::default(),
        }
    }
}
