//! Processo: contêiner de recursos de uma ou mais threads.

use crate::mm::{AddressSpace, VirtAddr, VirtualRangePool};
use crate::sched::config::{USER_HEAP_LIMIT, USER_HEAP_START, USER_RANGE_END, USER_RANGE_START};
use crate::sys::error::{TaskingError, TaskingResult};
use crate::sys::types::{Pid, Tid};
use alloc::string::String;
use bitflags::bitflags;

/// Sinais por processo
pub const SIGNAL_COUNT: usize = 32;

bitflags! {
    /// Máscara de sinais (bit N = sinal N)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SignalSet: u32 {
        const SIGHUP = 1 << 1;
        const SIGINT = 1 << 2;
        const SIGKILL = 1 << 9;
        const SIGTERM = 1 << 15;
        const SIGCHLD = 1 << 17;
    }
}

impl SignalSet {
    /// Conjunto com apenas `signal`
    pub fn of(signal: u32) -> Option<Self> {
        if (signal as usize) < SIGNAL_COUNT {
            Some(Self::from_bits_retain(1 << signal))
        } else {
            None
        }
    }
}

/// Nível de segurança do processo
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecurityLevel {
    Kernel,
    Driver,
    Application,
}

/// Handler de sinal registrado em userspace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalHandler {
    pub entry: VirtAddr,
}

/// Tabela de handlers indexada pelo número do sinal
#[derive(Debug, Clone)]
pub struct SignalTable {
    handlers: [Option<SignalHandler>; SIGNAL_COUNT],
}

impl SignalTable {
    pub const fn new() -> Self {
        Self {
            handlers: [None; SIGNAL_COUNT],
        }
    }

    pub fn get(&self, signal: u32) -> Option<SignalHandler> {
        self.handlers.get(signal as usize).copied().flatten()
    }

    /// Instala (ou remove, com `None`) um handler. SIGKILL não é capturável.
    pub fn set(
        &mut self,
        signal: u32,
        handler: Option<SignalHandler>,
    ) -> TaskingResult<Option<SignalHandler>> {
        if signal == 9 {
            return Err(TaskingError::NotPermitted);
        }
        let slot = self
            .handlers
            .get_mut(signal as usize)
            .ok_or(TaskingError::InvalidArgument)?;
        Ok(core::mem::replace(slot, handler))
    }
}

impl Default for SignalTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Heap do processo (`sbrk`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapRange {
    pub start: VirtAddr,
    pub brk: VirtAddr,
    pub limit: VirtAddr,
}

impl HeapRange {
    pub fn user_default() -> Self {
        Self {
            start: VirtAddr::new(USER_HEAP_START),
            brk: VirtAddr::new(USER_HEAP_START),
            limit: VirtAddr::new(USER_HEAP_LIMIT),
        }
    }

    /// Move o break por `delta` bytes. Retorna o break antigo.
    pub fn sbrk(&mut self, delta: i64) -> TaskingResult<VirtAddr> {
        let old = self.brk;
        let new = (old.as_u64() as i64)
            .checked_add(delta)
            .filter(|&brk| brk >= self.start.as_u64() as i64 && brk <= self.limit.as_u64() as i64)
            .ok_or(TaskingError::InvalidArgument)?;
        self.brk = VirtAddr::new(new as u64);
        Ok(old)
    }
}

pub struct Process {
    pub pid: Pid,
    pub security: SecurityLevel,
    pub space: AddressSpace,
    /// `false` para processos que usam o espaço do kernel
    pub owns_space: bool,
    pub heap: HeapRange,
    pub ranges: VirtualRangePool,
    pub signals: SignalTable,
    pub parent: Option<Pid>,
    pub cwd: String,
    pub arguments: String,
    pub main_thread: Option<Tid>,
    /// Threads ainda não destruídas
    pub threads: usize,
    /// Encerrado por `kill_process`; não aceita threads novas
    pub exiting: bool,
}

impl Process {
    pub fn new(pid: Pid, security: SecurityLevel, space: AddressSpace, owns_space: bool) -> Self {
        Self {
            pid,
            security,
            space,
            owns_space,
            heap: HeapRange::user_default(),
            ranges: fresh_ranges(),
            signals: SignalTable::new(),
            parent: None,
            cwd: String::from("/"),
            arguments: String::new(),
            main_thread: None,
            threads: 0,
            exiting: false,
        }
    }

    pub fn info(&self) -> ProcessInfo {
        ProcessInfo {
            pid: self.pid,
            security: self.security,
            parent: self.parent,
            main_thread: self.main_thread,
            threads: self.threads,
            heap_break: self.heap.brk,
            cwd: self.cwd.clone(),
            arguments: self.arguments.clone(),
        }
    }
}

/// Ranges de usuário recém-inicializados (também usados pelo filho no fork)
pub fn fresh_ranges() -> VirtualRangePool {
    VirtualRangePool::new(VirtAddr::new(USER_RANGE_START), VirtAddr::new(USER_RANGE_END))
}

/// Snapshot de um processo para introspecção
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: Pid,
    pub security: SecurityLevel,
    pub parent: Option<Pid>,
    pub main_thread: Option<Tid>,
    pub threads: usize,
    pub heap_break: VirtAddr,
    pub cwd: String,
    pub arguments: String,
}
