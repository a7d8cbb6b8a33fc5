//! Criação e destruição de threads e processos.
//!
//! Só lida com recursos (stacks e espaços via `MemoryProvider`) e com a
//! montagem dos registros. Registro nos schedulers e a destruição em duas
//! fases ficam no facade (`sched::tasking`).

use super::process::{fresh_ranges, Process, SecurityLevel};
use super::thread::{
    CpuState, Stack, Thread, ThreadAccounting, ThreadPriority, ThreadState, ThreadType,
    INITIAL_FLAGS, VM86_FLAG,
};
use crate::mm::{AddressSpace, MemoryProvider, VirtAddr};
use crate::sched::config::TaskingConfig;
use crate::sys::error::{TaskingError, TaskingResult};
use crate::sys::types::{Pid, Tid};
use bitflags::bitflags;

bitflags! {
    /// Política de criação
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SpawnFlags: u32 {
        /// Registra no núcleo do chamador em vez do menos carregado
        const ENFORCE_CURRENT_CORE = 1 << 0;
    }
}

/// Parâmetros de uma nova thread
#[derive(Debug, Clone, Copy)]
pub struct ThreadSpec {
    pub tid: Tid,
    pub process: Pid,
    pub space: AddressSpace,
    pub security: SecurityLevel,
    pub thread_type: ThreadType,
    pub priority: ThreadPriority,
    pub entry: VirtAddr,
}

/// Aloca stacks e monta a thread.
///
/// Threads de kernel e idle só recebem stack de kernel. Se a stack de
/// usuário falhar, a de kernel já obtida é devolvida.
pub fn allocate_thread(
    memory: &dyn MemoryProvider,
    config: &TaskingConfig,
    spec: ThreadSpec,
) -> TaskingResult<Thread> {
    let kernel_space = memory.kernel_space();
    let kernel_stack = Stack {
        base: memory.allocate_stack(kernel_space, config.kernel_stack_pages)?,
        pages: config.kernel_stack_pages,
    };

    let needs_user_stack =
        spec.security != SecurityLevel::Kernel && spec.priority != ThreadPriority::Idle;
    let user_stack = if needs_user_stack {
        match memory.allocate_stack(spec.space, config.user_stack_pages) {
            Ok(base) => Some(Stack {
                base,
                pages: config.user_stack_pages,
            }),
            Err(err) => {
                crate::kwarn!("(Lifecycle) Stack de usuário indisponível, TID=", spec.tid.as_u32());
                memory.release_stack(kernel_space, kernel_stack.base, kernel_stack.pages);
                return Err(err.into());
            }
        }
    } else {
        None
    };

    let mut flags = INITIAL_FLAGS;
    if spec.thread_type == ThreadType::Vm86 {
        flags |= VM86_FLAG;
    }
    let stack_top = user_stack.unwrap_or(kernel_stack).top();

    crate::ktrace!("(Lifecycle) Thread criada TID=", spec.tid.as_u32());
    Ok(Thread {
        tid: spec.tid,
        process: spec.process,
        space: spec.space,
        thread_type: spec.thread_type,
        priority: spec.priority,
        state: ThreadState::Ready,
        cpu: CpuState::new(spec.entry, stack_top, flags),
        kernel_stack,
        user_stack,
        tls: VirtAddr::new(0),
        waiter: None,
        wait_result: None,
        identifier: None,
        alive: true,
        pending_signals: Default::default(),
        accounting: ThreadAccounting::default(),
    })
}

/// Clona a thread que fez fork para dentro do processo filho.
///
/// A stack de usuário mantém a mesma base (o espaço do filho é uma cópia
/// CoW); a de kernel é nova. O filho vê 0 como retorno do fork.
pub fn fork_thread(
    memory: &dyn MemoryProvider,
    config: &TaskingConfig,
    parent: &Thread,
    child_tid: Tid,
    child: &Process,
) -> TaskingResult<Thread> {
    if parent.thread_type == ThreadType::Vm86 {
        return Err(TaskingError::NotPermitted);
    }

    let kernel_stack = Stack {
        base: memory.allocate_stack(memory.kernel_space(), config.kernel_stack_pages)?,
        pages: config.kernel_stack_pages,
    };

    let mut cpu = parent.cpu;
    cpu.return_value = 0;

    Ok(Thread {
        tid: child_tid,
        process: child.pid,
        space: child.space,
        thread_type: ThreadType::Main,
        priority: ThreadPriority::Normal,
        state: ThreadState::Ready,
        cpu,
        kernel_stack,
        user_stack: parent.user_stack,
        tls: parent.tls,
        waiter: None,
        wait_result: None,
        identifier: None,
        alive: true,
        pending_signals: Default::default(),
        accounting: ThreadAccounting::default(),
    })
}

/// Devolve as stacks de uma thread destruída.
pub fn release_thread(memory: &dyn MemoryProvider, thread: &Thread) {
    memory.release_stack(
        memory.kernel_space(),
        thread.kernel_stack.base,
        thread.kernel_stack.pages,
    );
    if let Some(stack) = thread.user_stack {
        memory.release_stack(thread.space, stack.base, stack.pages);
    }
}

/// Cria um processo. Processos de kernel compartilham o espaço do kernel.
pub fn create_process(
    memory: &dyn MemoryProvider,
    pid: Pid,
    security: SecurityLevel,
) -> TaskingResult<Process> {
    let process = if security == SecurityLevel::Kernel {
        Process::new(pid, security, memory.kernel_space(), false)
    } else {
        Process::new(pid, security, memory.create_space()?, true)
    };
    crate::kdebug!("(Lifecycle) Processo criado PID=", pid.as_u32());
    Ok(process)
}

/// Cria o processo filho do fork.
///
/// Copia heap, handlers, cwd e argumentos; o espaço vem de `map_cow`. Os
/// ranges virtuais NÃO são copiados.
pub fn fork_process(
    memory: &dyn MemoryProvider,
    parent: &Process,
    child_pid: Pid,
) -> TaskingResult<Process> {
    if parent.security == SecurityLevel::Kernel {
        return Err(TaskingError::NotPermitted);
    }

    let space = memory.map_cow(parent.space)?;
    Ok(Process {
        pid: child_pid,
        security: parent.security,
        space,
        owns_space: true,
        heap: parent.heap,
        ranges: fresh_ranges(),
        signals: parent.signals.clone(),
        parent: Some(parent.pid),
        cwd: parent.cwd.clone(),
        arguments: parent.arguments.clone(),
        main_thread: None,
        threads: 0,
        exiting: false,
    })
}

/// Libera o processo. Destruir um processo com threads vivas corromperia
/// o estado global: é fatal.
pub fn release_process(memory: &dyn MemoryProvider, process: Process) {
    if process.threads != 0 {
        panic!(
            "(Lifecycle) processo {} destruído com {} threads",
            process.pid.as_u32(),
            process.threads
        );
    }
    if process.owns_space {
        memory.release_space(process.space);
    }
    crate::kdebug!("(Lifecycle) Processo liberado PID=", process.pid.as_u32());
}
