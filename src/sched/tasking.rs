//! # Tasking Facade
//!
//! Multiplexa os schedulers de todos os núcleos e concentra o estado
//! global do núcleo de tasking: tabela de processos, registro de
//! identificadores, controller de mensagens, tabela de IRQs e relógio.
//!
//! ## Locks
//!
//! - `global`: operações que atravessam núcleos (placement, lookups,
//!   kill). Adquirido antes de qualquer scheduler.
//! - `cores[n]`: o scheduler do núcleo. O caminho `save`/`schedule` do
//!   próprio núcleo não toma o `global`.
//! - `directory`: folha. Onde cada thread vive e se está viva.
//! - `processes` e `identifiers`: nunca adquiridos com um scheduler em mãos.
//!
//! ## Destruição em duas fases
//!
//! 1. `exit_thread`/`kill_process` marcam a thread como morta. O scheduler
//!    do núcleo a remove das filas no próximo `schedule`.
//! 2. As threads removidas são destruídas aqui, fora do lock do núcleo:
//!    mailbox, stacks e, com a última thread, o processo.

use super::config::{TaskingConfig, IDENTIFIER_MAX_LEN, MAX_CORES};
use super::core::{QueueKind, ScheduleEnv, Scheduler, SchedulerStats};
use super::task::lifecycle::{
    allocate_thread, create_process, fork_process, fork_thread, release_process, release_thread,
};
use super::task::{
    CpuState, Process, ProcessInfo, SecurityLevel, SignalHandler, SignalSet, SpawnFlags, Thread,
    ThreadInfo, ThreadPriority, ThreadSpec, ThreadType,
};
use super::time::Clock;
use super::waiter::{IrqTable, ThreadLiveness, WaitContext, WaitResult, Waiter};
use crate::debug::sink::publish_identifier;
use crate::ipc::{MessageController, MessagePool, ReceiveStatus, SendStatus};
use crate::mm::{MemoryProvider, VirtAddr};
use crate::sync::AtomicCounter;
use crate::sys::error::{TaskingError, TaskingResult};
use crate::sys::types::{CoreId, Pid, Tid, TransactionId};
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use spin::Mutex;

// =============================================================================
// DIRECTORY
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct DirectoryEntry {
    core: CoreId,
    alive: bool,
}

/// Diretório global de threads: núcleo dono e vida.
///
/// Consultado pelos checks de join e de send bloqueante, que rodam com o
/// lock de outro núcleo em mãos.
pub struct Directory {
    entries: Mutex<BTreeMap<Tid, DirectoryEntry>>,
}

impl Directory {
    const fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    fn insert(&self, tid: Tid, core: CoreId) {
        self.entries
            .lock()
            .insert(tid, DirectoryEntry { core, alive: true });
    }

    fn remove(&self, tid: Tid) {
        self.entries.lock().remove(&tid);
    }

    fn mark_dead(&self, tid: Tid) {
        if let Some(entry) = self.entries.lock().get_mut(&tid) {
            entry.alive = false;
        }
    }

    pub fn core_of(&self, tid: Tid) -> Option<CoreId> {
        self.entries.lock().get(&tid).map(|entry| entry.core)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl ThreadLiveness for Directory {
    fn is_alive(&self, tid: Tid) -> bool {
        self.entries
            .lock()
            .get(&tid)
            .is_some_and(|entry| entry.alive)
    }
}

// =============================================================================
// PUBLIC TYPES
// =============================================================================

/// Thread criada e onde ela foi registrada
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadHandle {
    pub tid: Tid,
    pub pid: Pid,
    pub core: CoreId,
}

/// Thread escolhida por um `schedule` e o estado a restaurar no retorno
/// do trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub tid: Tid,
    pub state: CpuState,
}

/// Parâmetros de um novo processo
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub security: SecurityLevel,
    pub entry: VirtAddr,
    pub flags: SpawnFlags,
    pub parent: Option<Pid>,
    pub cwd: String,
    pub arguments: String,
}

impl ProcessSpec {
    pub fn new(security: SecurityLevel, entry: VirtAddr) -> Self {
        Self {
            security,
            entry,
            flags: SpawnFlags::empty(),
            parent: None,
            cwd: String::from("/"),
            arguments: String::new(),
        }
    }

    pub fn flags(mut self, flags: SpawnFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn parent(mut self, parent: Pid) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn cwd(mut self, cwd: &str) -> Self {
        self.cwd = String::from(cwd);
        self
    }

    pub fn arguments(mut self, arguments: &str) -> Self {
        self.arguments = String::from(arguments);
        self
    }
}

// =============================================================================
// TASKING
// =============================================================================

pub struct Tasking {
    config: TaskingConfig,
    memory: &'static dyn MemoryProvider,
    global: Mutex<()>,
    cores: Vec<Mutex<Scheduler>>,
    directory: Directory,
    processes: Mutex<BTreeMap<Pid, Process>>,
    identifiers: Mutex<BTreeMap<String, Tid>>,
    messages: MessageController,
    irqs: IrqTable,
    clock: Clock,
    next_tid: AtomicCounter,
    next_pid: AtomicCounter,
}

impl Tasking {
    /// Cria o processo do kernel e uma idle thread por núcleo.
    pub fn new(
        config: TaskingConfig,
        memory: &'static dyn MemoryProvider,
        idle_entry: VirtAddr,
    ) -> TaskingResult<Self> {
        let core_count = config.cores.clamp(1, MAX_CORES);
        crate::kinfo!("(Tasking) Inicializando núcleos=", core_count);

        let mut kernel = create_process(memory, Pid::KERNEL, SecurityLevel::Kernel)?;
        let next_tid = AtomicCounter::new(1);
        let mut idle_threads = Vec::with_capacity(core_count);

        for index in 0..core_count {
            let spec = ThreadSpec {
                tid: Tid::new(next_tid.inc() as u32),
                process: kernel.pid,
                space: kernel.space,
                security: SecurityLevel::Kernel,
                thread_type: ThreadType::Main,
                priority: ThreadPriority::Idle,
                entry: idle_entry,
            };
            match allocate_thread(memory, &config, spec) {
                Ok(idle) => idle_threads.push(idle),
                Err(err) => {
                    crate::kerror!("(Tasking) Falha ao criar idle do núcleo=", index);
                    for idle in &idle_threads {
                        release_thread(memory, idle);
                    }
                    release_process(memory, kernel);
                    return Err(err);
                }
            }
        }

        let directory = Directory::new();
        let mut cores = Vec::with_capacity(core_count);
        for (index, idle) in idle_threads.into_iter().enumerate() {
            let core = CoreId::new(index);
            directory.insert(idle.tid, core);
            kernel.threads += 1;
            cores.push(Mutex::new(Scheduler::new(core, idle)));
        }

        let mut processes = BTreeMap::new();
        processes.insert(kernel.pid, kernel);

        let pool = MessagePool::with_backing_size(config.backing_heap_size, config.refill_batch);
        crate::kok!("(Tasking) Núcleo de tasking pronto");

        Ok(Self {
            config,
            memory,
            global: Mutex::new(()),
            cores,
            directory,
            processes: Mutex::new(processes),
            identifiers: Mutex::new(BTreeMap::new()),
            messages: MessageController::new(pool),
            irqs: IrqTable::new(),
            clock: Clock::new(),
            next_tid,
            next_pid: AtomicCounter::new(1),
        })
    }

    pub fn config(&self) -> &TaskingConfig {
        &self.config
    }

    pub fn messages(&self) -> &MessageController {
        &self.messages
    }

    pub fn irqs(&self) -> &IrqTable {
        &self.irqs
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn core_count(&self) -> usize {
        self.cores.len()
    }

    /// Milissegundos desde o boot
    pub fn now(&self) -> u64 {
        self.clock.millis()
    }

    // =========================================================================
    // INTERNAL HELPERS
    // =========================================================================

    fn core(&self, core: CoreId) -> TaskingResult<&Mutex<Scheduler>> {
        self.cores.get(core.index()).ok_or(TaskingError::NoSuchCore)
    }

    fn wait_context(&self) -> WaitContext<'_> {
        WaitContext {
            now: self.clock.millis(),
            messages: &self.messages,
            irqs: &self.irqs,
            liveness: &self.directory,
        }
    }

    /// Executa `f` no scheduler dono de `tid`, sob o lock global.
    fn with_scheduler<R>(
        &self,
        tid: Tid,
        f: impl FnOnce(&mut Scheduler) -> R,
    ) -> TaskingResult<R> {
        let _global = self.global.lock();
        let core = self
            .directory
            .core_of(tid)
            .ok_or(TaskingError::NoSuchThread)?;
        let mut scheduler = self.cores[core.index()].lock();
        Ok(f(&mut scheduler))
    }

    fn with_thread<R>(&self, tid: Tid, f: impl FnOnce(&mut Thread) -> R) -> TaskingResult<R> {
        self.with_scheduler(tid, |scheduler| scheduler.get_task_by_id_mut(tid).map(f))?
            .ok_or(TaskingError::NoSuchThread)
    }

    fn allocate_tid(&self) -> Tid {
        Tid::new(self.next_tid.inc() as u32)
    }

    fn allocate_pid(&self) -> Pid {
        Pid::new(self.next_pid.inc() as u32)
    }

    /// Núcleo com a menor run queue. Empate fica com o menor índice.
    fn least_loaded(&self) -> CoreId {
        self.cores
            .iter()
            .enumerate()
            .min_by_key(|(_, scheduler)| scheduler.lock().calculate_load())
            .map_or(CoreId::BOOT, |(index, _)| CoreId::new(index))
    }

    /// Registra a thread num scheduler. `caller` já foi validado.
    ///
    /// Se o processo foi encerrado enquanto a thread era criada, a thread é
    /// descartada e o resultado é `NoSuchProcess`.
    fn place(&self, thread: Thread, flags: SpawnFlags, caller: CoreId) -> TaskingResult<CoreId> {
        let global = self.global.lock();
        let exiting = self
            .processes
            .lock()
            .get(&thread.process)
            .map_or(true, |process| process.exiting);
        if exiting {
            drop(global);
            crate::kdebug!("(Tasking) Processo encerrado durante criação, TID=", thread.tid.as_u32());
            release_thread(self.memory, &thread);
            self.drop_thread_ref(thread.process);
            return Err(TaskingError::NoSuchProcess);
        }

        let core = if flags.contains(SpawnFlags::ENFORCE_CURRENT_CORE) {
            caller
        } else {
            self.least_loaded()
        };

        let tid = thread.tid;
        self.cores[core.index()].lock().add(thread);
        self.directory.insert(tid, core);

        crate::kdebug!("(Tasking) Thread registrada no núcleo=", core.index());
        Ok(core)
    }

    /// Desconta uma thread do processo; libera o processo com a última.
    fn drop_thread_ref(&self, pid: Pid) {
        let finished = {
            let mut processes = self.processes.lock();
            let remaining = match processes.get_mut(&pid) {
                Some(process) => {
                    process.threads = process.threads.saturating_sub(1);
                    process.threads
                }
                None => return,
            };
            if remaining == 0 {
                processes.remove(&pid)
            } else {
                None
            }
        };

        if let Some(process) = finished {
            release_process(self.memory, process);
        }
    }

    /// Fase 2 da destruição. Chamado sem nenhum lock de núcleo.
    fn destroy_thread(&self, thread: Thread) {
        let tid = thread.tid;
        self.directory.remove(tid);

        if let Some(name) = thread.identifier.as_deref() {
            let mut identifiers = self.identifiers.lock();
            if identifiers.get(name) == Some(&tid) {
                identifiers.remove(name);
            }
        }

        let dropped = self.messages.clear(tid);
        if dropped > 0 {
            crate::kdebug!("(Tasking) Mensagens descartadas=", dropped);
        }

        release_thread(self.memory, &thread);
        self.drop_thread_ref(thread.process);
        crate::kdebug!("(Tasking) Thread destruída TID=", tid.as_u32());
    }

    // =========================================================================
    // TRAP PATH
    // =========================================================================

    /// Entrada de trap: guarda o estado na thread em execução. Se o núcleo
    /// ainda não rodou nada, escalona imediatamente.
    pub fn save(&self, core: CoreId, state: &CpuState) -> TaskingResult<Selection> {
        let saved = {
            let mut scheduler = self.core(core)?.lock();
            scheduler.save(state).map(|thread| Selection {
                tid: thread.tid,
                state: thread.cpu,
            })
        };
        match saved {
            Some(selection) => Ok(selection),
            None => self.schedule(core),
        }
    }

    /// Escolhe a próxima thread do núcleo e destrói as que foram removidas.
    pub fn schedule(&self, core: CoreId) -> TaskingResult<Selection> {
        let scheduler = self.core(core)?;
        let (selection, reaped) = {
            let mut scheduler = scheduler.lock();
            let env = ScheduleEnv {
                wait: self.wait_context(),
                memory: self.memory,
            };
            let thread = scheduler.schedule(&env);
            let selection = Selection {
                tid: thread.tid,
                state: thread.cpu,
            };
            (selection, scheduler.take_reaped())
        };

        for thread in reaped {
            self.destroy_thread(thread);
        }
        Ok(selection)
    }

    /// Tick do timer: o núcleo de boot avança o relógio; todos escalonam.
    pub fn schedule_tick(&self, core: CoreId) -> TaskingResult<Selection> {
        if core == CoreId::BOOT {
            self.clock.update_milliseconds(self.config.tick_ms);
        }
        self.schedule(core)
    }

    // =========================================================================
    // CREATION
    // =========================================================================

    /// Cria um processo com sua thread principal.
    pub fn spawn_process(&self, spec: ProcessSpec, caller: CoreId) -> TaskingResult<ThreadHandle> {
        self.core(caller)?;

        let pid = self.allocate_pid();
        let mut process = create_process(self.memory, pid, spec.security)?;

        let tid = self.allocate_tid();
        let thread_spec = ThreadSpec {
            tid,
            process: pid,
            space: process.space,
            security: spec.security,
            thread_type: ThreadType::Main,
            priority: ThreadPriority::Normal,
            entry: spec.entry,
        };
        let thread = match allocate_thread(self.memory, &self.config, thread_spec) {
            Ok(thread) => thread,
            Err(err) => {
                crate::kwarn!("(Tasking) Falha ao criar thread principal do PID=", pid.as_u32());
                release_process(self.memory, process);
                return Err(err);
            }
        };

        process.main_thread = Some(tid);
        process.threads = 1;
        process.parent = spec.parent;
        process.cwd = spec.cwd;
        process.arguments = spec.arguments;
        self.processes.lock().insert(pid, process);

        let core = self.place(thread, spec.flags, caller)?;
        crate::kinfo!("(Tasking) Processo criado PID=", pid.as_u32());
        Ok(ThreadHandle { tid, pid, core })
    }

    /// Adiciona uma thread a um processo existente.
    pub fn spawn_thread(
        &self,
        pid: Pid,
        entry: VirtAddr,
        flags: SpawnFlags,
        caller: CoreId,
    ) -> TaskingResult<ThreadHandle> {
        self.core(caller)?;

        let (space, security) = {
            let mut processes = self.processes.lock();
            let process = processes
                .get_mut(&pid)
                .filter(|process| process.threads > 0 && !process.exiting)
                .ok_or(TaskingError::NoSuchProcess)?;
            process.threads += 1;
            (process.space, process.security)
        };

        let tid = self.allocate_tid();
        let spec = ThreadSpec {
            tid,
            process: pid,
            space,
            security,
            thread_type: ThreadType::Sub,
            priority: ThreadPriority::Normal,
            entry,
        };
        let thread = match allocate_thread(self.memory, &self.config, spec) {
            Ok(thread) => thread,
            Err(err) => {
                self.drop_thread_ref(pid);
                return Err(err);
            }
        };

        let core = self.place(thread, flags, caller)?;
        Ok(ThreadHandle { tid, pid, core })
    }

    /// Fork da thread `tid`: novo processo (espaço CoW) com uma cópia da
    /// thread. O filho vê 0 no registrador de retorno.
    pub fn fork(&self, tid: Tid, caller: CoreId) -> TaskingResult<ThreadHandle> {
        self.core(caller)?;

        let parent_pid = self.with_thread(tid, |thread| thread.process)?;
        let child_pid = self.allocate_pid();
        let mut child = {
            let processes = self.processes.lock();
            let parent = processes
                .get(&parent_pid)
                .filter(|process| !process.exiting)
                .ok_or(TaskingError::NoSuchProcess)?;
            fork_process(self.memory, parent, child_pid)?
        };

        let child_tid = self.allocate_tid();
        let forked = self.with_scheduler(tid, |scheduler| {
            let parent = scheduler
                .get_task_by_id(tid)
                .ok_or(TaskingError::NoSuchThread)?;
            fork_thread(self.memory, &self.config, parent, child_tid, &child)
        });
        let thread = match forked.and_then(|result| result) {
            Ok(thread) => thread,
            Err(err) => {
                release_process(self.memory, child);
                return Err(err);
            }
        };

        child.main_thread = Some(child_tid);
        child.threads = 1;
        self.processes.lock().insert(child_pid, child);

        let core = self.place(thread, SpawnFlags::empty(), caller)?;
        crate::kinfo!("(Tasking) Fork criou PID=", child_pid.as_u32());
        Ok(ThreadHandle {
            tid: child_tid,
            pid: child_pid,
            core,
        })
    }

    // =========================================================================
    // TERMINATION
    // =========================================================================

    /// Marca a thread como morta (fase 1).
    pub fn exit_thread(&self, tid: Tid) -> TaskingResult<()> {
        self.with_scheduler(tid, |scheduler| -> TaskingResult<()> {
            scheduler.kill_thread(tid)?;
            self.directory.mark_dead(tid);
            Ok(())
        })??;
        crate::kdebug!("(Tasking) Thread encerrada TID=", tid.as_u32());
        Ok(())
    }

    /// Marca todas as threads do processo como mortas em todos os núcleos.
    pub fn kill_process(&self, pid: Pid) -> TaskingResult<usize> {
        if pid == Pid::KERNEL {
            return Err(TaskingError::NotPermitted);
        }

        let _global = self.global.lock();
        match self.processes.lock().get_mut(&pid) {
            Some(process) => process.exiting = true,
            None => return Err(TaskingError::NoSuchProcess),
        }

        let mut killed = 0;
        for scheduler in &self.cores {
            let tids = scheduler.lock().remove_threads(pid);
            for tid in &tids {
                self.directory.mark_dead(*tid);
            }
            killed += tids.len();
        }

        crate::kinfo!("(Tasking) Processo encerrado PID=", pid.as_u32());
        Ok(killed)
    }

    // =========================================================================
    // WAITING
    // =========================================================================

    /// Estaciona a thread com um waiter.
    pub fn block(&self, tid: Tid, waiter: Waiter) -> TaskingResult<()> {
        self.with_scheduler(tid, |scheduler| scheduler.move_to_wait_queue(tid, waiter))?
    }

    /// Acorda uma thread em espera (o waiter termina como interrompido).
    pub fn wake(&self, tid: Tid) -> TaskingResult<()> {
        self.with_scheduler(tid, |scheduler| scheduler.move_to_run_queue(tid))?
    }

    /// Resultado da última espera; entregue uma única vez.
    pub fn take_wait_result(&self, tid: Tid) -> TaskingResult<Option<WaitResult>> {
        self.with_thread(tid, |thread| thread.wait_result.take())
    }

    pub fn fire_irq(&self, irq: u8) -> bool {
        self.irqs.fire(irq)
    }

    // =========================================================================
    // MESSAGING
    // =========================================================================

    /// Envio não bloqueante. Um destinatário esperando é promovido para o
    /// início da wait queue do seu núcleo.
    pub fn send(
        &self,
        source: Tid,
        target: Tid,
        payload: &[u8],
        transaction: TransactionId,
    ) -> SendStatus {
        let status = self
            .messages
            .send_if_alive(target, source, payload, transaction, |tid| {
                let alive = self.directory.is_alive(tid);
                if !alive {
                    crate::kdebug!("(Tasking) Envio para thread inexistente TID=", tid.as_u32());
                }
                alive
            });
        if status == SendStatus::Successful {
            // O destinatário pode ter morrido nesse meio tempo.
            let _ = self.with_scheduler(target, |scheduler| scheduler.increase_wait_priority(target));
        }
        status
    }

    /// Receive não bloqueante na mailbox de `target`.
    pub fn receive(&self, target: Tid, out: &mut [u8], transaction: TransactionId) -> ReceiveStatus {
        self.messages.receive(target, out, transaction)
    }

    // =========================================================================
    // SIGNALS
    // =========================================================================

    /// Instala (ou remove) o handler de `signal` no processo.
    pub fn register_signal_handler(
        &self,
        pid: Pid,
        signal: u32,
        handler: Option<SignalHandler>,
    ) -> TaskingResult<Option<SignalHandler>> {
        self.processes
            .lock()
            .get_mut(&pid)
            .ok_or(TaskingError::NoSuchProcess)?
            .signals
            .set(signal, handler)
    }

    /// Entrega um sinal à thread. Com handler: fica pendente e quebra uma
    /// espera de receive. Sem handler: o processo da thread é encerrado.
    pub fn raise_signal(&self, tid: Tid, signal: u32) -> TaskingResult<()> {
        let set = SignalSet::of(signal).ok_or(TaskingError::InvalidArgument)?;
        let pid = self.with_thread(tid, |thread| thread.process)?;

        let handler = self
            .processes
            .lock()
            .get(&pid)
            .ok_or(TaskingError::NoSuchProcess)?
            .signals
            .get(signal);

        match handler {
            Some(_) => {
                self.with_thread(tid, |thread| thread.pending_signals |= set)?;
                crate::kdebug!("(Tasking) Sinal pendente=", signal);
                Ok(())
            }
            None => {
                crate::kdebug!("(Tasking) Sinal sem handler, encerrando PID=", pid.as_u32());
                self.kill_process(pid).map(|_| ())
            }
        }
    }

    /// Drena os sinais pendentes da thread.
    pub fn take_pending_signals(&self, tid: Tid) -> TaskingResult<SignalSet> {
        self.with_thread(tid, |thread| core::mem::take(&mut thread.pending_signals))
    }

    // =========================================================================
    // PROCESS MEMORY
    // =========================================================================

    pub fn sbrk(&self, pid: Pid, delta: i64) -> TaskingResult<VirtAddr> {
        self.processes
            .lock()
            .get_mut(&pid)
            .ok_or(TaskingError::NoSuchProcess)?
            .heap
            .sbrk(delta)
    }

    pub fn allocate_range(&self, pid: Pid, pages: usize) -> TaskingResult<VirtAddr> {
        let mut processes = self.processes.lock();
        let process = processes.get_mut(&pid).ok_or(TaskingError::NoSuchProcess)?;
        Ok(process.ranges.allocate(pages)?)
    }

    /// Libera um range. Retorna o número de páginas devolvidas.
    pub fn free_range(&self, pid: Pid, base: VirtAddr) -> TaskingResult<usize> {
        let mut processes = self.processes.lock();
        let process = processes.get_mut(&pid).ok_or(TaskingError::NoSuchProcess)?;
        Ok(process.ranges.free(base)?)
    }

    // =========================================================================
    // IDENTIFIERS & LOOKUP
    // =========================================================================

    /// Registra um nome único para a thread.
    pub fn register_identifier(&self, tid: Tid, name: &str) -> TaskingResult<()> {
        if name.is_empty() || name.len() > IDENTIFIER_MAX_LEN {
            return Err(TaskingError::InvalidArgument);
        }
        if !self.directory.is_alive(tid) {
            return Err(TaskingError::NoSuchThread);
        }

        {
            let mut identifiers = self.identifiers.lock();
            match identifiers.get(name) {
                Some(&owner) if owner != tid => return Err(TaskingError::IdentifierTaken),
                Some(_) => return Ok(()),
                None => {
                    identifiers.insert(String::from(name), tid);
                }
            }
        }

        let previous = self.with_thread(tid, |thread| {
            core::mem::replace(&mut thread.identifier, Some(String::from(name)))
        });
        let previous = match previous {
            Ok(previous) => previous,
            Err(err) => {
                self.identifiers.lock().remove(name);
                return Err(err);
            }
        };

        if let Some(old) = previous {
            self.identifiers.lock().remove(old.as_str());
        }

        publish_identifier(tid, name);
        crate::kdebug!("(Tasking) Identificador registrado TID=", tid.as_u32());
        Ok(())
    }

    pub fn lookup_by_id(&self, tid: Tid) -> Option<ThreadInfo> {
        self.with_scheduler(tid, |scheduler| scheduler.get_task_by_id(tid).map(Thread::info))
            .ok()
            .flatten()
    }

    /// Procura o nome em todos os núcleos.
    pub fn lookup_by_identifier(&self, name: &str) -> Option<ThreadInfo> {
        let _global = self.global.lock();
        self.cores.iter().find_map(|scheduler| {
            scheduler
                .lock()
                .get_task_by_identifier(name)
                .map(Thread::info)
        })
    }

    pub fn process_info(&self, pid: Pid) -> Option<ProcessInfo> {
        self.processes.lock().get(&pid).map(Process::info)
    }

    /// Estado salvo da thread
    pub fn cpu_state(&self, tid: Tid) -> Option<CpuState> {
        self.with_thread(tid, |thread| thread.cpu).ok()
    }

    pub fn queue_of(&self, tid: Tid) -> Option<QueueKind> {
        self.with_scheduler(tid, |scheduler| scheduler.queue_of(tid))
            .ok()
            .flatten()
    }

    // =========================================================================
    // INTROSPECTION
    // =========================================================================

    /// Threads em todos os núcleos, incluindo as idle
    pub fn count(&self) -> usize {
        let _global = self.global.lock();
        self.cores.iter().map(|scheduler| scheduler.lock().count()).sum()
    }

    pub fn thread_ids(&self) -> Vec<Tid> {
        let _global = self.global.lock();
        let mut ids: Vec<Tid> = self
            .cores
            .iter()
            .flat_map(|scheduler| scheduler.lock().get_task_ids())
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn load(&self, core: CoreId) -> TaskingResult<usize> {
        Ok(self.core(core)?.lock().calculate_load())
    }

    pub fn current(&self, core: CoreId) -> TaskingResult<Option<Tid>> {
        Ok(self.core(core)?.lock().current().map(|thread| thread.tid))
    }

    pub fn stats(&self, core: CoreId) -> TaskingResult<SchedulerStats> {
        Ok(self.core(core)?.lock().stats())
    }

    pub fn process_count(&self) -> usize {
        self.processes.lock().len()
    }

    /// Imprime filas de todos os núcleos no log de trace
    pub fn dump(&self) {
        let _global = self.global.lock();
        for scheduler in &self.cores {
            scheduler.lock().dump();
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::mm::testing::FakeMemory;
    use alloc::boxed::Box;

    pub const ENTRY: VirtAddr = VirtAddr::new(0x40_1000);

    /// Facade com provedor falso (vazado: o facade exige `'static`).
    pub fn tasking(cores: usize) -> (Tasking, &'static FakeMemory) {
        let memory: &'static FakeMemory = Box::leak(Box::new(FakeMemory::new()));
        let config = TaskingConfig::default().with_cores(cores);
        let tasking = match Tasking::new(config, memory, VirtAddr::new(0xffff_8000_0000_1000)) {
            Ok(tasking) => tasking,
            Err(err) => panic!("falha ao criar tasking: {}", err),
        };
        (tasking, memory)
    }

    pub fn app(tasking: &Tasking) -> ThreadHandle {
        tasking
            .spawn_process(ProcessSpec::new(SecurityLevel::Application, ENTRY), CoreId::BOOT)
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{app, tasking, ENTRY};
    use super::*;
    use crate::ipc::{MessageHeader, HEADER_SIZE};
    use crate::sched::config::USER_HEAP_START;
    use crate::sched::time::deadline_after;
    use crate::sched::waiter::{Deadline, JoinWaiter, ReceiveWaiter, WaitStatus};
    use core::sync::atomic::Ordering;

    fn receive_waiter(tasking: &Tasking, tid: Tid, tx: u32, timeout: Option<u64>) -> Waiter {
        Waiter::Receive(ReceiveWaiter::new(
            tid,
            TransactionId::new(tx),
            256,
            Deadline::at(deadline_after(tasking.now(), timeout)),
        ))
    }

    #[test]
    fn new_creates_one_idle_thread_per_core() {
        let (tasking, memory) = tasking(2);
        assert_eq!(tasking.count(), 2);
        assert_eq!(memory.stacks(), 2);
        assert_eq!(tasking.process_count(), 1);

        let idle = tasking.schedule(CoreId::new(1)).unwrap();
        assert_eq!(tasking.lookup_by_id(idle.tid).unwrap().priority, ThreadPriority::Idle);
        assert_eq!(tasking.schedule(CoreId::new(2)), Err(TaskingError::NoSuchCore));
    }

    #[test]
    fn save_before_first_schedule_selects_a_thread() {
        let (tasking, _) = tasking(1);
        let a = app(&tasking);
        let selection = tasking.save(CoreId::BOOT, &CpuState::default()).unwrap();
        assert_eq!(selection.tid, a.tid);
        assert_eq!(selection.state.ip, ENTRY.as_u64());

        let state = CpuState {
            ip: 0x1234,
            ..selection.state
        };
        assert_eq!(tasking.save(CoreId::BOOT, &state).unwrap().state.ip, 0x1234);
        assert_eq!(tasking.cpu_state(a.tid).unwrap().ip, 0x1234);
    }

    #[test]
    fn round_trip_with_blocking_receive() {
        let (tasking, _) = tasking(1);
        let sender = app(&tasking);
        let receiver = app(&tasking);

        tasking
            .block(receiver.tid, receive_waiter(&tasking, receiver.tid, 7, None))
            .unwrap();
        assert_eq!(
            tasking.send(sender.tid, receiver.tid, b"ping", TransactionId::new(7)),
            SendStatus::Successful
        );

        tasking.schedule(CoreId::BOOT).unwrap();
        assert_eq!(tasking.queue_of(receiver.tid), Some(QueueKind::Run));

        match tasking.take_wait_result(receiver.tid).unwrap() {
            Some(WaitResult::Receive {
                status: ReceiveStatus::Successful,
                message: Some(message),
            }) => {
                let header = MessageHeader::read_from(&message).unwrap();
                assert_eq!(header.sender(), sender.tid);
                assert_eq!(&message[HEADER_SIZE..], b"ping");
            }
            other => panic!("resultado inesperado: {:?}", other),
        }
        assert_eq!(tasking.take_wait_result(receiver.tid).unwrap(), None);
    }

    #[test]
    fn receive_wait_times_out_after_ticks() {
        let (tasking, _) = tasking(1);
        let waiter = app(&tasking);
        tasking
            .block(waiter.tid, receive_waiter(&tasking, waiter.tid, 3, Some(50)))
            .unwrap();

        for _ in 0..4 {
            tasking.schedule_tick(CoreId::BOOT).unwrap();
            assert_eq!(tasking.queue_of(waiter.tid), Some(QueueKind::Wait));
        }
        tasking.schedule_tick(CoreId::BOOT).unwrap();
        assert_eq!(tasking.now(), 50);
        assert_eq!(tasking.queue_of(waiter.tid), Some(QueueKind::Run));
        assert_eq!(
            tasking.take_wait_result(waiter.tid).unwrap(),
            Some(WaitResult::Receive {
                status: ReceiveStatus::TimedOut,
                message: None
            })
        );
    }

    #[test]
    fn placement_prefers_least_loaded_core() {
        let (tasking, _) = tasking(2);
        let pinned = |core: usize| {
            tasking
                .spawn_process(
                    ProcessSpec::new(SecurityLevel::Application, ENTRY)
                        .flags(SpawnFlags::ENFORCE_CURRENT_CORE),
                    CoreId::new(core),
                )
                .unwrap()
        };
        for _ in 0..3 {
            assert_eq!(pinned(0).core, CoreId::new(0));
        }
        assert_eq!(pinned(1).core, CoreId::new(1));

        assert_eq!(app(&tasking).core, CoreId::new(1));
        // 3 e 2: ainda o núcleo 1; depois empate em 3 vai para o núcleo 0
        assert_eq!(app(&tasking).core, CoreId::new(1));
        assert_eq!(app(&tasking).core, CoreId::new(0));
    }

    #[test]
    fn fork_copies_thread_into_new_process() {
        let (tasking, memory) = tasking(1);
        let parent = tasking
            .spawn_process(
                ProcessSpec::new(SecurityLevel::Driver, ENTRY).cwd("/srv").arguments("-v"),
                CoreId::BOOT,
            )
            .unwrap();
        let range = tasking.allocate_range(parent.pid, 4).unwrap();
        tasking.sbrk(parent.pid, 0x2000).unwrap();

        let child = tasking.fork(parent.tid, CoreId::BOOT).unwrap();
        assert_ne!(child.pid, parent.pid);
        assert_eq!(memory.cow_copies.load(Ordering::SeqCst), 1);

        let info = tasking.process_info(child.pid).unwrap();
        assert_eq!(info.parent, Some(parent.pid));
        assert_eq!(info.security, SecurityLevel::Driver);
        assert_eq!(info.cwd, "/srv");
        assert_eq!(info.heap_break, VirtAddr::new(USER_HEAP_START + 0x2000));
        assert_eq!(info.main_thread, Some(child.tid));

        // Ranges não são copiados: o primeiro range do filho é o mesmo do pai
        assert_eq!(tasking.allocate_range(child.pid, 4).unwrap(), range);
        assert_eq!(tasking.cpu_state(child.tid).unwrap().return_value, 0);
    }

    #[test]
    fn kernel_threads_cannot_fork() {
        let (tasking, _) = tasking(1);
        let idle = tasking.schedule(CoreId::BOOT).unwrap().tid;
        assert_eq!(tasking.fork(idle, CoreId::BOOT), Err(TaskingError::NotPermitted));
        assert_eq!(tasking.process_count(), 1);
    }

    #[test]
    fn destruction_releases_everything_after_schedule() {
        let (tasking, memory) = tasking(1);
        let stacks = memory.stacks();
        let spaces = memory.spaces();

        let a = app(&tasking);
        let b = app(&tasking);
        tasking.register_identifier(a.tid, "vfs").unwrap();
        tasking.send(b.tid, a.tid, b"hello", TransactionId::NONE);
        assert_eq!(memory.stacks(), stacks + 4);

        tasking.exit_thread(a.tid).unwrap();
        assert!(tasking.messages().has_mailbox(a.tid));
        assert_eq!(tasking.send(b.tid, a.tid, b"late", TransactionId::NONE), SendStatus::Failed);

        tasking.schedule(CoreId::BOOT).unwrap();
        assert!(!tasking.messages().has_mailbox(a.tid));
        assert_eq!(memory.stacks(), stacks + 2);
        assert_eq!(memory.spaces(), spaces + 1);
        assert!(tasking.process_info(a.pid).is_none());
        assert!(tasking.lookup_by_id(a.tid).is_none());

        // O nome fica livre
        tasking.register_identifier(b.tid, "vfs").unwrap();
    }

    #[test]
    fn kill_process_marks_every_thread() {
        let (tasking, memory) = tasking(2);
        let main = app(&tasking);
        tasking
            .spawn_thread(main.pid, ENTRY, SpawnFlags::empty(), CoreId::BOOT)
            .unwrap();
        tasking
            .spawn_thread(main.pid, ENTRY, SpawnFlags::empty(), CoreId::BOOT)
            .unwrap();
        assert_eq!(tasking.process_info(main.pid).unwrap().threads, 3);

        assert_eq!(tasking.kill_process(main.pid), Ok(3));
        tasking.schedule(CoreId::new(0)).unwrap();
        tasking.schedule(CoreId::new(1)).unwrap();

        assert!(tasking.process_info(main.pid).is_none());
        assert_eq!(tasking.count(), 2);
        assert_eq!(memory.stacks(), 2);
        assert_eq!(tasking.kill_process(Pid::KERNEL), Err(TaskingError::NotPermitted));
        assert_eq!(tasking.kill_process(main.pid), Err(TaskingError::NoSuchProcess));
    }

    #[test]
    fn send_after_destruction_leaves_no_mailbox() {
        let (tasking, _) = tasking(1);
        let client = app(&tasking);
        let server = app(&tasking);
        tasking.send(client.tid, server.tid, b"x", TransactionId::NONE);

        tasking.exit_thread(server.tid).unwrap();
        assert_eq!(
            tasking.send(client.tid, server.tid, b"y", TransactionId::NONE),
            SendStatus::Failed
        );
        tasking.schedule(CoreId::BOOT).unwrap();

        assert_eq!(
            tasking.send(client.tid, server.tid, b"z", TransactionId::NONE),
            SendStatus::Failed
        );
        assert!(!tasking.messages().has_mailbox(server.tid));
    }

    #[test]
    fn killed_process_accepts_no_new_threads() {
        let (tasking, memory) = tasking(1);
        let a = app(&tasking);
        assert_eq!(tasking.kill_process(a.pid), Ok(1));

        assert_eq!(
            tasking.spawn_thread(a.pid, ENTRY, SpawnFlags::empty(), CoreId::BOOT),
            Err(TaskingError::NoSuchProcess)
        );
        assert_eq!(tasking.fork(a.tid, CoreId::BOOT), Err(TaskingError::NoSuchProcess));

        tasking.schedule(CoreId::BOOT).unwrap();
        assert!(tasking.process_info(a.pid).is_none());
        assert_eq!(tasking.count(), 1);
        assert_eq!(memory.stacks(), 1);
    }

    #[test]
    fn join_completes_when_target_dies() {
        let (tasking, _) = tasking(1);
        let target = app(&tasking);
        let joiner = app(&tasking);
        tasking
            .block(
                joiner.tid,
                Waiter::Join(JoinWaiter::new(target.tid, Deadline::NEVER)),
            )
            .unwrap();

        tasking.schedule(CoreId::BOOT).unwrap();
        assert_eq!(tasking.queue_of(joiner.tid), Some(QueueKind::Wait));

        tasking.exit_thread(target.tid).unwrap();
        tasking.schedule(CoreId::BOOT).unwrap();
        assert_eq!(
            tasking.take_wait_result(joiner.tid).unwrap(),
            Some(WaitResult::Join(WaitStatus::Completed))
        );
    }

    #[test]
    fn handled_signal_interrupts_receive_wait() {
        let (tasking, _) = tasking(1);
        let a = app(&tasking);
        tasking
            .register_signal_handler(a.pid, 15, Some(SignalHandler { entry: ENTRY }))
            .unwrap();
        tasking
            .block(a.tid, receive_waiter(&tasking, a.tid, 0, None))
            .unwrap();

        tasking.raise_signal(a.tid, 15).unwrap();
        tasking.schedule(CoreId::BOOT).unwrap();

        assert_eq!(
            tasking.take_wait_result(a.tid).unwrap(),
            Some(WaitResult::Receive {
                status: ReceiveStatus::Interrupted,
                message: None
            })
        );
        assert_eq!(tasking.take_pending_signals(a.tid), Ok(SignalSet::SIGTERM));
        assert_eq!(tasking.take_pending_signals(a.tid), Ok(SignalSet::empty()));
    }

    #[test]
    fn drained_signal_does_not_break_next_wait() {
        let (tasking, _) = tasking(1);
        let a = app(&tasking);
        tasking
            .register_signal_handler(a.pid, 15, Some(SignalHandler { entry: ENTRY }))
            .unwrap();

        tasking.raise_signal(a.tid, 15).unwrap();
        assert_eq!(tasking.take_pending_signals(a.tid), Ok(SignalSet::SIGTERM));

        tasking
            .block(a.tid, receive_waiter(&tasking, a.tid, 0, None))
            .unwrap();
        tasking.schedule(CoreId::BOOT).unwrap();
        assert_eq!(tasking.queue_of(a.tid), Some(QueueKind::Wait));
        assert_eq!(tasking.take_wait_result(a.tid).unwrap(), None);

        // Sinal não drenado continua quebrando a próxima espera
        tasking.raise_signal(a.tid, 15).unwrap();
        tasking.schedule(CoreId::BOOT).unwrap();
        assert_eq!(tasking.queue_of(a.tid), Some(QueueKind::Run));
    }

    #[test]
    fn unhandled_signal_kills_process() {
        let (tasking, _) = tasking(1);
        let a = app(&tasking);
        assert_eq!(
            tasking.register_signal_handler(a.pid, 9, Some(SignalHandler { entry: ENTRY })),
            Err(TaskingError::NotPermitted)
        );

        tasking.raise_signal(a.tid, 2).unwrap();
        assert!(!tasking.directory().is_alive(a.tid));
        tasking.schedule(CoreId::BOOT).unwrap();
        assert!(tasking.process_info(a.pid).is_none());
        assert_eq!(tasking.raise_signal(a.tid, 40), Err(TaskingError::InvalidArgument));
    }

    #[test]
    fn sbrk_moves_break_within_heap_range() {
        let (tasking, _) = tasking(1);
        let a = app(&tasking);
        assert_eq!(tasking.sbrk(a.pid, 0x1000), Ok(VirtAddr::new(USER_HEAP_START)));
        assert_eq!(tasking.sbrk(a.pid, 0), Ok(VirtAddr::new(USER_HEAP_START + 0x1000)));
        assert_eq!(tasking.sbrk(a.pid, -0x2000), Err(TaskingError::InvalidArgument));
        assert_eq!(tasking.sbrk(Pid(99), 0), Err(TaskingError::NoSuchProcess));
    }

    #[test]
    fn ranges_are_per_process() {
        let (tasking, _) = tasking(1);
        let a = app(&tasking);
        let base = tasking.allocate_range(a.pid, 2).unwrap();
        assert_eq!(tasking.free_range(a.pid, base), Ok(2));
        assert_eq!(tasking.free_range(a.pid, base), Err(TaskingError::InvalidArgument));
    }

    #[test]
    fn identifiers_are_unique() {
        let (tasking, _) = tasking(2);
        let a = app(&tasking);
        let b = app(&tasking);
        tasking.register_identifier(a.tid, "window-server").unwrap();
        assert_eq!(
            tasking.register_identifier(b.tid, "window-server"),
            Err(TaskingError::IdentifierTaken)
        );
        assert_eq!(tasking.register_identifier(b.tid, ""), Err(TaskingError::InvalidArgument));

        let found = tasking.lookup_by_identifier("window-server").unwrap();
        assert_eq!(found.tid, a.tid);

        // Renomear libera o nome antigo
        tasking.register_identifier(a.tid, "ws").unwrap();
        tasking.register_identifier(b.tid, "window-server").unwrap();
        assert!(tasking.lookup_by_identifier("nope").is_none());
    }

    #[test]
    fn failed_spawn_leaks_nothing() {
        let (tasking, memory) = tasking(1);
        let stacks = memory.stacks();

        memory.fail_spaces.store(true, Ordering::SeqCst);
        assert_eq!(
            tasking
                .spawn_process(ProcessSpec::new(SecurityLevel::Application, ENTRY), CoreId::BOOT)
                .map(|handle| handle.tid),
            Err(TaskingError::AddressSpaceFailed)
        );
        memory.fail_spaces.store(false, Ordering::SeqCst);

        // Stack de kernel ok, stack de usuário falha
        memory.fail_stack_after.store(1, Ordering::SeqCst);
        assert_eq!(
            tasking
                .spawn_process(ProcessSpec::new(SecurityLevel::Application, ENTRY), CoreId::BOOT)
                .map(|handle| handle.tid),
            Err(TaskingError::StackAllocationFailed)
        );

        assert_eq!(memory.stacks(), stacks);
        assert_eq!(memory.spaces(), 0);
        assert_eq!(tasking.process_count(), 1);
        assert_eq!(tasking.count(), 1);
    }
}
