//! # Scheduler por Núcleo
//!
//! Uma instância por núcleo físico, dirigida pelos traps do próprio núcleo.
//! Possui a run queue (FIFO com wrap), a wait queue, a idle thread e a
//! entrada em execução.
//!
//! ## Ciclo
//!
//! ```text
//! trap → save(state) → schedule() → retorno do trap com o CpuState escolhido
//! ```
//!
//! `schedule` processa a wait queue uma vez e depois escolhe, em
//! round-robin, a primeira thread viva depois da última que rodou. Threads
//! mortas encontradas no caminho são removidas e acumuladas em `reaped`
//! para destruição fora do lock do núcleo.
//!
//! A thread em execução permanece na run queue; o cursor do round-robin é
//! a última entrada escolhida.
//!
//! A thread que estava rodando quando o trap entrou ainda é dona da stack
//! de kernel em uso. Se ela morrer, só é entregue para destruição no
//! `schedule` seguinte.

use super::queue::{QueueEntry, QueueKind};
use super::switch::{self, CoreState};
use crate::debug::sink::publish_status;
use crate::klib::{Arena, IndexList, SlotId};
use crate::mm::MemoryProvider;
use crate::sched::task::{CpuState, Thread, ThreadState};
use crate::sched::waiter::{WaitContext, WaitSubject, Waiter};
use crate::sys::error::{TaskingError, TaskingResult};
use crate::sys::types::{CoreId, Pid, Tid};
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

/// Contadores por núcleo
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub schedule_calls: u64,
    pub wakeups: u64,
    pub reaped: u64,
    pub idle_selections: u64,
}

/// Colaboradores usados durante um `schedule`
pub struct ScheduleEnv<'a> {
    pub wait: WaitContext<'a>,
    pub memory: &'a dyn MemoryProvider,
}

pub struct Scheduler {
    core: CoreId,
    entries: Arena<QueueEntry>,
    index: BTreeMap<Tid, SlotId>,
    run: IndexList,
    wait: IndexList,
    idle: SlotId,
    current: Option<SlotId>,
    /// Última entrada da run queue escolhida
    cursor: Option<SlotId>,
    reaped: Vec<Thread>,
    /// Entrada que rodava quando o `schedule` corrente começou
    outgoing: Option<SlotId>,
    /// Thread morta cuja stack de kernel ainda está em uso
    retiring: Option<Thread>,
    core_state: CoreState,
    stats: SchedulerStats,
}

impl Scheduler {
    pub fn new(core: CoreId, idle: Thread) -> Self {
        let mut entries = Arena::new();
        let mut index = BTreeMap::new();
        let idle_tid = idle.tid;
        let idle_slot = entries.insert(QueueEntry::new(idle));
        index.insert(idle_tid, idle_slot);

        crate::kdebug!("(Sched) Scheduler criado para núcleo=", core.index());
        Self {
            core,
            entries,
            index,
            run: IndexList::new(),
            wait: IndexList::new(),
            idle: idle_slot,
            current: None,
            cursor: None,
            reaped: Vec::new(),
            outgoing: None,
            retiring: None,
            core_state: CoreState::default(),
            stats: SchedulerStats::default(),
        }
    }

    pub fn core(&self) -> CoreId {
        self.core
    }

    // =========================================================================
    // QUEUE PRIMITIVES
    // =========================================================================

    fn slot(&self, tid: Tid) -> TaskingResult<SlotId> {
        self.index.get(&tid).copied().ok_or(TaskingError::NoSuchThread)
    }

    fn link(&mut self, id: SlotId, kind: QueueKind) {
        let entry = &mut self.entries[id];
        if let Some(existing) = entry.queue {
            panic!(
                "(Sched) thread {} já está na fila {}",
                entry.thread.tid.as_u32(),
                existing.as_str()
            );
        }
        entry.queue = Some(kind);
        match kind {
            QueueKind::Run => self.run.push_back(&mut self.entries, id),
            QueueKind::Wait => self.wait.push_back(&mut self.entries, id),
        }
    }

    fn unlink(&mut self, id: SlotId) -> Option<QueueKind> {
        let kind = self.entries[id].queue.take()?;
        match kind {
            QueueKind::Run => {
                if self.cursor == Some(id) {
                    self.cursor = self.run.prev_of(&self.entries, id);
                }
                self.run.unlink(&mut self.entries, id);
            }
            QueueKind::Wait => self.wait.unlink(&mut self.entries, id),
        }
        Some(kind)
    }

    /// Remove a entrada e guarda a thread para destruição.
    fn reap(&mut self, id: SlotId) {
        self.unlink(id);
        if self.current == Some(id) {
            self.current = None;
        }
        let outgoing = self.outgoing == Some(id);
        if let Some(entry) = self.entries.remove(id) {
            let mut thread = entry.thread;
            self.index.remove(&thread.tid);
            thread.state = ThreadState::Dead;
            thread.waiter = None;
            crate::kdebug!("(Sched) Thread removida TID=", thread.tid.as_u32());
            if outgoing {
                self.retiring = Some(thread);
            } else {
                self.reaped.push(thread);
            }
            self.stats.reaped += 1;
        }
    }

    /// Move uma thread em espera para a run queue, guardando o resultado
    /// do waiter.
    fn wake(&mut self, id: SlotId) {
        self.unlink(id);
        let thread = &mut self.entries[id].thread;
        if let Some(waiter) = thread.waiter.take() {
            thread.wait_result = Some(waiter.finish());
        }
        thread.state = ThreadState::Ready;
        let tid = thread.tid;

        self.link(id, QueueKind::Run);
        self.stats.wakeups += 1;
        publish_status(tid, ThreadState::Ready.as_str());
    }

    // =========================================================================
    // PUBLIC CONTRACT
    // =========================================================================

    /// Registra uma thread nova na run queue.
    pub fn add(&mut self, mut thread: Thread) {
        if self.index.contains_key(&thread.tid) {
            panic!("(Sched) TID {} registrado duas vezes", thread.tid.as_u32());
        }
        thread.state = ThreadState::Ready;
        let tid = thread.tid;
        let id = self.entries.insert(QueueEntry::new(thread));
        self.index.insert(tid, id);
        self.link(id, QueueKind::Run);

        crate::ktrace!("(Sched) Nova thread na run queue TID=", tid.as_u32());
        publish_status(tid, ThreadState::Ready.as_str());
    }

    /// Guarda o estado interrompido na thread em execução e a retorna.
    /// `None` se nada rodou ainda neste núcleo (o chamador deve escalonar).
    pub fn save(&mut self, state: &CpuState) -> Option<&Thread> {
        let id = self.current?;
        let thread = &mut self.entries[id].thread;
        thread.cpu = *state;
        Some(thread)
    }

    /// Processa a wait queue, escolhe a próxima thread e a instala no núcleo.
    pub fn schedule(&mut self, env: &ScheduleEnv<'_>) -> &Thread {
        self.stats.schedule_calls += 1;

        if let Some(thread) = self.retiring.take() {
            self.reaped.push(thread);
        }

        let previous = self.current.take();
        if let Some(previous) = previous {
            let thread = &mut self.entries[previous].thread;
            if thread.state == ThreadState::Running {
                thread.state = ThreadState::Ready;
            }
        }

        self.outgoing = previous;
        self.process_wait_queue(&env.wait);
        let next = self.select_next();
        self.outgoing = None;

        let thread = &mut self.entries[next].thread;
        thread.state = ThreadState::Running;
        thread.accounting.times_scheduled += 1;

        self.current = Some(next);
        if next == self.idle {
            self.stats.idle_selections += 1;
        } else {
            self.cursor = Some(next);
        }

        let thread = &self.entries[next].thread;
        switch::finalize(&mut self.core_state, thread, env.memory);
        thread
    }

    /// Chama o check de cada thread em espera, em ordem. Retorna quantas
    /// foram acordadas.
    pub fn process_wait_queue(&mut self, ctx: &WaitContext<'_>) -> usize {
        let mut woken = 0;
        let mut cursor = self.wait.head();

        while let Some(id) = cursor {
            cursor = self.wait.next_of(&self.entries, id);

            let thread = &mut self.entries[id].thread;
            if !thread.alive {
                self.reap(id);
                continue;
            }

            let subject = WaitSubject {
                tid: thread.tid,
                interrupted: !thread.pending_signals.is_empty(),
            };
            let keep_waiting = match thread.waiter.as_mut() {
                Some(waiter) => waiter.check(ctx, subject),
                None => false,
            };

            if !keep_waiting {
                self.wake(id);
                woken += 1;
            }
        }

        if self.run.is_empty() && !self.wait.is_empty() {
            crate::kdebug!("(Sched) Apenas idle executável, esperando=", self.wait.len());
        }
        woken
    }

    /// Round-robin a partir do cursor, pulando (e removendo) threads mortas.
    fn select_next(&mut self) -> SlotId {
        let mut candidate = match self.cursor {
            Some(cursor) => self
                .run
                .next_of(&self.entries, cursor)
                .or_else(|| self.run.head()),
            None => self.run.head(),
        };
        let mut remaining = self.run.len();

        while let Some(id) = candidate {
            if remaining == 0 {
                break;
            }
            remaining -= 1;

            if self.entries[id].thread.alive {
                return id;
            }

            let next = self
                .run
                .next_of(&self.entries, id)
                .or_else(|| self.run.head())
                .filter(|&next| next != id);
            self.reap(id);
            candidate = next;
        }

        self.idle
    }

    /// Volta uma thread para a run queue. Se estava esperando, o waiter é
    /// finalizado como está (uma espera não concluída conta como
    /// interrompida).
    pub fn move_to_run_queue(&mut self, tid: Tid) -> TaskingResult<()> {
        let id = self.slot(tid)?;
        if id == self.idle {
            return Err(TaskingError::NotPermitted);
        }
        match self.entries[id].queue {
            Some(QueueKind::Run) => Ok(()),
            Some(QueueKind::Wait) => {
                self.wake(id);
                Ok(())
            }
            None => {
                self.entries[id].thread.state = ThreadState::Ready;
                self.link(id, QueueKind::Run);
                Ok(())
            }
        }
    }

    /// Estaciona uma thread com um waiter.
    pub fn move_to_wait_queue(&mut self, tid: Tid, waiter: Waiter) -> TaskingResult<()> {
        let id = self.slot(tid)?;
        if id == self.idle {
            return Err(TaskingError::NotPermitted);
        }

        let entry = &self.entries[id];
        if !entry.thread.alive {
            return Err(TaskingError::NoSuchThread);
        }
        if entry.queue == Some(QueueKind::Wait) {
            return Err(TaskingError::InvalidArgument);
        }

        let kind = waiter.kind();
        self.unlink(id);
        let thread = &mut self.entries[id].thread;
        thread.waiter = Some(waiter);
        thread.wait_result = None;
        thread.state = ThreadState::Waiting;
        thread.accounting.times_waited += 1;
        self.link(id, QueueKind::Wait);

        crate::ktrace!("(Sched) Thread em espera TID=", tid.as_u32());
        crate::ktrace!(kind.as_str());
        publish_status(tid, ThreadState::Waiting.as_str());
        Ok(())
    }

    /// Coloca uma thread em espera na frente da wait queue para ser
    /// consultada primeiro. `false` se ela não está esperando.
    pub fn increase_wait_priority(&mut self, tid: Tid) -> bool {
        let id = match self.index.get(&tid) {
            Some(&id) if self.entries[id].queue == Some(QueueKind::Wait) => id,
            _ => return false,
        };
        self.unlink(id);
        self.entries[id].queue = Some(QueueKind::Wait);
        self.wait.push_front(&mut self.entries, id);
        true
    }

    /// Marca todas as threads de `pid` como mortas. Remoção é feita no
    /// próximo `schedule`. Retorna os TIDs marcados.
    pub fn remove_threads(&mut self, pid: Pid) -> Vec<Tid> {
        let idle = self.idle;
        let mut killed = Vec::new();
        for (id, entry) in self.entries.iter_mut() {
            if id != idle && entry.thread.process == pid && entry.thread.alive {
                entry.thread.mark_dead();
                killed.push(entry.thread.tid);
            }
        }
        if !killed.is_empty() {
            crate::kdebug!("(Sched) Threads marcadas para remoção=", killed.len());
        }
        killed
    }

    /// Marca uma thread como morta.
    pub fn kill_thread(&mut self, tid: Tid) -> TaskingResult<()> {
        let id = self.slot(tid)?;
        if id == self.idle {
            return Err(TaskingError::NotPermitted);
        }
        self.entries[id].thread.mark_dead();
        Ok(())
    }

    // =========================================================================
    // INTROSPECTION
    // =========================================================================

    /// Tamanho da run queue (critério de placement)
    pub fn calculate_load(&self) -> usize {
        self.run.len()
    }

    /// Threads neste núcleo, incluindo a idle
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn get_task_by_id(&self, tid: Tid) -> Option<&Thread> {
        let id = self.index.get(&tid)?;
        self.entries.get(*id).map(|entry| &entry.thread)
    }

    pub fn get_task_by_id_mut(&mut self, tid: Tid) -> Option<&mut Thread> {
        let id = self.index.get(&tid)?;
        self.entries.get_mut(*id).map(|entry| &mut entry.thread)
    }

    pub fn get_task_by_identifier(&self, identifier: &str) -> Option<&Thread> {
        self.entries
            .iter()
            .map(|(_, entry)| &entry.thread)
            .find(|thread| thread.alive && thread.identifier.as_deref() == Some(identifier))
    }

    pub fn get_task_ids(&self) -> Vec<Tid> {
        self.index.keys().copied().collect()
    }

    pub fn current(&self) -> Option<&Thread> {
        self.current.map(|id| &self.entries[id].thread)
    }

    pub fn idle_tid(&self) -> Tid {
        self.entries[self.idle].thread.tid
    }

    pub fn queue_of(&self, tid: Tid) -> Option<QueueKind> {
        let id = self.index.get(&tid)?;
        self.entries[*id].queue
    }

    pub fn run_queue(&self) -> Vec<Tid> {
        self.run
            .iter(&self.entries)
            .map(|id| self.entries[id].thread.tid)
            .collect()
    }

    pub fn wait_queue(&self) -> Vec<Tid> {
        self.wait
            .iter(&self.entries)
            .map(|id| self.entries[id].thread.tid)
            .collect()
    }

    /// Threads removidas e fora de uso desde a última chamada (fase 2 da
    /// destruição)
    pub fn take_reaped(&mut self) -> Vec<Thread> {
        core::mem::take(&mut self.reaped)
    }

    pub fn core_state(&self) -> &CoreState {
        &self.core_state
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Imprime o conteúdo das filas no log de trace
    pub fn dump(&self) {
        crate::ktrace!("--- (Sched) DUMP núcleo=", self.core.index());
        match self.current() {
            Some(thread) => crate::ktrace!("  - Running TID:", thread.tid.as_u32()),
            None => crate::ktrace!("  - Running: nenhuma"),
        }
        crate::ktrace!("  - Run queue count:", self.run.len());
        for id in self.run.iter(&self.entries) {
            crate::ktrace!("    -> TID:", self.entries[id].thread.tid.as_u32());
        }
        crate::ktrace!("  - Wait queue count:", self.wait.len());
        for id in self.wait.iter(&self.entries) {
            let thread = &self.entries[id].thread;
            crate::ktrace!("    -> TID:", thread.tid.as_u32());
            if let Some(waiter) = &thread.waiter {
                crate::ktrace!(waiter.kind().as_str());
            }
        }
        crate::ktrace!("--- (Sched) FIM DO DUMP");
    }
}
