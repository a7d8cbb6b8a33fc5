//! Syscalls de threads e processos
//!
//! # Syscalls
//! - thread_create (novo processo ou mesmo processo)
//! - thread_fork
//! - exit_thread / kill
//! - register_identifier / lookup_by_id / lookup_by_identifier
//! - sbrk / alloc_range / free_range
//! - signal / raise

use super::SysResult;
use crate::mm::VirtAddr;
use crate::sched::task::{SecurityLevel, SignalHandler, SpawnFlags, ThreadInfo};
use crate::sched::{ProcessSpec, Tasking, ThreadHandle};
use crate::sys::error::{Errno, TaskingError};
use crate::sys::types::{CoreId, Pid, Tid};
use alloc::string::String;

/// Onde a nova thread vive
#[derive(Debug, Clone)]
pub enum ProcessPolicy {
    /// Novo processo filho do chamador
    NewProcess {
        security: SecurityLevel,
        entry: VirtAddr,
        arguments: String,
    },
    /// Thread adicional no processo do chamador
    SameProcess { entry: VirtAddr },
}

fn caller_process(tasking: &Tasking, caller: Tid) -> SysResult<(Pid, SecurityLevel)> {
    let pid = tasking.lookup_by_id(caller).ok_or(Errno::ESRCH)?.process;
    let security = tasking.process_info(pid).ok_or(Errno::ESRCH)?.security;
    Ok((pid, security))
}

/// Cria uma thread.
///
/// # Retorno
/// Handle da thread criada. `EPERM` se o processo pedido teria mais
/// privilégio que o do chamador.
pub fn sys_thread_create(
    tasking: &Tasking,
    caller: Tid,
    core: CoreId,
    policy: ProcessPolicy,
    flags: SpawnFlags,
) -> SysResult<ThreadHandle> {
    let (pid, security) = caller_process(tasking, caller)?;

    let handle = match policy {
        ProcessPolicy::NewProcess {
            security: requested,
            entry,
            arguments,
        } => {
            if requested < security {
                crate::kwarn!("(Syscall) thread_create: privilégio negado TID=", caller.as_u32());
                return Err(Errno::EPERM);
            }
            let cwd = tasking
                .process_info(pid)
                .map(|info| info.cwd)
                .unwrap_or_default();
            let spec = ProcessSpec::new(requested, entry)
                .flags(flags)
                .parent(pid)
                .cwd(&cwd)
                .arguments(&arguments);
            tasking.spawn_process(spec, core)?
        }
        ProcessPolicy::SameProcess { entry } => tasking.spawn_thread(pid, entry, flags, core)?,
    };

    crate::ktrace!("(Syscall) thread_create TID=", handle.tid.as_u32());
    Ok(handle)
}

/// Fork da thread chamadora.
///
/// # Retorno
/// TID do filho para o pai. O filho retoma com 0 no registrador de retorno.
pub fn sys_thread_fork(tasking: &Tasking, caller: Tid, core: CoreId) -> SysResult<Tid> {
    let child = tasking.fork(caller, core)?;
    Ok(child.tid)
}

/// Encerra a thread chamadora. Ela não volta a rodar.
pub fn sys_exit_thread(tasking: &Tasking, caller: Tid) -> SysResult<()> {
    Ok(tasking.exit_thread(caller)?)
}

/// Encerra um processo. Só é permitido sobre processos de privilégio
/// igual ou menor.
///
/// # Retorno
/// Número de threads marcadas.
pub fn sys_kill(tasking: &Tasking, caller: Tid, target: Pid) -> SysResult<usize> {
    let (_, security) = caller_process(tasking, caller)?;
    let target_security = tasking.process_info(target).ok_or(Errno::ESRCH)?.security;
    if target_security < security {
        return Err(Errno::EPERM);
    }
    Ok(tasking.kill_process(target)?)
}

/// Registra um nome para a thread chamadora.
///
/// # Retorno
/// `true` se registrado, `false` se o nome pertence a outra thread.
pub fn sys_register_identifier(tasking: &Tasking, caller: Tid, name: &str) -> SysResult<bool> {
    match tasking.register_identifier(caller, name) {
        Ok(()) => Ok(true),
        Err(TaskingError::IdentifierTaken) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

pub fn sys_lookup_by_id(tasking: &Tasking, tid: Tid) -> SysResult<ThreadInfo> {
    tasking.lookup_by_id(tid).ok_or(Errno::ESRCH)
}

pub fn sys_lookup_by_identifier(tasking: &Tasking, name: &str) -> SysResult<Tid> {
    tasking
        .lookup_by_identifier(name)
        .map(|info| info.tid)
        .ok_or(Errno::ESRCH)
}

/// Move o break do heap do processo chamador.
///
/// # Retorno
/// Break antigo.
pub fn sys_sbrk(tasking: &Tasking, caller: Tid, delta: i64) -> SysResult<VirtAddr> {
    let (pid, _) = caller_process(tasking, caller)?;
    Ok(tasking.sbrk(pid, delta)?)
}

pub fn sys_alloc_range(tasking: &Tasking, caller: Tid, pages: usize) -> SysResult<VirtAddr> {
    let (pid, _) = caller_process(tasking, caller)?;
    Ok(tasking.allocate_range(pid, pages)?)
}

pub fn sys_free_range(tasking: &Tasking, caller: Tid, base: VirtAddr) -> SysResult<usize> {
    let (pid, _) = caller_process(tasking, caller)?;
    Ok(tasking.free_range(pid, base)?)
}

/// Instala (entry != 0) ou remove (entry == 0) o handler de um sinal.
///
/// # Retorno
/// Handler anterior (0 se nenhum).
pub fn sys_signal(tasking: &Tasking, caller: Tid, signal: u32, entry: VirtAddr) -> SysResult<VirtAddr> {
    let (pid, _) = caller_process(tasking, caller)?;
    let handler = (!entry.is_null()).then_some(SignalHandler { entry });
    let previous = tasking.register_signal_handler(pid, signal, handler)?;
    Ok(previous.map_or(VirtAddr::new(0), |handler| handler.entry))
}

pub fn sys_raise(tasking: &Tasking, target: Tid, signal: u32) -> SysResult<()> {
    Ok(tasking.raise_signal(target, signal)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sched::tasking::testing::{app, tasking, ENTRY};
    use crate::sched::waiter::ThreadLiveness;

    fn driver(tasking: &Tasking) -> ThreadHandle {
        tasking
            .spawn_process(ProcessSpec::new(SecurityLevel::Driver, ENTRY), CoreId::BOOT)
            .unwrap()
    }

    #[test]
    fn new_process_cannot_raise_privilege() {
        let (tasking, _) = tasking(1);
        let caller = app(&tasking);
        let policy = ProcessPolicy::NewProcess {
            security: SecurityLevel::Driver,
            entry: ENTRY,
            arguments: String::new(),
        };
        assert_eq!(
            sys_thread_create(&tasking, caller.tid, CoreId::BOOT, policy, SpawnFlags::empty()),
            Err(Errno::EPERM)
        );

        let policy = ProcessPolicy::NewProcess {
            security: SecurityLevel::Application,
            entry: ENTRY,
            arguments: String::from("--child"),
        };
        let child =
            sys_thread_create(&tasking, caller.tid, CoreId::BOOT, policy, SpawnFlags::empty())
                .unwrap();
        let info = tasking.process_info(child.pid).unwrap();
        assert_eq!(info.parent, Some(caller.pid));
        assert_eq!(info.arguments, "--child");
    }

    #[test]
    fn same_process_thread_shares_pid() {
        let (tasking, _) = tasking(1);
        let caller = driver(&tasking);
        let policy = ProcessPolicy::SameProcess { entry: ENTRY };
        let sub = sys_thread_create(&tasking, caller.tid, CoreId::BOOT, policy, SpawnFlags::empty())
            .unwrap();
        assert_eq!(sub.pid, caller.pid);
        assert_eq!(tasking.process_info(caller.pid).unwrap().threads, 2);
    }

    #[test]
    fn fork_returns_child_tid() {
        let (tasking, _) = tasking(1);
        let caller = app(&tasking);
        let child = sys_thread_fork(&tasking, caller.tid, CoreId::BOOT).unwrap();
        assert_ne!(child, caller.tid);
        assert_eq!(tasking.cpu_state(child).unwrap().return_value, 0);
    }

    #[test]
    fn kill_respects_privilege() {
        let (tasking, _) = tasking(1);
        let app_thread = app(&tasking);
        let driver_thread = driver(&tasking);
        assert_eq!(sys_kill(&tasking, app_thread.tid, driver_thread.pid), Err(Errno::EPERM));
        assert_eq!(sys_kill(&tasking, driver_thread.tid, app_thread.pid), Ok(1));
    }

    #[test]
    fn identifier_registration_reports_conflicts() {
        let (tasking, _) = tasking(1);
        let a = app(&tasking);
        let b = app(&tasking);
        assert_eq!(sys_register_identifier(&tasking, a.tid, "zipper"), Ok(true));
        assert_eq!(sys_register_identifier(&tasking, b.tid, "zipper"), Ok(false));
        assert_eq!(sys_lookup_by_identifier(&tasking, "zipper"), Ok(a.tid));
        assert_eq!(sys_lookup_by_identifier(&tasking, "ghost"), Err(Errno::ESRCH));
        assert_eq!(sys_lookup_by_id(&tasking, Tid(999)).map(|info| info.tid), Err(Errno::ESRCH));
    }

    #[test]
    fn memory_calls_use_caller_process() {
        let (tasking, _) = tasking(1);
        let a = app(&tasking);
        let old = sys_sbrk(&tasking, a.tid, 0x3000).unwrap();
        assert_eq!(sys_sbrk(&tasking, a.tid, 0).unwrap(), old.add(0x3000));

        let base = sys_alloc_range(&tasking, a.tid, 3).unwrap();
        assert_eq!(sys_free_range(&tasking, a.tid, base), Ok(3));
        assert_eq!(sys_alloc_range(&tasking, a.tid, 0), Err(Errno::EINVAL));
    }

    #[test]
    fn signal_handler_round_trip() {
        let (tasking, _) = tasking(1);
        let a = app(&tasking);
        let entry = VirtAddr::new(0x40_8000);
        assert_eq!(sys_signal(&tasking, a.tid, 1, entry), Ok(VirtAddr::new(0)));
        assert_eq!(sys_signal(&tasking, a.tid, 9, entry), Err(Errno::EPERM));

        // Com handler o sinal fica pendente
        assert_eq!(sys_raise(&tasking, a.tid, 1), Ok(()));
        assert!(tasking.process_info(a.pid).is_some());

        // Sem handler a ação padrão encerra o processo
        assert_eq!(sys_signal(&tasking, a.tid, 1, VirtAddr::new(0)), Ok(entry));
        assert_eq!(sys_raise(&tasking, a.tid, 1), Ok(()));
        assert!(!tasking.directory().is_alive(a.tid));
    }
}
