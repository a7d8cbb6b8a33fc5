//! Syscalls de espera genérica e de tempo
//!
//! `sys_wait_for` estaciona a thread chamadora com o waiter da condição
//! pedida. Condições já satisfeitas completam sem bloquear.

use super::{SysResult, SyscallOutcome};
use crate::sched::time::deadline_after;
use crate::sched::waiter::{
    Deadline, IrqWaiter, JoinWaiter, SleepWaiter, ThreadLiveness, WaitResult, WaitStatus, Waiter,
    IRQ_COUNT,
};
use crate::sched::{Selection, Tasking};
use crate::sys::error::Errno;
use crate::sys::types::{CoreId, Tid};

/// O que esperar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitCondition {
    /// Próximo disparo da IRQ
    Irq(u8),
    /// Fim da thread
    Join(Tid),
    /// Milissegundos a partir de agora
    Sleep(u64),
}

/// Espera por uma condição.
///
/// # Retorno
/// `Done` se a condição já vale; `Suspended` caso contrário (completar com
/// `sys_resume_wait`). `timeout_ms` não se aplica a `Sleep`.
pub fn sys_wait_for(
    tasking: &Tasking,
    caller: Tid,
    condition: WaitCondition,
    timeout_ms: Option<u64>,
) -> SysResult<SyscallOutcome<WaitStatus>> {
    let deadline = Deadline::at(deadline_after(tasking.now(), timeout_ms));

    let waiter = match condition {
        WaitCondition::Irq(irq) => {
            if irq as usize >= IRQ_COUNT {
                return Err(Errno::EINVAL);
            }
            if tasking.irqs().take(irq) {
                return Ok(SyscallOutcome::Done(WaitStatus::Completed));
            }
            Waiter::Irq(IrqWaiter::new(irq, deadline))
        }
        WaitCondition::Join(target) => {
            if target == caller {
                return Err(Errno::EINVAL);
            }
            if !tasking.directory().is_alive(target) {
                return Ok(SyscallOutcome::Done(WaitStatus::Completed));
            }
            Waiter::Join(JoinWaiter::new(target, deadline))
        }
        WaitCondition::Sleep(0) => return Ok(SyscallOutcome::Done(WaitStatus::Completed)),
        WaitCondition::Sleep(millis) => {
            Waiter::Sleep(SleepWaiter::new(tasking.now().saturating_add(millis)))
        }
    };

    tasking.block(caller, waiter)?;
    Ok(SyscallOutcome::Suspended)
}

/// Completa um `sys_wait_for` suspenso.
pub fn sys_resume_wait(tasking: &Tasking, caller: Tid) -> SysResult<WaitStatus> {
    match tasking.take_wait_result(caller)? {
        Some(WaitResult::Irq(status))
        | Some(WaitResult::Join(status))
        | Some(WaitResult::Sleep(status)) => Ok(status),
        _ => Err(Errno::EINVAL),
    }
}

/// Handler do timer: um tick no núcleo `core`.
pub fn sys_schedule_tick(tasking: &Tasking, core: CoreId) -> SysResult<Selection> {
    Ok(tasking.schedule_tick(core)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sched::tasking::testing::{app, tasking};

    const BOOT: CoreId = CoreId::BOOT;

    #[test]
    fn pending_irq_completes_immediately() {
        let (tasking, _) = tasking(1);
        let driver = app(&tasking);
        tasking.fire_irq(1);
        assert_eq!(
            sys_wait_for(&tasking, driver.tid, WaitCondition::Irq(1), None),
            Ok(SyscallOutcome::Done(WaitStatus::Completed))
        );
        assert_eq!(
            sys_wait_for(&tasking, driver.tid, WaitCondition::Irq(200), None),
            Err(Errno::EINVAL)
        );
    }

    #[test]
    fn irq_wait_resumes_after_fire() {
        let (tasking, _) = tasking(1);
        let driver = app(&tasking);
        assert_eq!(
            sys_wait_for(&tasking, driver.tid, WaitCondition::Irq(12), None),
            Ok(SyscallOutcome::Suspended)
        );

        sys_schedule_tick(&tasking, BOOT).unwrap();
        assert_eq!(sys_resume_wait(&tasking, driver.tid), Err(Errno::EINVAL));

        tasking.fire_irq(12);
        sys_schedule_tick(&tasking, BOOT).unwrap();
        assert_eq!(sys_resume_wait(&tasking, driver.tid), Ok(WaitStatus::Completed));
        assert!(!tasking.irqs().is_pending(12));
    }

    #[test]
    fn irq_wait_times_out() {
        let (tasking, _) = tasking(1);
        let driver = app(&tasking);
        sys_wait_for(&tasking, driver.tid, WaitCondition::Irq(3), Some(10)).unwrap();
        sys_schedule_tick(&tasking, BOOT).unwrap();
        assert_eq!(sys_resume_wait(&tasking, driver.tid), Ok(WaitStatus::TimedOut));
    }

    #[test]
    fn join_on_dead_or_self() {
        let (tasking, _) = tasking(1);
        let a = app(&tasking);
        assert_eq!(
            sys_wait_for(&tasking, a.tid, WaitCondition::Join(a.tid), None),
            Err(Errno::EINVAL)
        );
        assert_eq!(
            sys_wait_for(&tasking, a.tid, WaitCondition::Join(Tid(777)), None),
            Ok(SyscallOutcome::Done(WaitStatus::Completed))
        );
    }

    #[test]
    fn sleep_wakes_after_ticks() {
        let (tasking, _) = tasking(1);
        let a = app(&tasking);
        assert_eq!(
            sys_wait_for(&tasking, a.tid, WaitCondition::Sleep(25), None),
            Ok(SyscallOutcome::Suspended)
        );

        sys_schedule_tick(&tasking, BOOT).unwrap();
        sys_schedule_tick(&tasking, BOOT).unwrap();
        assert_eq!(sys_resume_wait(&tasking, a.tid), Err(Errno::EINVAL));

        let selection = sys_schedule_tick(&tasking, BOOT).unwrap();
        assert_eq!(selection.tid, a.tid);
        assert_eq!(sys_resume_wait(&tasking, a.tid), Ok(WaitStatus::Completed));
    }

    #[test]
    fn tick_on_secondary_core_does_not_advance_clock() {
        let (tasking, _) = tasking(2);
        sys_schedule_tick(&tasking, CoreId::new(1)).unwrap();
        assert_eq!(tasking.now(), 0);
        sys_schedule_tick(&tasking, BOOT).unwrap();
        assert_eq!(tasking.now(), 10);
        assert_eq!(sys_schedule_tick(&tasking, CoreId::new(5)), Err(Errno::EINVAL));
    }
}
