//! §6 External interfaces: the four entry points surrounding code (worker
//! threads, polling services) calls into the dependency engine through.
//! Nothing outside this module (and [`crate::registration::register_task_access`],
//! which a caller uses to declare each individual access before linking)
//! needs to know about locks, bottom maps, or propagation.

use std::sync::Arc;

use region::Region;

use crate::config::EngineConfig;
use crate::error::ConflictError;
use crate::finalization::{finalize_access, handle_task_removal as finalize_task_removal};
use crate::instrument::Instrument;
use crate::linking::link_task_accesses;
use crate::scratch::DependencyData;
use crate::task::{Task, TaskAccessMaps};

/// Invokes `declare` to let user code register this task's accesses via
/// repeated calls to [`crate::registration::register_task_access`], then
/// links the task against its parent's bottom map.
///
/// Returns `true` iff the task has no strong unsatisfied predecessor, i.e.
/// it can be released straight to the scheduler's ready queue without
/// waiting on `dep_data`'s `satisfied_originators` batch.
///
/// # Errors
///
/// Propagates the first [`ConflictError`] `declare` produces. The task is
/// left exactly as far registered as `declare` got; per §7 there is no
/// partial rollback.
pub fn register_task_accesses<P>(
    task: &Arc<Task<P>>,
    declare: impl FnOnce(&Arc<Task<P>>) -> Result<(), ConflictError>,
    instrument: &dyn Instrument<P>,
    config: &EngineConfig,
    dep_data: &mut DependencyData<P>,
) -> Result<bool, ConflictError> {
    declare(task)?;
    link_task_accesses(task, instrument, config, dep_data);
    Ok(task.predecessor_count() == 0)
}

/// Called when `task` finishes execution: finalizes every access it
/// declared, hands off bottom-map subaccesses to each access's `next` where
/// applicable, and drops the "not yet unregistered" ticket taken during
/// linking.
///
/// Newly ready and removable tasks accumulate in `dep_data`; the caller
/// drains them to the scheduler and CPU manager once every lock here has
/// been released (§5 "no thread awaits external I/O while holding a
/// dependency-engine lock").
pub fn unregister_task_accesses<P>(task: &Arc<Task<P>>, instrument: &dyn Instrument<P>, dep_data: &mut DependencyData<P>) {
    let had_accesses = {
        let mut task_guard = task.data_accesses().lock();
        let TaskAccessMaps { accesses, subaccess_bottom_map } = &mut *task_guard;
        let regions: Vec<Region> = accesses.iter().map(|(r, _)| r).collect();
        let had_accesses = !regions.is_empty();
        for region in regions {
            accesses.process_intersecting(region, |r, acc| {
                finalize_access(task, r, acc, &mut *subaccess_bottom_map, instrument, dep_data);
            });
        }
        had_accesses
    };

    // `link_task_accesses` only took out the "not yet unregistered" ticket
    // (§4.3) if the task had any accesses to begin with; mirror that here so
    // an access-free task's countdown is never decremented below zero.
    if had_accesses && task.data_accesses().sub_removal_countdown(1) && task.removal_blocking_count() == 0 {
        instrument.removable(task);
        dep_data.removable_tasks.push(task.clone());
    }
}

/// The task is about to suspend on a user mutex or a taskwait: it must not
/// be considered removable while parked, even if every access it declared
/// is already removable.
pub fn handle_enter_blocking<P>(task: &Arc<Task<P>>) {
    task.add_removal_blocking(1);
}

/// The task has resumed from a user mutex or a taskwait. If every access
/// was already removable while it was parked, it becomes removable now.
pub fn handle_exit_blocking<P>(task: &Arc<Task<P>>, instrument: &dyn Instrument<P>, dep_data: &mut DependencyData<P>) {
    if task.sub_removal_blocking(1) && task.data_accesses().removal_countdown() == 0 {
        instrument.removable(task);
        dep_data.removable_tasks.push(task.clone());
    }
}

/// Reclaims every access of a removable task and, in the parent, clears the
/// bottom-map entries and `has_subaccesses`/`child` bits the task's
/// accesses occupied.
pub fn handle_task_removal<P>(task: &Arc<Task<P>>, instrument: &dyn Instrument<P>, dep_data: &mut DependencyData<P>) {
    finalize_task_removal(task, instrument, dep_data);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessKind;
    use crate::instrument::NoopInstrument;
    use crate::registration::register_task_access;

    #[test]
    fn a_root_task_with_no_predecessor_is_ready_immediately() {
        let task: Arc<Task<()>> = Task::new(None, None, ());
        let mut dep_data = DependencyData::new();
        let ready = register_task_accesses(
            &task,
            |t| register_task_access(t, AccessKind::ReadWrite, false, Region::new(0, 64), None, &NoopInstrument),
            &NoopInstrument,
            &EngineConfig::default(),
            &mut dep_data,
        )
        .unwrap();
        assert!(ready);
    }

    #[test]
    fn a_declare_error_short_circuits_linking() {
        let task: Arc<Task<()>> = Task::new(None, None, ());
        let mut dep_data = DependencyData::new();
        let err = register_task_accesses(
            &task,
            |t| {
                register_task_access(t, AccessKind::Concurrent, false, Region::new(0, 64), None, &NoopInstrument)?;
                register_task_access(t, AccessKind::Read, false, Region::new(0, 64), None, &NoopInstrument)
            },
            &NoopInstrument,
            &EngineConfig::default(),
            &mut dep_data,
        )
        .unwrap_err();
        assert!(matches!(err, ConflictError::ConcurrentCombinedWithOther { .. }));
    }

    #[test]
    fn blocking_then_resuming_releases_removal_once_accesses_settle() {
        let task: Arc<Task<()>> = Task::new(None, None, ());
        let mut dep_data = DependencyData::new();
        register_task_accesses(
            &task,
            |t| register_task_access(t, AccessKind::Read, false, Region::new(0, 64), None, &NoopInstrument),
            &NoopInstrument,
            &EngineConfig::default(),
            &mut dep_data,
        )
        .unwrap();

        handle_enter_blocking(&task);
        let finish_dep = {
            let mut d = DependencyData::new();
            unregister_task_accesses(&task, &NoopInstrument, &mut d);
            d
        };
        assert!(finish_dep.removable_tasks().is_empty(), "still parked");

        let mut resume_dep = DependencyData::new();
        handle_exit_blocking(&task, &NoopInstrument, &mut resume_dep);
        assert!(resume_dep.removable_tasks().iter().any(|t| Arc::ptr_eq(t, &task)));
    }
}
