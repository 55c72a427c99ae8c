//! `register_task_access`: adds or upgrades accesses on a pre-link task.
//! Never links, never propagates, never touches any other task.

use std::sync::Arc;

use region::Region;

use crate::access::{upgrade, AccessKind, DataAccess, ReductionOp};
use crate::error::ConflictError;
use crate::instrument::Instrument;
use crate::task::Task;

/// Declares (or extends) a single access on `task`.
///
/// 1. Fragments any existing entries so every piece overlapping `region`
///    is bounded by `region`'s own endpoints.
/// 2. For each piece already covered, upgrades it in place.
/// 3. For each gap, creates a brand new access (all status bits clear) and
///    grows the removal countdown by the gap's size.
///
/// # Errors
///
/// Returns the first [`ConflictError`] encountered (a `Concurrent` or
/// `Reduction` access combined with an incompatible kind). Pieces visited
/// before the conflicting one are still mutated — registration has no
/// partial rollback, matching §7's "no exception surface, no partial
/// rollback" (the whole task's registration is fatal and the process is
/// expected to abort on this path, not continue).
pub fn register_task_access<P>(
    task: &Arc<Task<P>>,
    kind: AccessKind,
    weak: bool,
    region: Region,
    reduction_op: Option<ReductionOp>,
    instrument: &dyn Instrument<P>,
) -> Result<(), ConflictError> {
    if region.is_empty() {
        return Ok(());
    }

    let mut first_error = None;
    let originator = Arc::downgrade(task);

    let mut guard = task.data_accesses().lock();
    guard.accesses.process_intersecting_and_missing(
        region,
        |r, acc| {
            if first_error.is_some() {
                return;
            }
            let old_region = acc.region();
            if old_region != r {
                let (before, after) = old_region.subtract(r);
                instrument.fragmented(task, old_region, before, after);
                instrument.modified_region(task, old_region, r);
            }
            acc.set_region(r);
            match upgrade(acc, kind, weak, reduction_op) {
                Ok(changed) => {
                    if changed {
                        instrument.upgraded(task, r, acc.kind(), acc.is_weak());
                    }
                }
                Err(e) => first_error = Some(e),
            }
        },
        |gap| {
            instrument.created_access(task, gap, kind);
            task.data_accesses().add_removal_countdown(gap.len());
            DataAccess::new(originator.clone(), gap, kind, weak, reduction_op)
        },
    );
    drop(guard);

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::NoopInstrument;

    #[test]
    fn a_fresh_access_grows_the_removal_countdown_by_its_length() {
        let task: Arc<Task<()>> = Task::new(None, None, ());
        register_task_access(&task, AccessKind::Read, false, Region::new(0, 64), None, &NoopInstrument).unwrap();
        assert_eq!(task.data_accesses().removal_countdown(), 64);
    }

    #[test]
    fn overlapping_declarations_upgrade_instead_of_duplicating() {
        let task: Arc<Task<()>> = Task::new(None, None, ());
        register_task_access(&task, AccessKind::Read, false, Region::new(0, 64), None, &NoopInstrument).unwrap();
        register_task_access(&task, AccessKind::Write, false, Region::new(0, 64), None, &NoopInstrument).unwrap();

        let guard = task.data_accesses().lock();
        let entries: Vec<_> = guard.accesses.iter().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1.kind(), AccessKind::ReadWrite);
        drop(guard);
        // Upgrading in place doesn't grow the countdown a second time.
        assert_eq!(task.data_accesses().removal_countdown(), 64);
    }

    #[test]
    fn a_straddling_declaration_fragments_at_the_boundary() {
        let task: Arc<Task<()>> = Task::new(None, None, ());
        register_task_access(&task, AccessKind::Write, false, Region::new(0, 64), None, &NoopInstrument).unwrap();
        register_task_access(&task, AccessKind::Read, false, Region::new(32, 64), None, &NoopInstrument).unwrap();

        let guard = task.data_accesses().lock();
        let mut entries: Vec<_> = guard.accesses.iter().map(|(r, acc)| (r, acc.kind())).collect();
        entries.sort_by_key(|(r, _)| r.start());
        assert_eq!(
            entries,
            vec![
                (Region::new(0, 32), AccessKind::Write),
                (Region::new(32, 32), AccessKind::ReadWrite),
                (Region::new(64, 32), AccessKind::Read),
            ]
        );
        drop(guard);
        assert_eq!(task.data_accesses().removal_countdown(), 96, "64 + 64 worth of gap, minus no overlap double-count");
    }

    #[test]
    fn a_conflicting_upgrade_reports_the_first_error_and_still_mutates() {
        let task: Arc<Task<()>> = Task::new(None, None, ());
        register_task_access(&task, AccessKind::Concurrent, false, Region::new(0, 64), None, &NoopInstrument).unwrap();
        let err = register_task_access(&task, AccessKind::Read, false, Region::new(0, 64), None, &NoopInstrument).unwrap_err();
        assert!(matches!(err, ConflictError::ConcurrentCombinedWithOther { .. }));
    }

    #[test]
    fn an_empty_region_is_a_no_op() {
        let task: Arc<Task<()>> = Task::new(None, None, ());
        register_task_access(&task, AccessKind::Read, false, Region::new(0, 0), None, &NoopInstrument).unwrap();
        assert_eq!(task.data_accesses().removal_countdown(), 0);
        assert!(task.data_accesses().lock().accesses.is_empty());
    }
}
