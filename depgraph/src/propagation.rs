//! The satisfiability formulas (§4.4) and their recursive application after
//! a producer event (§4.5).

use std::sync::Arc;

use region::Region;

use crate::access::{topmost_or_not_exclusive, AccessKind, AccessStatus, DataAccess, ReductionOp};
use crate::instrument::Instrument;
use crate::scratch::DependencyData;
use crate::task::Task;

/// A read-only snapshot of whatever fields of a producer access the
/// formulas need, taken before its owning lock is released. Propagation
/// walks from task to task one lock at a time (§5 "each neighbor is locked
/// only one at a time"), so by the time we reach a distant descendant the
/// producer's own lock is long gone — the snapshot is what survives.
#[derive(Clone, Copy)]
pub(crate) struct ProducerSnapshot {
    kind: AccessKind,
    reduction_op: Option<ReductionOp>,
    read_satisfied: bool,
    write_satisfied: bool,
    topmost_satisfied: bool,
    complete: bool,
}

impl ProducerSnapshot {
    pub(crate) fn of<P>(acc: &DataAccess<P>) -> Self {
        ProducerSnapshot {
            kind: acc.kind(),
            reduction_op: acc.reduction_op(),
            read_satisfied: acc.is_read_satisfied(),
            write_satisfied: acc.is_write_satisfied(),
            topmost_satisfied: acc.is_topmost_satisfied(),
            complete: acc.is_complete(),
        }
    }

    fn topmost_or_not_exclusive(&self) -> bool {
        !matches!(self.kind, AccessKind::Concurrent | AccessKind::Reduction) || self.topmost_satisfied
    }
}

fn read_sat_after(prev: &ProducerSnapshot, next_kind: AccessKind, next_op: Option<ReductionOp>, parental: bool) -> bool {
    prev.read_satisfied
        && ((prev.complete && prev.topmost_or_not_exclusive())
            || parental
            || prev.kind == AccessKind::Read
            || (prev.kind == AccessKind::Concurrent && next_kind == AccessKind::Concurrent)
            || (prev.kind == AccessKind::Reduction && next_kind == AccessKind::Reduction && prev.reduction_op == next_op))
}

fn write_sat_after(prev: &ProducerSnapshot, next_kind: AccessKind, next_op: Option<ReductionOp>, parental: bool) -> bool {
    prev.write_satisfied
        && ((prev.complete && prev.topmost_or_not_exclusive())
            || parental
            || (prev.kind == AccessKind::Concurrent && next_kind == AccessKind::Concurrent)
            || (prev.kind == AccessKind::Reduction && next_kind == AccessKind::Reduction && prev.reduction_op == next_op))
}

fn topmost_sat_after(prev: &ProducerSnapshot, parental: bool) -> bool {
    prev.topmost_satisfied && (prev.complete || parental)
}

/// Applies the §4.4 formulas to `next` given completed/known producer state
/// `prev`, masking off bits `next` already has set. Returns whether
/// anything changed. Handles the counter side effects (predecessor count,
/// removal countdown) and enqueues ready/removable tasks into `dep_data`.
///
/// Caller must hold `next_task`'s access lock.
pub(crate) fn apply_satisfiability<P>(
    prev: &ProducerSnapshot,
    next: &mut DataAccess<P>,
    next_task: &Arc<Task<P>>,
    parental: bool,
    instrument: &dyn Instrument<P>,
    dep_data: &mut DependencyData<P>,
) -> bool {
    let want_read = !next.is_read_satisfied() && read_sat_after(prev, next.kind(), next.reduction_op(), parental);
    let want_write = !next.is_write_satisfied() && write_sat_after(prev, next.kind(), next.reduction_op(), parental);
    let want_topmost = !next.is_topmost_satisfied() && topmost_sat_after(prev, parental);

    if !want_read && !want_write && !want_topmost {
        return false;
    }

    let was_satisfied = next.is_satisfied();
    let was_topmost = next.is_topmost_satisfied();
    let region = next.region();

    if want_read {
        next.status_mut().insert(AccessStatus::READ_SATISFIED);
    }
    if want_write {
        next.status_mut().insert(AccessStatus::WRITE_SATISFIED);
    }
    if want_topmost {
        next.status_mut().insert(AccessStatus::TOPMOST_SATISFIED);
    }
    instrument.satisfied(next_task, region);

    if next.is_topmost_satisfied() && !was_topmost {
        let drained = next_task.data_accesses().sub_removal_countdown(region.len());
        if drained && next_task.removal_blocking_count() == 0 {
            instrument.removable(next_task);
            dep_data.removable_tasks.push(next_task.clone());
        }
    }

    if next.is_satisfied() && !was_satisfied && next.is_strong() {
        if next_task.sub_predecessors(1) {
            dep_data.satisfied_originators.push(next_task.clone());
        }
    }

    true
}

/// `propagate_initial_satisfiability`: applied once, when a brand new edge
/// `(prev, next)` is installed during linking.
pub(crate) fn propagate_initial_satisfiability<P>(
    prev: &DataAccess<P>,
    next: &mut DataAccess<P>,
    next_task: &Arc<Task<P>>,
    parental: bool,
    instrument: &dyn Instrument<P>,
    dep_data: &mut DependencyData<P>,
) -> bool {
    apply_satisfiability(&ProducerSnapshot::of(prev), next, next_task, parental, instrument, dep_data)
}

/// `propagate_satisfiability`: flows a producer's state forward across
/// `next` and `child` edges after it changes (a producer completing, or an
/// access further upstream becoming satisfied). Takes `next_task`'s lock,
/// fragments its accesses to `region`'s boundaries, applies the formulas to
/// every piece, and recurses into whatever pieces actually changed.
///
/// Each recursive hop re-roots on the access that just became the new
/// producer: `nacc` (now satisfied against `prev`) is snapshotted under
/// `next_task`'s lock and that snapshot, not the original `prev`, is what
/// `nacc`'s own `child`/`next` edges are evaluated against. Reusing the
/// caller's `prev` across more than one hop would evaluate a 3rd-hop
/// consumer against its grandparent's state instead of its immediate
/// predecessor's, which can satisfy it too early.
pub fn propagate_satisfiability<P>(
    prev: &ProducerSnapshot,
    region: Region,
    next_task: &Arc<Task<P>>,
    parental: bool,
    instrument: &dyn Instrument<P>,
    dep_data: &mut DependencyData<P>,
) {
    let mut child_work: Vec<(Region, Arc<Task<P>>, ProducerSnapshot)> = Vec::new();
    let mut next_work: Vec<(Region, Arc<Task<P>>, ProducerSnapshot)> = Vec::new();

    {
        let mut guard = next_task.data_accesses().lock();
        guard.accesses.process_intersecting(region, |r, nacc| {
            let old_region = nacc.region();
            if old_region != r {
                let (before, after) = old_region.subtract(r);
                instrument.fragmented(next_task, old_region, before, after);
                instrument.modified_region(next_task, old_region, r);
            }
            nacc.set_region(r);
            if !apply_satisfiability(prev, nacc, next_task, parental, instrument, dep_data) {
                return;
            }
            let snapshot = ProducerSnapshot::of(nacc);
            if nacc.has_subaccesses() {
                if let Some(child) = nacc.child() {
                    child_work.push((r, child.clone(), snapshot));
                }
            }
            if let Some(nx) = nacc.next() {
                next_work.push((r, nx.clone(), snapshot));
            }
        });
    }

    for (r, child, snapshot) in child_work {
        propagate_satisfiability(&snapshot, r, &child, true, instrument, dep_data);
    }
    for (r, nx, snapshot) in next_work {
        propagate_satisfiability(&snapshot, r, &nx, false, instrument, dep_data);
    }
}

/// Marks `acc` (belonging to `task`, over `region`) immediately satisfied
/// because the data it covers is local — not claimed by any ancestor. Used
/// for bottom-map misses during linking and for root tasks with no parent
/// to link against.
///
/// `task` here is always the task presently being linked, never some other
/// task this linking pass happens to unblock — so its own readiness is
/// never pushed to `dep_data.satisfied_originators`. The original only ever
/// reports a task's own post-linking readiness once, through
/// `registerTaskDataAccesses`'s own `decreasePredecessors()` return value
/// (mirrored here by [`crate::engine::register_task_accesses`]'s return
/// bool); `_satisfiedOriginators` holds only *other* tasks. We still
/// decrement `predecessor_count` so that return value is correct — we just
/// never enqueue `task` itself here.
pub(crate) fn mark_locally_satisfied<P>(
    task: &Arc<Task<P>>,
    region: Region,
    acc: &mut DataAccess<P>,
    instrument: &dyn Instrument<P>,
    dep_data: &mut DependencyData<P>,
) {
    let old_region = acc.region();
    if old_region != region {
        let (before, after) = old_region.subtract(region);
        instrument.fragmented(task, old_region, before, after);
        instrument.modified_region(task, old_region, region);
    }
    acc.set_region(region);
    let was_strong = acc.is_strong();
    acc.status_mut().insert(
        AccessStatus::READ_SATISFIED | AccessStatus::WRITE_SATISFIED | AccessStatus::TOPMOST_SATISFIED,
    );
    instrument.satisfied(task, region);

    if was_strong {
        task.sub_predecessors(1);
    }
    if task.data_accesses().sub_removal_countdown(region.len()) && task.removal_blocking_count() == 0 {
        instrument.removable(task);
        dep_data.removable_tasks.push(task.clone());
    }
}
