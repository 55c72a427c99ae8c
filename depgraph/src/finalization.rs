//! `finalize_access` and `handle_task_removal` (§4.6): marks accesses
//! complete, hands bottom-map subaccesses off to the original next, and
//! reclaims accesses once they're removable.

use std::sync::Arc;

use region::Region;
use region_map::RegionMap;

use crate::access::{AccessStatus, DataAccess};
use crate::instrument::Instrument;
use crate::linking::link_to_predecessor_hit;
use crate::propagation::{propagate_satisfiability, ProducerSnapshot};
use crate::scratch::DependencyData;
use crate::task::{BottomMapEntry, Task};

/// Finalizes one access of `task`, already fragmented to `region`.
///
/// `task`'s own `subaccess_bottom_map` is what a hand-off (step 3) walks:
/// `acc.has_subaccesses` means some descendant of `task` currently owns
/// part of `acc.region`, and those ownership records live in `task`'s own
/// bottom map, guarded by the same lock as `acc` itself — no grandparent
/// lock is required for this step. Caller holds `task.data_accesses().lock()`.
pub(crate) fn finalize_access<P>(
    task: &Arc<Task<P>>,
    region: Region,
    acc: &mut DataAccess<P>,
    bottom_map: &mut RegionMap<BottomMapEntry<P>>,
    instrument: &dyn Instrument<P>,
    dep_data: &mut DependencyData<P>,
) {
    if acc.is_complete() {
        // An early `release` directive may already have marked this access
        // complete before the task finished running.
        return;
    }
    acc.status_mut().insert(AccessStatus::COMPLETE);

    if acc.has_subaccesses() {
        if let Some(target) = acc.next().cloned() {
            hand_off_bottom_map(task, region, &target, bottom_map, instrument, dep_data);
            instrument.unlinked(task, &target, region);
            acc.set_next(None);
        }
    }

    if let Some(next_task) = acc.next().cloned() {
        if acc.is_read_satisfied() || acc.is_write_satisfied() {
            let snapshot = ProducerSnapshot::of(acc);
            propagate_satisfiability(&snapshot, region, &next_task, false, instrument, dep_data);
        }
    }
}

/// Finds every entry under `region` in `task`'s own bottom map — i.e. every
/// descendant currently holding a piece of the access `task` just completed
/// — and links each one to `target` (the completed access's own `next`),
/// directly or by recursive descent through already-complete-with-subaccesses
/// predecessors. This reuses [`link_to_predecessor_hit`], the same per-slot
/// resolution ordinary linking performs, rooted at `task` instead of a
/// freshly declared consumer.
fn hand_off_bottom_map<P>(
    task: &Arc<Task<P>>,
    region: Region,
    target: &Arc<Task<P>>,
    bottom_map: &mut RegionMap<BottomMapEntry<P>>,
    instrument: &dyn Instrument<P>,
    dep_data: &mut DependencyData<P>,
) {
    let mut target_guard = target.data_accesses().lock();

    let owners: Vec<(Region, Arc<Task<P>>)> = {
        let mut found = Vec::new();
        bottom_map.process_intersecting(region, |r, entry| {
            found.push((r, entry.task.clone()));
        });
        found
    };

    for (r, owner) in owners {
        link_to_predecessor_hit(target, r, task, &owner, &mut target_guard, instrument, dep_data);
    }
}

/// `handle_task_removal` (§4.6): called once a task's own removal-blocking
/// count and removal countdown have both reached zero. Reclaims every
/// access and, in the parent, clears the bottom map and the `has_subaccesses`
/// / `child` bits the task's accesses occupied.
pub fn handle_task_removal<P>(task: &Arc<Task<P>>, instrument: &dyn Instrument<P>, dep_data: &mut DependencyData<P>) {
    let Some(parent) = task.parent().cloned() else {
        let mut guard = task.data_accesses().lock();
        let regions: Vec<Region> = guard.accesses.iter().map(|(r, _)| r).collect();
        for r in &regions {
            instrument.removed(task, *r);
        }
        guard.accesses = region_map::RegionMap::new();
        return;
    };

    let mut parent_guard = parent.data_accesses().lock();
    let mut task_guard = task.data_accesses().lock();

    let mut removed_regions: Vec<Region> = Vec::new();
    for (r, acc) in task_guard.accesses.iter() {
        if acc.is_in_bottom_map() {
            push_coalesced(&mut removed_regions, r);
        }
        instrument.removed(task, r);
    }
    task_guard.accesses = region_map::RegionMap::new();
    drop(task_guard);

    for region in removed_regions {
        dep_data.push_removed_region(region);
        parent_guard.subaccess_bottom_map.remove_exact(region);
        parent_guard.accesses.process_intersecting(region, |_, parent_acc| {
            parent_acc.set_child(None);
            parent_acc.status_mut().remove(AccessStatus::HAS_SUBACCESSES);
        });
    }
    drop(parent_guard);

    // `task` was a live subtask of `parent` from the moment it was spawned
    // (`Task::new`); now that it's fully reclaimed, release that block.
    if parent.sub_removal_blocking(1) && parent.data_accesses().removal_countdown() == 0 {
        instrument.removable(&parent);
        dep_data.removable_tasks.push(parent);
    }
}

fn push_coalesced(regions: &mut Vec<Region>, region: Region) {
    if let Some(existing) = regions.iter_mut().find(|r| r.contiguous(region)) {
        *existing = existing.contiguous_union(region);
    } else {
        regions.push(region);
    }
}
