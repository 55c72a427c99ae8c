//! `link_task_accesses`: walks a newly-declared task's accesses, finds
//! matching predecessors in the parent's bottom map, installs the new task
//! into the bottom map, and sets initial satisfiability.

use std::cell::RefCell;
use std::sync::Arc;

use region::Region;

use crate::access::AccessStatus;
use crate::config::EngineConfig;
use crate::instrument::Instrument;
use crate::locking::lock_pair;
use crate::propagation::{mark_locally_satisfied, propagate_initial_satisfiability};
use crate::scratch::DependencyData;
use crate::task::{bottom_map_entry, Task, TaskAccessMaps};

/// The guard ticket added to `predecessor_count` for the duration of the
/// walk; see [`EngineConfig::guard_predecessor_count`].
const PREDECESSOR_GUARD: usize = 1;

/// Runs once per task, after the user has finished declaring its accesses
/// and before the task is released to the scheduler.
pub fn link_task_accesses<P>(
    task: &Arc<Task<P>>,
    instrument: &dyn Instrument<P>,
    config: &EngineConfig,
    dep_data: &mut DependencyData<P>,
) {
    {
        let guard = task.data_accesses().lock();
        if guard.accesses.is_empty() {
            return;
        }
    }

    // The "not yet unregistered" ticket: kept alive until unregistration,
    // so the removal countdown can never spuriously reach zero from
    // satisfiability alone while the task hasn't even finished declaring.
    task.data_accesses().add_removal_countdown(1);

    let Some(parent) = task.parent().cloned() else {
        let mut task_guard = task.data_accesses().lock();
        let regions: Vec<Region> = task_guard.accesses.iter().map(|(r, _)| r).collect();
        for region in regions {
            task_guard.accesses.process_intersecting(region, |r, acc| {
                acc.status_mut().insert(AccessStatus::IN_BOTTOM_MAP | AccessStatus::REACHABLE);
                if acc.is_strong() {
                    task.add_predecessors(1);
                }
                mark_locally_satisfied(task, r, acc, instrument, dep_data);
            });
            self_seed(task, region, &mut task_guard);
        }
        return;
    };

    // Lock order: parent before child, always.
    let mut parent_guard = parent.data_accesses().lock();
    let mut task_guard = task.data_accesses().lock();

    // §9 open question: a guard ticket so `predecessor_count` cannot be
    // observed at zero while this walk is still in progress. Provably
    // redundant here — every path that mutates `task`'s `predecessor_count`
    // also requires `task.data_accesses().lock()`, which this call holds
    // for its entire duration — but kept behind the config knob to match
    // the original's defensive posture.
    if config.guard_predecessor_count {
        task.add_predecessors(PREDECESSOR_GUARD);
    }

    let regions: Vec<Region> = task_guard.accesses.iter().map(|(r, _)| r).collect();
    for region in regions {
        task_guard.accesses.process_intersecting(region, |_, acc| {
            acc.status_mut().insert(AccessStatus::IN_BOTTOM_MAP | AccessStatus::REACHABLE);
        });
        // Each access is handed to `link_to_predecessors` whole, but the
        // parent's bottom map may fragment it into several pieces that
        // resolve independently (§9: the original's `duplicateDataAccess`
        // takes a fresh predecessor ticket for every fragment beyond the
        // first). Rather than pre-count fragments, `link_to_predecessors`
        // takes one ticket per resolved piece right before evaluating its
        // satisfiability, so a piece that resolves immediately cancels its
        // own ticket and a piece that doesn't leaves exactly one behind.
        link_to_predecessors(task, region, &parent, &mut parent_guard, &mut task_guard, instrument, dep_data);
        // `task` is now the default owner of its own freshly-declared
        // region until one of its own children claims part of it — the
        // entry a future child's hit against `task`'s bottom map needs to
        // recognize the edge as parental (§4.3: `prev_task == parent`).
        self_seed(task, region, &mut task_guard);
    }

    // Same non-reporting rule as the no-parent branch above and
    // `mark_locally_satisfied`: this ticket belongs to `task`, the task
    // presently being linked, so its release is never pushed to
    // `dep_data.satisfied_originators` — only `register_task_accesses`'s
    // return value reports it.
    if config.guard_predecessor_count {
        task.sub_predecessors(PREDECESSOR_GUARD);
    }
}

/// Seeds `task`'s own bottom map with itself as the default owner of
/// `region`, so that the first child to touch this subregion finds a hit
/// with `prev_task == task` — the parental edge — rather than an empty-gap
/// miss. Ownership transfers away from this self-entry (overwritten to the
/// real child) the moment that child links.
fn self_seed<P>(task: &Arc<Task<P>>, region: Region, task_guard: &mut spin::MutexGuard<'_, TaskAccessMaps<P>>) {
    task_guard
        .subaccess_bottom_map
        .insert(region, bottom_map_entry(task.clone(), false));
}

enum Slot<P> {
    Hit { prev_task: Arc<Task<P>>, local: bool },
    Miss,
}

/// Walks `parent`'s bottom map over `region`. Every subregion ends up
/// owned by `task` in the bottom map by the time this returns; what
/// happens to the previous owner (if any) depends on whether it was a
/// direct hit or required descending further (§4.3).
pub(crate) fn link_to_predecessors<P>(
    task: &Arc<Task<P>>,
    region: Region,
    parent: &Arc<Task<P>>,
    parent_maps: &mut TaskAccessMaps<P>,
    task_guard: &mut spin::MutexGuard<'_, TaskAccessMaps<P>>,
    instrument: &dyn Instrument<P>,
    dep_data: &mut DependencyData<P>,
) {
    let slots: RefCell<Vec<(Region, Slot<P>)>> = RefCell::new(Vec::new());
    let owner = task.clone();
    parent_maps.subaccess_bottom_map.process_intersecting_and_missing(
        region,
        |r, entry| {
            slots.borrow_mut().push((
                r,
                Slot::Hit {
                    prev_task: entry.task.clone(),
                    local: entry.local,
                },
            ));
            entry.task = owner.clone();
        },
        |gap| {
            slots.borrow_mut().push((gap, Slot::Miss));
            bottom_map_entry(owner.clone(), true)
        },
    );

    for (r, slot) in slots.into_inner() {
        match slot {
            Slot::Miss => {
                task_guard.accesses.process_intersecting(r, |rr, acc| {
                    if acc.is_strong() {
                        task.add_predecessors(1);
                    }
                    mark_locally_satisfied(task, rr, acc, instrument, dep_data);
                });
            }
            Slot::Hit { prev_task, local: _ } => {
                if Arc::ptr_eq(&prev_task, parent) {
                    // The hit is against `parent`'s own self-seeded entry
                    // (§4.3's `prev_task == parent` case): `parent_maps` is
                    // already the live, already-locked map for exactly this
                    // task, so resolving it through `link_to_predecessor_hit`
                    // would have it `lock_pair` a mutex we're already
                    // holding further up the call stack. Resolve in place
                    // instead of re-locking.
                    resolve_hit(task, r, parent, &prev_task, parent_maps, task_guard, instrument, dep_data);
                } else {
                    link_to_predecessor_hit(task, r, parent, &prev_task, task_guard, instrument, dep_data);
                }
            }
        }
    }
}

/// Resolves a single bottom-map hit: either descends into `prev_task`'s own
/// bottom map (if it's already complete and has subaccesses — the real
/// producers are its children) or installs the edge directly.
///
/// `consumer` is the task receiving the new edge (the task being linked
/// during normal linking, or `acc.next` during a finalization hand-off).
/// `relation_root` is compared against `prev_task` to decide whether the
/// edge being installed is parental. Acquires `prev_task`'s lock itself;
/// callers that already hold it (a hit against the relation root's own
/// self-seeded entry) must go through [`resolve_hit`] instead.
pub(crate) fn link_to_predecessor_hit<P>(
    consumer: &Arc<Task<P>>,
    region: Region,
    relation_root: &Arc<Task<P>>,
    prev_task: &Arc<Task<P>>,
    consumer_guard: &mut spin::MutexGuard<'_, TaskAccessMaps<P>>,
    instrument: &dyn Instrument<P>,
    dep_data: &mut DependencyData<P>,
) {
    let mut prev_guard = lock_pair(consumer_guard, prev_task);
    resolve_hit(consumer, region, relation_root, prev_task, &mut prev_guard, consumer_guard, instrument, dep_data);
}

/// The actual hit-resolution logic, parameterized over an already-acquired
/// `prev_maps` so it can be shared between the ordinary case (lock taken by
/// [`link_to_predecessor_hit`]) and the self-seeded-parent case (lock
/// already held by the caller, see [`link_to_predecessors`]).
fn resolve_hit<P>(
    consumer: &Arc<Task<P>>,
    region: Region,
    relation_root: &Arc<Task<P>>,
    prev_task: &Arc<Task<P>>,
    prev_maps: &mut TaskAccessMaps<P>,
    consumer_guard: &mut spin::MutexGuard<'_, TaskAccessMaps<P>>,
    instrument: &dyn Instrument<P>,
    dep_data: &mut DependencyData<P>,
) {
    let mut needs_descent = false;
    prev_maps.accesses.process_intersecting(region, |pr, prev_acc| {
        resync_region(prev_task, pr, prev_acc, instrument);
        needs_descent = prev_acc.has_subaccesses() && prev_acc.is_complete();
    });

    if needs_descent && !Arc::ptr_eq(prev_task, relation_root) {
        link_to_predecessors(consumer, region, prev_task, prev_maps, consumer_guard, instrument, dep_data);
        prev_maps.accesses.process_intersecting(region, |_, prev_acc| {
            prev_acc.status_mut().remove(AccessStatus::IN_BOTTOM_MAP);
        });
        return;
    }

    let parental = Arc::ptr_eq(prev_task, relation_root);
    let sibling = consumer
        .parent()
        .is_some_and(|p| Arc::ptr_eq(p, relation_root));

    prev_maps.accesses.process_intersecting(region, |pr, prev_acc| {
        if parental {
            prev_acc.set_child(Some(consumer.clone()));
            prev_acc.status_mut().insert(AccessStatus::HAS_SUBACCESSES);
        } else {
            if prev_acc.next().is_some() {
                // Already linked to a consumer elsewhere (can happen during
                // a finalization hand-off onto an access with no real gap
                // left to claim); nothing further to do.
                return;
            }
            prev_acc.set_next(Some(consumer.clone()));
            if sibling {
                prev_acc.status_mut().remove(AccessStatus::IN_BOTTOM_MAP);
            }
        }
        instrument.linked(prev_task, consumer, pr);

        consumer_guard.accesses.process_intersecting(pr, |r, next_acc| {
            resync_region(consumer, r, next_acc, instrument);
            if next_acc.is_strong() {
                consumer.add_predecessors(1);
            }
            propagate_initial_satisfiability(prev_acc, next_acc, consumer, parental, instrument, dep_data);
        });
    });
}

/// Brings `acc.region()` back in sync with the region the container's
/// fragmentation just settled it to, emitting the same
/// `fragmented`/`modified_region` events [`crate::registration`] and
/// [`crate::propagation`] emit at their own fragmentation points. A
/// [`DataAccess`](crate::access::DataAccess)'s own `region` field is "mutated
/// only by fragmentation" (spec §3); every `process_intersecting` callback
/// that might have just split the entry must reconcile it before reading or
/// installing edges on the access.
fn resync_region<P>(task: &Arc<Task<P>>, new_region: Region, acc: &mut crate::access::DataAccess<P>, instrument: &dyn Instrument<P>) {
    let old_region = acc.region();
    if old_region == new_region {
        return;
    }
    let (before, after) = old_region.subtract(new_region);
    instrument.fragmented(task, old_region, before, after);
    instrument.modified_region(task, old_region, new_region);
    acc.set_region(new_region);
}
