//! Per-call scratch batches, equivalent to the original's
//! `CPUDependencyData`: the output of one registration/unregistration call,
//! collected while locks are held and drained to the collaborators
//! (scheduler, CPU manager) only after every lock has been released.

use std::sync::Arc;

use region::Region;

use crate::collab::{CpuManager, Scheduler};
use crate::task::Task;

/// Tasks and regions produced by a single pass through the engine.
///
/// Nothing in here is ever inspected by the dependency engine itself after
/// the fact — it exists purely so that waking the scheduler and the CPU
/// manager can happen outside all locks, per §5's "no thread awaits
/// external I/O while holding a dependency-engine lock".
pub struct DependencyData<P> {
    pub(crate) satisfied_originators: Vec<Arc<Task<P>>>,
    pub(crate) removable_tasks: Vec<Arc<Task<P>>>,
    pub(crate) removed_regions: Vec<Region>,
}

impl<P> Default for DependencyData<P> {
    fn default() -> Self {
        DependencyData {
            satisfied_originators: Vec::new(),
            removable_tasks: Vec::new(),
            removed_regions: Vec::new(),
        }
    }
}

impl<P> DependencyData<P> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn ready_tasks(&self) -> &[Arc<Task<P>>] {
        &self.satisfied_originators
    }

    #[must_use]
    pub fn removable_tasks(&self) -> &[Arc<Task<P>>] {
        &self.removable_tasks
    }

    #[must_use]
    pub fn removed_regions(&self) -> &[Region] {
        &self.removed_regions
    }

    /// Hands every collected ready/removable task to the collaborators and
    /// empties the batch. Must be called with no dependency-engine lock
    /// held.
    pub fn drain_to<S, C>(&mut self, scheduler: &S, cpu_manager: &C)
    where
        S: Scheduler<P>,
        C: CpuManager<P>,
    {
        for task in self.satisfied_originators.drain(..) {
            cpu_manager.wake_one(&task);
            scheduler.add_ready_task(task, None);
        }
        for task in self.removable_tasks.drain(..) {
            scheduler.add_removable_task(task);
        }
    }

    /// Merges `region` into `removed_regions`, coalescing with any already
    /// contiguous entry (spec S6: two accesses removed in the same
    /// finalize pass whose regions abut collapse into one region applied
    /// to the parent's bottom map).
    pub(crate) fn push_removed_region(&mut self, region: Region) {
        if let Some(existing) = self
            .removed_regions
            .iter_mut()
            .find(|r| r.contiguous(region))
        {
            *existing = existing.contiguous_union(region);
        } else {
            self.removed_regions.push(region);
        }
    }
}
