//! [`Task`] and [`TaskDataAccesses`]: the per-task state the rest of the
//! engine mutates under the task's own lock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use region_map::RegionMap;
use spin::Mutex;

use crate::access::DataAccess;

/// Which child task currently owns a subregion of a parent's declared
/// footprint.
///
/// `local` records that the subregion was never claimed by any ancestor —
/// the open question in spec §9 notes this flag's meaning is clear for a
/// parental descent but ambiguous when the slot is installed by a sibling;
/// we preserve the observed semantics (inherit from the previous entry
/// occupying the same subregion, default to `false` for a genuinely new
/// slot).
#[derive(Clone)]
pub struct BottomMapEntry<P> {
    pub(crate) task: Arc<Task<P>>,
    pub(crate) local: bool,
}

/// The two region-indexed containers mutated together under a task's lock:
/// its own declared accesses, and (if it has children) the bottom map of
/// who currently owns each subregion of its footprint.
pub struct TaskAccessMaps<P> {
    pub accesses: RegionMap<DataAccess<P>>,
    pub subaccess_bottom_map: RegionMap<BottomMapEntry<P>>,
}

impl<P> Default for TaskAccessMaps<P> {
    fn default() -> Self {
        TaskAccessMaps {
            accesses: RegionMap::new(),
            subaccess_bottom_map: RegionMap::new(),
        }
    }
}

/// Per-task accesses, bottom map, lock, and removal countdown.
///
/// `removal_countdown` is a byte-weighted atomic rather than a field
/// guarded by `lock`: it is decremented both from the "ticket" taken in
/// [`crate::linking::link_task_accesses`] and, independently, from every
/// byte of every access becoming topmost-satisfied (possibly from a
/// different task's lock), so it has to support concurrent fetch-subtract
/// with zero detection rather than requiring the owning task's lock.
pub struct TaskDataAccesses<P> {
    lock: Mutex<TaskAccessMaps<P>>,
    removal_countdown: AtomicUsize,
}

impl<P> Default for TaskDataAccesses<P> {
    fn default() -> Self {
        TaskDataAccesses {
            lock: Mutex::new(TaskAccessMaps::default()),
            removal_countdown: AtomicUsize::new(0),
        }
    }
}

impl<P> TaskDataAccesses<P> {
    #[must_use]
    pub fn lock(&self) -> spin::MutexGuard<'_, TaskAccessMaps<P>> {
        self.lock.lock()
    }

    #[must_use]
    pub fn try_lock(&self) -> Option<spin::MutexGuard<'_, TaskAccessMaps<P>>> {
        self.lock.try_lock()
    }

    /// Adds `n` bytes to the removal countdown (registration's "new access"
    /// gap case, or linking's single "not yet unregistered" ticket).
    pub(crate) fn add_removal_countdown(&self, n: usize) {
        self.removal_countdown.fetch_add(n, Ordering::AcqRel);
    }

    /// Subtracts `n` bytes. Returns `true` if this call drove the counter
    /// to exactly zero — the caller that observes this is the one
    /// responsible for transitioning the task towards removal.
    pub(crate) fn sub_removal_countdown(&self, n: usize) -> bool {
        if n == 0 {
            return false;
        }
        let prev = self.removal_countdown.fetch_sub(n, Ordering::AcqRel);
        debug_assert!(prev >= n, "removal_countdown underflow");
        prev == n
    }

    #[must_use]
    pub fn removal_countdown(&self) -> usize {
        self.removal_countdown.load(Ordering::Acquire)
    }
}

/// A task in the dependency graph. Generic over `P`, the opaque payload
/// (compute closure, result slot, ...) the dependency engine never
/// inspects.
pub struct Task<P> {
    parent: Option<Arc<Task<P>>>,
    label: Option<Box<str>>,
    /// Non-zero iff some strong access is unsatisfied.
    predecessor_count: AtomicUsize,
    /// Non-zero iff some access is not yet removable or the task has live
    /// subtasks.
    removal_blocking_count: AtomicUsize,
    data_accesses: TaskDataAccesses<P>,
    payload: P,
}

impl<P> Task<P> {
    /// A live child keeps its parent removal-blocked from the moment it
    /// exists, independent of whether any of its accesses have linked yet:
    /// `removal_blocking_count` is non-zero while "some access is not yet
    /// removable OR the task has live subtasks". The child releases this
    /// when it is actually reclaimed, in [`crate::finalization::handle_task_removal`].
    pub fn new(parent: Option<Arc<Task<P>>>, label: Option<&str>, payload: P) -> Arc<Self> {
        if let Some(parent) = &parent {
            parent.add_removal_blocking(1);
        }
        Arc::new(Task {
            parent,
            label: label.map(Into::into),
            predecessor_count: AtomicUsize::new(0),
            removal_blocking_count: AtomicUsize::new(0),
            data_accesses: TaskDataAccesses::default(),
            payload,
        })
    }

    #[must_use]
    pub fn parent(&self) -> Option<&Arc<Task<P>>> {
        self.parent.as_ref()
    }

    #[must_use]
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or("<unnamed task>")
    }

    #[must_use]
    pub fn payload(&self) -> &P {
        &self.payload
    }

    #[must_use]
    pub fn data_accesses(&self) -> &TaskDataAccesses<P> {
        &self.data_accesses
    }

    #[must_use]
    pub fn predecessor_count(&self) -> usize {
        self.predecessor_count.load(Ordering::Acquire)
    }

    pub(crate) fn add_predecessors(&self, n: usize) {
        self.predecessor_count.fetch_add(n, Ordering::AcqRel);
    }

    /// Decrements the predecessor count by `n`. Returns `true` if this call
    /// drove it to zero, i.e. the task just became ready.
    pub(crate) fn sub_predecessors(&self, n: usize) -> bool {
        if n == 0 {
            return false;
        }
        let prev = self.predecessor_count.fetch_sub(n, Ordering::AcqRel);
        debug_assert!(prev >= n, "predecessor_count underflow");
        prev == n
    }

    #[must_use]
    pub fn removal_blocking_count(&self) -> usize {
        self.removal_blocking_count.load(Ordering::Acquire)
    }

    pub(crate) fn add_removal_blocking(&self, n: usize) {
        self.removal_blocking_count.fetch_add(n, Ordering::AcqRel);
    }

    /// Returns `true` if this call drove the removal-blocking count to
    /// zero, i.e. the task just became eligible for removal (pending the
    /// removal countdown also reaching zero).
    pub(crate) fn sub_removal_blocking(&self, n: usize) -> bool {
        if n == 0 {
            return false;
        }
        let prev = self.removal_blocking_count.fetch_sub(n, Ordering::AcqRel);
        debug_assert!(prev >= n, "removal_blocking_count underflow");
        prev == n
    }

    /// Whether `self` is an ancestor of, or identical to, `other` — used to
    /// tell a parental edge apart from a sibling or cross-lineage one.
    #[must_use]
    pub fn is_ancestor_of(self: &Arc<Self>, other: &Arc<Task<P>>) -> bool {
        let mut cur = Some(other.clone());
        while let Some(t) = cur {
            if Arc::ptr_eq(self, &t) {
                return true;
            }
            cur = t.parent.clone();
        }
        false
    }
}

pub(crate) fn bottom_map_entry<P>(task: Arc<Task<P>>, local: bool) -> BottomMapEntry<P> {
    BottomMapEntry { task, local }
}
