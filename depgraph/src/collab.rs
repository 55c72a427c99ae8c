//! Trait boundaries for the collaborators this crate treats as out of
//! scope: the ready-queue scheduler and the CPU manager. The engine only
//! ever calls through these traits; it never implements them.

use std::sync::Arc;

use crate::task::Task;

/// An opaque FIFO-with-hints sink/source for ready tasks.
///
/// The dependency engine never inspects scheduling policy (NUMA
/// hierarchy, priority, work-stealing, ...) — it just hands off tasks that
/// became ready or removable and otherwise stays out of the way.
pub trait Scheduler<P> {
    /// A task has no remaining strong unsatisfied predecessors.
    fn add_ready_task(&self, task: Arc<Task<P>>, hint: Option<&Task<P>>);

    /// A task's accesses are all removable and it has no live subtasks;
    /// hand it to finalization (`dispose_or_unblock_task` in the original).
    fn add_removable_task(&self, task: Arc<Task<P>>);
}

/// Consulted only to wake an idle CPU when a task becomes ready. Binding,
/// parking and NUMA placement are entirely out of scope here.
pub trait CpuManager<P> {
    fn wake_one(&self, ready_hint: &Task<P>);
}

/// No-op implementations, useful for tests that only care about the
/// dependency graph and not about what happens to ready/removable tasks
/// afterward.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCollaborators;

impl<P> Scheduler<P> for NoopCollaborators {
    fn add_ready_task(&self, _task: Arc<Task<P>>, _hint: Option<&Task<P>>) {}
    fn add_removable_task(&self, _task: Arc<Task<P>>) {}
}

impl<P> CpuManager<P> for NoopCollaborators {
    fn wake_one(&self, _ready_hint: &Task<P>) {}
}
