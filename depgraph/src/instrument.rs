//! Instrumentation hooks. No-op compatible: every call site invokes these
//! unconditionally, and it's the subscriber (or [`NoopInstrument`]) that
//! decides whether anything happens.

use region::Region;

use crate::access::AccessKind;
use crate::task::Task;

/// Event hooks fired as accesses move through registration, linking,
/// propagation and finalization.
///
/// Default method bodies are no-ops, so implementors only override the
/// events they care about.
pub trait Instrument<P>: Send + Sync {
    fn created_access(&self, _task: &Task<P>, _region: Region, _kind: AccessKind) {}

    fn upgraded(&self, _task: &Task<P>, _region: Region, _kind: AccessKind, _weak: bool) {}

    fn linked(&self, _prev_task: &Task<P>, _next_task: &Task<P>, _region: Region) {}

    fn unlinked(&self, _prev_task: &Task<P>, _next_task: &Task<P>, _region: Region) {}

    fn satisfied(&self, _task: &Task<P>, _region: Region) {}

    fn removable(&self, _task: &Task<P>) {}

    fn removed(&self, _task: &Task<P>, _region: Region) {}

    fn fragmented(&self, _task: &Task<P>, _old: Region, _a: Region, _b: Region) {}

    fn modified_region(&self, _task: &Task<P>, _old: Region, _new: Region) {}
}

/// Does nothing. Used for hot-loop benchmarking where even the cost of a
/// disabled `tracing` event is unwelcome.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInstrument;

impl<P> Instrument<P> for NoopInstrument {}

/// Emits one `tracing` event per hook, at target `"depgraph"`.
///
/// This is the instrumentation a real embedding would use: attaching a
/// `tracing_subscriber` at the desired verbosity gets you the engine's
/// event stream for free, without the engine ever needing to know a
/// subscriber is listening.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingInstrument;

impl<P> Instrument<P> for TracingInstrument {
    fn created_access(&self, _task: &Task<P>, region: Region, kind: AccessKind) {
        tracing::trace!(target: "depgraph", ?region, ?kind, "created_access");
    }

    fn upgraded(&self, _task: &Task<P>, region: Region, kind: AccessKind, weak: bool) {
        tracing::trace!(target: "depgraph", ?region, ?kind, weak, "upgraded");
    }

    fn linked(&self, _prev_task: &Task<P>, _next_task: &Task<P>, region: Region) {
        tracing::debug!(target: "depgraph", ?region, "linked");
    }

    fn unlinked(&self, _prev_task: &Task<P>, _next_task: &Task<P>, region: Region) {
        tracing::debug!(target: "depgraph", ?region, "unlinked");
    }

    fn satisfied(&self, _task: &Task<P>, region: Region) {
        tracing::trace!(target: "depgraph", ?region, "satisfied");
    }

    fn removable(&self, _task: &Task<P>) {
        tracing::debug!(target: "depgraph", "removable");
    }

    fn removed(&self, _task: &Task<P>, region: Region) {
        tracing::trace!(target: "depgraph", ?region, "removed");
    }

    fn fragmented(&self, _task: &Task<P>, old: Region, a: Region, b: Region) {
        tracing::trace!(target: "depgraph", ?old, ?a, ?b, "fragmented");
    }

    fn modified_region(&self, _task: &Task<P>, old: Region, new: Region) {
        tracing::trace!(target: "depgraph", ?old, ?new, "modified_region");
    }
}
