//! The access record and the upgrade rule two overlapping declarations
//! within one task are reconciled by.

use std::sync::{Arc, Weak};

use bitflags::bitflags;
use region::Region;

use crate::error::ConflictError;
use crate::task::Task;

/// The kind of claim a task declares over a byte region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessKind {
    Read,
    Write,
    ReadWrite,
    Concurrent,
    Reduction,
}

/// An opaque token identifying a reduction operator.
///
/// The actual combinator (the function that merges two partial results)
/// lives in user code and is out of scope for the dependency engine; all
/// the engine needs is to tell two reduction declarations over the same
/// region apart when they name different operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReductionOp(pub u64);

bitflags! {
    /// Monotone status bits on a [`DataAccess`]. Every bit, once set, stays
    /// set for the lifetime of the access.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AccessStatus: u8 {
        const READ_SATISFIED    = 1 << 0;
        const WRITE_SATISFIED   = 1 << 1;
        const TOPMOST_SATISFIED = 1 << 2;
        const COMPLETE          = 1 << 3;
        const HAS_SUBACCESSES   = 1 << 4;
        const IN_BOTTOM_MAP     = 1 << 5;
        /// Debug-only: set once the access is visible outside its
        /// originator task (i.e. linked), used to catch use-before-link
        /// bugs in debug assertions. Never read by release-mode logic.
        const REACHABLE         = 1 << 6;
    }
}

/// One record per contiguous region, per originator task.
///
/// `next` and `child` name the *task* on the other end of an edge rather
/// than the neighboring `DataAccess` directly: the neighbor's own record is
/// always found by querying that task's [`TaskDataAccesses`](crate::task::TaskDataAccesses)
/// at the same region, which is what fragmentation keeps aligned.
#[derive(Clone)]
pub struct DataAccess<P> {
    originator: Weak<Task<P>>,
    region: Region,
    kind: AccessKind,
    weak: bool,
    reduction_op: Option<ReductionOp>,
    status: AccessStatus,
    next: Option<Arc<Task<P>>>,
    child: Option<Arc<Task<P>>>,
}

impl<P> DataAccess<P> {
    pub(crate) fn new(
        originator: Weak<Task<P>>,
        region: Region,
        kind: AccessKind,
        weak: bool,
        reduction_op: Option<ReductionOp>,
    ) -> Self {
        DataAccess {
            originator,
            region,
            kind,
            weak,
            reduction_op,
            status: AccessStatus::empty(),
            next: None,
            child: None,
        }
    }

    #[must_use]
    pub fn originator(&self) -> Option<Arc<Task<P>>> {
        self.originator.upgrade()
    }

    #[must_use]
    pub fn region(&self) -> Region {
        self.region
    }

    pub(crate) fn set_region(&mut self, region: Region) {
        self.region = region;
    }

    #[must_use]
    pub fn kind(&self) -> AccessKind {
        self.kind
    }

    #[must_use]
    pub fn is_weak(&self) -> bool {
        self.weak
    }

    #[must_use]
    pub fn is_strong(&self) -> bool {
        !self.weak
    }

    #[must_use]
    pub fn reduction_op(&self) -> Option<ReductionOp> {
        self.reduction_op
    }

    #[must_use]
    pub fn status(&self) -> AccessStatus {
        self.status
    }

    pub(crate) fn status_mut(&mut self) -> &mut AccessStatus {
        &mut self.status
    }

    #[must_use]
    pub fn is_read_satisfied(&self) -> bool {
        self.status.contains(AccessStatus::READ_SATISFIED)
    }

    #[must_use]
    pub fn is_write_satisfied(&self) -> bool {
        self.status.contains(AccessStatus::WRITE_SATISFIED)
    }

    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        self.is_read_satisfied() && self.is_write_satisfied()
    }

    #[must_use]
    pub fn is_topmost_satisfied(&self) -> bool {
        self.status.contains(AccessStatus::TOPMOST_SATISFIED)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status.contains(AccessStatus::COMPLETE)
    }

    #[must_use]
    pub fn has_subaccesses(&self) -> bool {
        self.status.contains(AccessStatus::HAS_SUBACCESSES)
    }

    #[must_use]
    pub fn is_in_bottom_map(&self) -> bool {
        self.status.contains(AccessStatus::IN_BOTTOM_MAP)
    }

    /// An access is removable once it is complete and every ancestor
    /// relationship that could still generate a predecessor has been
    /// resolved.
    #[must_use]
    pub fn is_removable(&self) -> bool {
        self.is_topmost_satisfied() && self.is_complete()
    }

    #[must_use]
    pub fn next(&self) -> Option<&Arc<Task<P>>> {
        self.next.as_ref()
    }

    pub(crate) fn set_next(&mut self, task: Option<Arc<Task<P>>>) {
        self.next = task;
    }

    #[must_use]
    pub fn child(&self) -> Option<&Arc<Task<P>>> {
        self.child.as_ref()
    }

    pub(crate) fn set_child(&mut self, task: Option<Arc<Task<P>>>) {
        self.child = task;
    }
}

/// `prev.kind ∉ {Concurrent, Reduction} ∨ prev.topmost_satisfied` — used by
/// the initial-satisfiability formulas in [`crate::propagation`].
#[must_use]
pub(crate) fn topmost_or_not_exclusive<P>(prev: &DataAccess<P>) -> bool {
    !matches!(prev.kind, AccessKind::Concurrent | AccessKind::Reduction) || prev.is_topmost_satisfied()
}

/// Reconciles an existing access with an incoming declaration over the same
/// (sub)region, within a single task. Returns whether anything changed (for
/// the `upgraded` instrumentation event), or the fatal conflict if the two
/// kinds cannot be combined.
///
/// See spec §4.2 "Upgrade rule": combining `Concurrent` or `Reduction` with
/// a differing kind is fatal; otherwise the kind becomes `ReadWrite` unless
/// both declarations agree, and weakness is the conjunction of both.
pub(crate) fn upgrade<P>(
    acc: &mut DataAccess<P>,
    kind: AccessKind,
    weak: bool,
    reduction_op: Option<ReductionOp>,
) -> Result<bool, ConflictError> {
    let new_kind = match (acc.kind, kind) {
        (AccessKind::Concurrent, AccessKind::Concurrent) => AccessKind::Concurrent,
        (AccessKind::Concurrent, _) | (_, AccessKind::Concurrent) => {
            return Err(ConflictError::ConcurrentCombinedWithOther { region: acc.region });
        }
        (AccessKind::Reduction, AccessKind::Reduction) => {
            if acc.reduction_op != reduction_op {
                return Err(ConflictError::ReductionOperatorMismatch { region: acc.region });
            }
            AccessKind::Reduction
        }
        (AccessKind::Reduction, _) | (_, AccessKind::Reduction) => {
            return Err(ConflictError::ReductionCombinedWithOther { region: acc.region });
        }
        (old, incoming) if old == incoming => old,
        _ => AccessKind::ReadWrite,
    };

    let new_weak = acc.weak && weak;
    let changed = new_kind != acc.kind || new_weak != acc.weak;
    acc.kind = new_kind;
    acc.weak = new_weak;
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access(kind: AccessKind, weak: bool, op: Option<ReductionOp>) -> DataAccess<()> {
        DataAccess::new(Weak::new(), Region::new(0, 64), kind, weak, op)
    }

    #[test]
    fn same_kind_is_unchanged() {
        let mut acc = access(AccessKind::Read, false, None);
        let changed = upgrade(&mut acc, AccessKind::Read, false, None).unwrap();
        assert!(!changed);
        assert_eq!(acc.kind(), AccessKind::Read);
    }

    #[test]
    fn read_and_write_upgrade_to_readwrite() {
        let mut acc = access(AccessKind::Read, false, None);
        let changed = upgrade(&mut acc, AccessKind::Write, false, None).unwrap();
        assert!(changed);
        assert_eq!(acc.kind(), AccessKind::ReadWrite);
    }

    #[test]
    fn weak_conjunction() {
        let mut acc = access(AccessKind::Read, true, None);
        upgrade(&mut acc, AccessKind::Read, false, None).unwrap();
        assert!(!acc.is_weak(), "one strong declaration makes the combined access strong");
    }

    #[test]
    fn concurrent_combined_with_other_is_fatal() {
        let mut acc = access(AccessKind::Concurrent, false, None);
        let err = upgrade(&mut acc, AccessKind::Read, false, None).unwrap_err();
        assert!(matches!(err, ConflictError::ConcurrentCombinedWithOther { .. }));
    }

    #[test]
    fn two_concurrent_accesses_combine_fine() {
        let mut acc = access(AccessKind::Concurrent, false, None);
        let changed = upgrade(&mut acc, AccessKind::Concurrent, false, None).unwrap();
        assert!(!changed);
    }

    #[test]
    fn reduction_same_op_combines() {
        let op = ReductionOp(1);
        let mut acc = access(AccessKind::Reduction, false, Some(op));
        let changed = upgrade(&mut acc, AccessKind::Reduction, false, Some(op)).unwrap();
        assert!(!changed);
        assert_eq!(acc.kind(), AccessKind::Reduction);
    }

    #[test]
    fn reduction_mismatched_op_is_fatal() {
        let mut acc = access(AccessKind::Reduction, false, Some(ReductionOp(1)));
        let err = upgrade(&mut acc, AccessKind::Reduction, false, Some(ReductionOp(2))).unwrap_err();
        assert!(matches!(err, ConflictError::ReductionOperatorMismatch { .. }));
    }

    #[test]
    fn reduction_combined_with_other_is_fatal() {
        let mut acc = access(AccessKind::Reduction, false, Some(ReductionOp(1)));
        let err = upgrade(&mut acc, AccessKind::Write, false, None).unwrap_err();
        assert!(matches!(err, ConflictError::ReductionCombinedWithOther { .. }));
    }

    #[test]
    fn status_bits_are_independent() {
        let mut acc = access(AccessKind::Read, false, None);
        acc.status_mut().insert(AccessStatus::READ_SATISFIED);
        assert!(acc.is_read_satisfied());
        assert!(!acc.is_write_satisfied());
        assert!(!acc.is_satisfied());
        acc.status_mut().insert(AccessStatus::WRITE_SATISFIED);
        assert!(acc.is_satisfied());
    }

    #[test]
    fn removable_requires_topmost_and_complete() {
        let mut acc = access(AccessKind::Read, false, None);
        assert!(!acc.is_removable());
        acc.status_mut().insert(AccessStatus::TOPMOST_SATISFIED);
        assert!(!acc.is_removable());
        acc.status_mut().insert(AccessStatus::COMPLETE);
        assert!(acc.is_removable());
    }

    #[test]
    fn topmost_or_not_exclusive_gates_concurrent_and_reduction() {
        let mut acc = access(AccessKind::Concurrent, false, None);
        assert!(!topmost_or_not_exclusive(&acc), "not topmost-satisfied yet");
        acc.status_mut().insert(AccessStatus::TOPMOST_SATISFIED);
        assert!(topmost_or_not_exclusive(&acc));

        let write = access(AccessKind::Write, false, None);
        assert!(topmost_or_not_exclusive(&write), "non-exclusive kinds are unconditionally true");
    }
}
