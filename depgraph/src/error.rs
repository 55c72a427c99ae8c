//! Two error classes only: user-program errors (fatal, carry the offending
//! task's label) and internal assertions (debug-only panics, via
//! `debug_assert!` at the call sites that need them). There is no exception
//! surface beyond this and no partial rollback — once an access is
//! registered, it is logically live.

use core::fmt;

use region::Region;

/// A fatal conflict between two data accesses declared by the same task
/// over the same region.
///
/// Returned by [`crate::registration::register_task_access`] rather than
/// aborting the process directly, so embedders (and this crate's own
/// tests) can observe and report it. A bootstrap layer that wants the
/// original runtime's behavior of aborting immediately should call
/// [`fatal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictError {
    /// A `Concurrent` access was combined with an access of any other kind
    /// over an overlapping region within the same task.
    ConcurrentCombinedWithOther { region: Region },
    /// A `Reduction` access was combined with an access of any other kind
    /// (including a second `Reduction`, unless its operator matches — see
    /// [`ConflictError::ReductionOperatorMismatch`]) over an overlapping
    /// region within the same task.
    ReductionCombinedWithOther { region: Region },
    /// Two `Reduction` accesses over the same region declared different
    /// reduction operators.
    ReductionOperatorMismatch { region: Region },
}

impl ConflictError {
    #[must_use]
    pub fn region(&self) -> Region {
        match self {
            ConflictError::ConcurrentCombinedWithOther { region }
            | ConflictError::ReductionCombinedWithOther { region }
            | ConflictError::ReductionOperatorMismatch { region } => *region,
        }
    }
}

impl fmt::Display for ConflictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictError::ConcurrentCombinedWithOther { region } => write!(
                f,
                "concurrent access over {region:?} combined with an access of another kind"
            ),
            ConflictError::ReductionCombinedWithOther { region } => write!(
                f,
                "reduction access over {region:?} combined with an access of another kind"
            ),
            ConflictError::ReductionOperatorMismatch { region } => write!(
                f,
                "two reduction accesses over {region:?} declared different reduction operators"
            ),
        }
    }
}

impl core::error::Error for ConflictError {}

/// Reports a user-program error the way the original runtime's
/// `FatalErrorHandler` does: print the offending task's label and the
/// error, then abort the process. The dependency engine itself never calls
/// this — it surfaces [`ConflictError`] to the caller instead — but a
/// bootstrap layer wiring the engine up to a real CLI would.
pub fn fatal(task_label: &str, err: &ConflictError) -> ! {
    eprintln!("fatal error in task '{task_label}': {err}");
    std::process::abort();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_reports_the_offending_region() {
        let region = Region::new(0, 64);
        let err = ConflictError::ReductionOperatorMismatch { region };
        assert_eq!(err.region(), region);
    }

    #[test]
    fn display_mentions_the_region() {
        let err = ConflictError::ConcurrentCombinedWithOther { region: Region::new(0, 64) };
        assert!(err.to_string().contains("concurrent"));
    }
}
