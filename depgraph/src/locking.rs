//! The "lock-pair" primitive from spec §9's design notes: acquiring a
//! second task's lock while already holding one's own, when the two tasks
//! have no defined ordering relative to each other (e.g. siblings).
//!
//! The fast path is a plain `try_lock`, which succeeds whenever there's no
//! contention and never requires giving up the lock we're already holding.
//! Only on contention do we fall back to releasing our own lock first,
//! blocking-acquiring the other task's lock, then reacquiring ours — in
//! that order, so we're never waiting on a lock while holding one that the
//! other side might be waiting on too.

use std::sync::Arc;

use spin::MutexGuard;

use crate::task::{Task, TaskAccessMaps};

/// Acquires `other`'s access lock while `own_guard` is held for a
/// different task, using `try_lock` first and falling back to an
/// unlock/relock dance on contention.
pub(crate) fn lock_pair<'o, P>(
    own_guard: &mut MutexGuard<'_, TaskAccessMaps<P>>,
    other: &'o Arc<Task<P>>,
) -> MutexGuard<'o, TaskAccessMaps<P>> {
    if let Some(guard) = other.data_accesses().try_lock() {
        return guard;
    }

    let mut acquired = None;
    MutexGuard::unlocked(own_guard, || {
        acquired = Some(other.data_accesses().lock());
    });
    acquired.expect("other task's lock was acquired inside the unlocked scope")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;

    #[test]
    fn uncontended_pair_locks_without_releasing_our_own() {
        let a: Arc<Task<()>> = Task::new(None, None, ());
        let b: Arc<Task<()>> = Task::new(None, None, ());

        let mut a_guard = a.data_accesses().lock();
        let b_guard = lock_pair(&mut a_guard, &b);
        // Both locks are held simultaneously; neither try_lock below should
        // succeed until the guards above are dropped.
        assert!(a.data_accesses().try_lock().is_none());
        assert!(b.data_accesses().try_lock().is_none());
        drop(b_guard);
        drop(a_guard);
        assert!(a.data_accesses().try_lock().is_some());
    }
}
