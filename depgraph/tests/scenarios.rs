//! The six literal end-to-end scenarios from the spec's testable
//! properties section (S1-S6): RAW, WAR fragmentation, a concurrent group,
//! a reduction fan-in, a nested parent/grandchild removal chain, and
//! contiguous-region coalescing on removal.

use std::sync::Arc;

use depgraph::{
    handle_task_removal, register_task_access, unregister_task_accesses, AccessKind, DependencyData, EngineConfig,
    NoopInstrument, ReductionOp, Region, Task,
};
use depgraph::linking::link_task_accesses;

fn spawn<P>(parent: Option<&Arc<Task<P>>>, payload: P) -> Arc<Task<P>> {
    Task::new(parent.cloned(), None, payload)
}

fn link<P>(task: &Arc<Task<P>>) -> DependencyData<P> {
    let mut dep_data = DependencyData::new();
    link_task_accesses(task, &NoopInstrument, &EngineConfig::default(), &mut dep_data);
    dep_data
}

fn finish<P>(task: &Arc<Task<P>>) -> DependencyData<P> {
    let mut dep_data = DependencyData::new();
    unregister_task_accesses(task, &NoopInstrument, &mut dep_data);
    dep_data
}

fn remove<P>(task: &Arc<Task<P>>) -> DependencyData<P> {
    let mut dep_data = DependencyData::new();
    handle_task_removal(task, &NoopInstrument, &mut dep_data);
    dep_data
}

fn contains<P>(tasks: &[Arc<Task<P>>], needle: &Arc<Task<P>>) -> bool {
    tasks.iter().any(|t| Arc::ptr_eq(t, needle))
}

/// S1: RAW. Parent declares `[0,1024)` inout. Child A declares `[0,1024)`
/// write; child B declares `[0,1024)` read. B must not become ready until A
/// finalizes. After A's finalize, B's access is read_satisfied ∧
/// write_satisfied.
#[test]
fn s1_raw() {
    let parent: Arc<Task<()>> = spawn(None, ());
    register_task_access(&parent, AccessKind::ReadWrite, false, Region::new(0, 1024), None, &NoopInstrument).unwrap();
    link(&parent);

    let a = spawn(Some(&parent), ());
    register_task_access(&a, AccessKind::Write, false, Region::new(0, 1024), None, &NoopInstrument).unwrap();
    let _ = link(&a);
    assert_eq!(a.predecessor_count(), 0, "A has no predecessor, must be ready immediately");

    let b = spawn(Some(&parent), ());
    register_task_access(&b, AccessKind::Read, false, Region::new(0, 1024), None, &NoopInstrument).unwrap();
    let b_link = link(&b);
    assert!(!contains(b_link.ready_tasks(), &b), "B must wait for A (RAW)");
    assert!(b.predecessor_count() > 0);

    let a_finish = finish(&a);
    assert!(contains(a_finish.ready_tasks(), &b), "B becomes ready once A finalizes");
    assert_eq!(b.predecessor_count(), 0);

    let mut guard = b.data_accesses().lock();
    guard.accesses.process_intersecting(Region::new(0, 1024), |_, acc| {
        assert!(acc.is_read_satisfied());
        assert!(acc.is_write_satisfied());
    });
}

/// S2: WAR fragmentation. A: write `[0, 512)`; B: read `[256, 768)`. B's
/// access is split at 512; the `[256, 512)` piece is linked behind A, the
/// `[512, 768)` piece becomes satisfied immediately (local gap in parent).
#[test]
fn s2_war_fragmentation() {
    let parent: Arc<Task<()>> = spawn(None, ());
    register_task_access(&parent, AccessKind::ReadWrite, false, Region::new(0, 1024), None, &NoopInstrument).unwrap();
    link(&parent);

    let a = spawn(Some(&parent), ());
    register_task_access(&a, AccessKind::Write, false, Region::new(0, 512), None, &NoopInstrument).unwrap();
    link(&a);

    let b = spawn(Some(&parent), ());
    register_task_access(&b, AccessKind::Read, false, Region::new(256, 512), None, &NoopInstrument).unwrap();
    link(&b);

    assert!(b.predecessor_count() > 0, "the [256,512) piece still waits on A");

    let mut guard = b.data_accesses().lock();
    let mut pieces: Vec<(Region, bool)> = guard
        .accesses
        .iter()
        .map(|(r, acc)| (r, acc.is_satisfied()))
        .collect();
    pieces.sort_by_key(|(r, _)| r.start());
    assert_eq!(pieces.len(), 2);
    assert_eq!(pieces[0].0, Region::new(256, 256));
    assert!(!pieces[0].1, "[256,512) still waits on A");
    assert_eq!(pieces[1].0, Region::new(512, 256));
    assert!(pieces[1].1, "[512,768) is a local gap, satisfied immediately");
    drop(guard);

    let a_finish = finish(&a);
    assert!(contains(a_finish.ready_tasks(), &b));
}

/// S3: Concurrent group. A, B, C declare `[0,64)` concurrent. All three
/// become satisfied immediately upon linking under a common parent.
#[test]
fn s3_concurrent_group() {
    let parent: Arc<Task<()>> = spawn(None, ());
    register_task_access(&parent, AccessKind::ReadWrite, false, Region::new(0, 64), None, &NoopInstrument).unwrap();
    link(&parent);

    let tasks: Vec<Arc<Task<()>>> = (0..3)
        .map(|_| {
            let t = spawn(Some(&parent), ());
            register_task_access(&t, AccessKind::Concurrent, false, Region::new(0, 64), None, &NoopInstrument).unwrap();
            t
        })
        .collect();

    for t in &tasks {
        let _ = link(t);
        assert_eq!(t.predecessor_count(), 0, "concurrent accesses never block each other");
    }
}

/// S4: Reduction fan-in. A1..A8 declare `[0,64)` reduction with the same
/// op. All eight start in parallel; a subsequent read `[0,64)` does not
/// start until all eight complete.
#[test]
fn s4_reduction_fan_in() {
    let parent: Arc<Task<()>> = spawn(None, ());
    register_task_access(&parent, AccessKind::ReadWrite, false, Region::new(0, 64), None, &NoopInstrument).unwrap();
    link(&parent);

    let op = ReductionOp(7);
    let reducers: Vec<Arc<Task<()>>> = (0..8)
        .map(|_| {
            let t = spawn(Some(&parent), ());
            register_task_access(&t, AccessKind::Reduction, false, Region::new(0, 64), Some(op), &NoopInstrument).unwrap();
            t
        })
        .collect();

    for t in &reducers {
        let _ = link(t);
        assert_eq!(t.predecessor_count(), 0, "reductions over the same op never block each other");
    }

    let reader = spawn(Some(&parent), ());
    register_task_access(&reader, AccessKind::Read, false, Region::new(0, 64), None, &NoopInstrument).unwrap();
    let reader_link = link(&reader);
    assert!(!contains(reader_link.ready_tasks(), &reader), "read must wait for every reducer");

    for (i, t) in reducers.iter().enumerate() {
        let dep = finish(t);
        if i + 1 < reducers.len() {
            assert!(!contains(dep.ready_tasks(), &reader), "read waits until the last reducer finishes");
        } else {
            assert!(contains(dep.ready_tasks(), &reader), "read becomes ready once all reducers finish");
        }
    }
}

/// S5: Nested parent. Parent declares inout `[0,256)`, spawns child X which
/// declares inout `[0,256)` and itself spawns grandchild Y with read
/// `[64,192)`. X is removal-blocked by Y's mere existence from the moment Y
/// is spawned (`Task::new`'s live-subtask bookkeeping), independent of
/// whether Y's accesses have linked. Finishing X alone does not make it
/// removable; only once Y finishes and is then actually reclaimed
/// (`handle_task_removal`, which drains the bottom map and releases the
/// live-subtask block) does X become removable.
#[test]
fn s5_nested_parent() {
    let parent: Arc<Task<()>> = spawn(None, ());
    register_task_access(&parent, AccessKind::ReadWrite, false, Region::new(0, 256), None, &NoopInstrument).unwrap();
    link(&parent);

    let x = spawn(Some(&parent), ());
    register_task_access(&x, AccessKind::ReadWrite, false, Region::new(0, 256), None, &NoopInstrument).unwrap();
    link(&x);

    let y = spawn(Some(&x), ());
    assert_eq!(x.removal_blocking_count(), 1, "X is removal-blocked the moment Y is spawned");
    register_task_access(&y, AccessKind::Read, false, Region::new(64, 128), None, &NoopInstrument).unwrap();
    link(&y);

    let x_finish = finish(&x);
    assert!(!contains(x_finish.removable_tasks(), &x), "X still has a live subtask (Y)");
    assert_eq!(x.removal_blocking_count(), 1);

    let y_finish = finish(&y);
    assert!(contains(y_finish.removable_tasks(), &y), "Y has no subtasks of its own");

    let y_removal = remove(&y);
    assert!(contains(y_removal.removable_tasks(), &x), "reclaiming Y releases X's live-subtask block");
    assert_eq!(x.removal_blocking_count(), 0);
}

/// Three-hop write-read-write chain. A writes `[0,64)`, B reads `[0,64)`, C
/// writes `[0,64)`, all under a common parent and all linked before any of
/// them finish. Finishing A must make B ready but must not reach past B to
/// satisfy C early: C's real predecessor is B, not A, and propagation has to
/// re-root on B's own state at that hop rather than keep forwarding A's.
#[test]
fn chain_propagation_does_not_skip_a_hop() {
    let parent: Arc<Task<()>> = spawn(None, ());
    register_task_access(&parent, AccessKind::ReadWrite, false, Region::new(0, 64), None, &NoopInstrument).unwrap();
    link(&parent);

    let a = spawn(Some(&parent), ());
    register_task_access(&a, AccessKind::Write, false, Region::new(0, 64), None, &NoopInstrument).unwrap();
    link(&a);

    let b = spawn(Some(&parent), ());
    register_task_access(&b, AccessKind::Read, false, Region::new(0, 64), None, &NoopInstrument).unwrap();
    link(&b);
    assert!(b.predecessor_count() > 0, "B waits on A");

    let c = spawn(Some(&parent), ());
    register_task_access(&c, AccessKind::Write, false, Region::new(0, 64), None, &NoopInstrument).unwrap();
    link(&c);
    assert!(c.predecessor_count() > 0, "C waits on B");

    let a_finish = finish(&a);
    assert!(contains(a_finish.ready_tasks(), &b), "B becomes ready once A finalizes");
    assert_eq!(b.predecessor_count(), 0);
    assert!(!contains(a_finish.ready_tasks(), &c), "C must not be reported ready from A's completion");
    assert!(c.predecessor_count() > 0, "C still waits on B, which hasn't finished");

    let b_finish = finish(&b);
    assert!(contains(b_finish.ready_tasks(), &c), "C becomes ready only once B, its real predecessor, finalizes");
    assert_eq!(c.predecessor_count(), 0);
}

/// S6: Contiguous-union removal. Two accesses `[0,64)` and `[64,128)` both
/// become removable in the same finalize; their removal-from-bottom-map
/// coalesces into a single `[0,128)` region applied to the parent.
#[test]
fn s6_contiguous_union_removal() {
    let parent: Arc<Task<()>> = spawn(None, ());
    register_task_access(&parent, AccessKind::ReadWrite, false, Region::new(0, 128), None, &NoopInstrument).unwrap();
    link(&parent);

    let child = spawn(Some(&parent), ());
    register_task_access(&child, AccessKind::Write, false, Region::new(0, 64), None, &NoopInstrument).unwrap();
    register_task_access(&child, AccessKind::Write, false, Region::new(64, 64), None, &NoopInstrument).unwrap();
    link(&child);

    let dep = finish(&child);
    assert!(contains(dep.removable_tasks(), &child));

    let removal = remove(&child);
    assert_eq!(removal.removed_regions(), &[Region::new(0, 128)], "adjacent removed regions coalesce");
}
