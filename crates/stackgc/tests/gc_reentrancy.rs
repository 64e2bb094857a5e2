//! Re-entrancy Tests - Finalizers Calling Back Into the Collector
//!
//! Finalizers run during sweep and teardown. They may allocate through the
//! same manager, must get an error if they try to collect, and a panicking
//! finalizer must not leave the manager stuck mid-cycle.

#[macro_use]
mod common;

use common::{assert_finalized, assert_idle, FinalizeCounter, GcFixture, Counted, StaleBlocks};
use stackgc::{runtime, Gc, GcError};
use std::cell::{Cell, RefCell};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

/// Allocates a replacement object through the thread runtime when finalized
struct Respawner {
    counter: FinalizeCounter,
    spawned: Rc<RefCell<Vec<Gc<Counted>>>>,
    _padding: [u64; 4],
}

impl Drop for Respawner {
    fn drop(&mut self) {
        let replacement = runtime::allocate(self.counter.counted(0)).expect("runtime available in sweep");
        self.spawned.borrow_mut().push(replacement);
    }
}

#[inline(never)]
fn drop_respawners(counter: &FinalizeCounter, spawned: &Rc<RefCell<Vec<Gc<Counted>>>>, count: usize) {
    for _ in 0..count {
        let handle = runtime::allocate(Respawner {
            counter: counter.clone(),
            spawned: spawned.clone(),
            _padding: [0; 4],
        })
        .unwrap();
        drop(std::hint::black_box(handle));
    }
}

/// Allocation from a finalizer during sweep
///
/// **Bug this finds:** Register borrowed across finalizers, corrupted sweep,
/// new objects accounted wrongly or marked
#[test]
fn test_finalizer_allocation_during_sweep() {
    let _stale = StaleBlocks::reserve();
    let counter = FinalizeCounter::new();
    let spawned = Rc::new(RefCell::new(Vec::new()));

    drop_respawners(&counter, &spawned, 3);
    assert_eq!(runtime::allocated_memory().unwrap(), 3 * Gc::<Respawner>::footprint());

    stackgc::stack::clear_dead_stack(common::CLEAR_BYTES);
    let freed = runtime::collect().unwrap();

    let spawned = spawned.borrow();
    assert_eq!(spawned.len(), 3);
    assert_eq!(
        freed,
        3 * (Gc::<Respawner>::footprint() - Gc::<Counted>::footprint())
    );
    assert_eq!(runtime::allocated_memory().unwrap(), 3 * Gc::<Counted>::footprint());

    runtime::with_manager(|manager| {
        assert_eq!(manager.object_count(), 3);
        for object in spawned.iter() {
            assert!(manager.is_tracked(object));
            assert_eq!(manager.is_marked(object), Some(false));
        }
        assert_idle(manager, "after sweep with allocation");
    })
    .unwrap();
    assert_finalized(&counter, 0, "respawned objects are still owned");
}

/// Tries to collect from inside its own finalizer
struct Recollector {
    outcome: Rc<RefCell<Option<stackgc::Result<usize>>>>,
}

impl Drop for Recollector {
    fn drop(&mut self) {
        *self.outcome.borrow_mut() = Some(runtime::collect());
    }
}

#[inline(never)]
fn drop_recollector(outcome: &Rc<RefCell<Option<stackgc::Result<usize>>>>) {
    let handle = runtime::allocate(Recollector {
        outcome: outcome.clone(),
    })
    .unwrap();
    drop(std::hint::black_box(handle));
}

/// Collection requested from a finalizer
///
/// **Bug this finds:** Nested cycles corrupting the outer sweep
#[test]
fn test_nested_collection_is_rejected() {
    let _stale = StaleBlocks::reserve();
    let outcome = Rc::new(RefCell::new(None));

    drop_recollector(&outcome);
    stackgc::stack::clear_dead_stack(common::CLEAR_BYTES);
    runtime::collect().unwrap();

    let outcome = outcome.borrow_mut().take().expect("finalizer ran");
    assert!(matches!(outcome, Err(GcError::ReentrantCollection)));
    assert_eq!(runtime::allocated_memory().unwrap(), 0);
}

struct Bomb;

impl Drop for Bomb {
    fn drop(&mut self) {
        // A second panic while unwinding would abort the test binary.
        if !std::thread::panicking() {
            panic!("finalizer failure");
        }
    }
}

#[inline(never)]
fn drop_bomb(fixture: &GcFixture) {
    drop(std::hint::black_box(fixture.manager.allocate(Bomb)));
}

/// Panicking finalizer
///
/// **Bug this finds:** State stuck in Sweeping, accounting still counting the
/// detached object, manager unusable afterwards
#[test]
fn test_panicking_finalizer_leaves_manager_usable() {
    let fixture = GcFixture::with_defaults();
    let counter = FinalizeCounter::new();

    drop_bomb(&fixture);
    stackgc::stack::clear_dead_stack(common::CLEAR_BYTES);
    let result = catch_unwind(AssertUnwindSafe(|| fixture.manager.garbage_collect()));

    assert!(result.is_err(), "finalizer panic propagates");
    assert_idle(&fixture.manager, "after panicking finalizer");
    assert_eq!(fixture.manager.allocated_memory(), 0);
    assert_eq!(fixture.manager.object_count(), 0);

    common::allocate_unreachable(&fixture.manager, &counter, 2);
    collect!(fixture.manager);
    assert_finalized(&counter, 2, "next cycle after the panic");
}

/// Finalizer allocating during teardown
///
/// **Bug this finds:** Objects created by teardown finalizers left tracked
#[test]
fn test_clear_releases_objects_allocated_by_finalizers() {
    let _stale = StaleBlocks::reserve();
    let counter = FinalizeCounter::new();
    let spawned = Rc::new(RefCell::new(Vec::new()));

    drop_respawners(&counter, &spawned, 2);
    let released = runtime::clear().unwrap();

    assert_eq!(released, 4, "two respawners plus the two objects they created");
    assert_eq!(runtime::allocated_memory().unwrap(), 0);
    assert_eq!(spawned.borrow().len(), 2);
    assert_finalized(&counter, 0, "spawned list still owns the objects");

    spawned.borrow_mut().clear();
    assert_finalized(&counter, 2, "objects dropped by the list");
}

/// Finalizer that always allocates a successor
struct Endless(Rc<Cell<usize>>);

impl Drop for Endless {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
        // Only while the thread runtime is alive; a failed allocation would
        // drop the successor here and recurse.
        if runtime::is_initialized() {
            let _ = runtime::allocate(Endless(self.0.clone()));
        }
    }
}

/// Teardown against a finalizer that never stops allocating
///
/// **Bug this finds:** Unbounded teardown loops, leftovers hidden from the
/// accounting
#[test]
fn test_clear_stops_at_round_cap() {
    let (released, remaining, bytes, drops) = std::thread::spawn(|| {
        let drops = Rc::new(Cell::new(0));
        drop(runtime::allocate(Endless(drops.clone())).unwrap());

        let released = runtime::clear().unwrap();
        let remaining = runtime::with_manager(|manager| manager.object_count()).unwrap();
        let bytes = runtime::allocated_memory().unwrap();
        (released, remaining, bytes, drops.get())
    })
    .join()
    .unwrap();

    assert_eq!(released, 64, "one object per round");
    assert_eq!(drops, 64);
    assert_eq!(remaining, 1, "the last successor stays tracked");
    assert_eq!(bytes, Gc::<Endless>::footprint());
}
