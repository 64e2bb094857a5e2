//! Runtime and Policy Tests
//!
//! Covers the per-thread runtime entry points, the advisory limit policy,
//! fallible allocation and the structured event log.

#[macro_use]
mod common;

use common::{assert_finalized, assert_idle, FinalizeCounter, GcFixture, StaleBlocks, CLEAR_BYTES};
use stackgc::logging::{self, GcEvent, GcLoggerConfig, LogLevel};
use stackgc::{runtime, stack, Gc, GcConfig, GcError, GcManager};

/// Payload large enough to push past a small limit quickly
struct Blob([u8; 256]);

impl Blob {
    fn new() -> Self {
        Blob([0xAB; 256])
    }
}

fn small_limit_config() -> GcConfig {
    GcConfig {
        initial_memory_limit: 1024,
        max_memory_limit: 4096,
        ..Default::default()
    }
}

#[inline(never)]
fn allocate_unreachable_blobs(manager: &GcManager, count: usize) {
    for _ in 0..count {
        drop(std::hint::black_box(manager.allocate(Blob::new())));
    }
}

/// Limit grows when a cycle frees too little
///
/// **Bug this finds:** Collection storms when the live set exceeds the limit
#[test]
fn test_limit_bumped_when_live_set_is_large() {
    let fixture = GcFixture::with_config(small_limit_config());
    let manager = &fixture.manager;

    let kept: [Gc<Blob>; 8] = std::array::from_fn(|_| manager.allocate(Blob::new()));
    assert_eq!(manager.allocated_memory(), 8 * Gc::<Blob>::footprint());
    assert!(manager.is_collection_needed());

    stack::clear_dead_stack(CLEAR_BYTES);
    assert_eq!(manager.collect_if_needed().unwrap(), Some(0));
    assert_eq!(manager.memory_limit(), 2048);

    assert_eq!(manager.collect_if_needed().unwrap(), Some(0));
    assert_eq!(manager.memory_limit(), 4096);

    assert_eq!(manager.collect_if_needed().unwrap(), None);
    assert_eq!(manager.cycle_count(), 2);

    // Capped at the maximum
    assert_eq!(manager.bump_memory_limit(), 4096);
    assert!(kept.iter().all(|blob| manager.is_tracked(blob)));
}

/// Limit stays put when a cycle frees enough
///
/// **Bug this finds:** Limit ratcheting up after productive cycles
#[test]
fn test_limit_kept_when_garbage_reclaimed() {
    let fixture = GcFixture::with_config(small_limit_config());
    let manager = &fixture.manager;

    allocate_unreachable_blobs(manager, 8);
    assert!(manager.is_collection_needed());

    stack::clear_dead_stack(CLEAR_BYTES);
    let freed = manager.collect_if_needed().unwrap();

    assert_eq!(freed, Some(8 * Gc::<Blob>::footprint()));
    assert_eq!(manager.memory_limit(), 1024);
    assert_eq!(manager.allocated_memory(), 0);
}

/// Failed initialization registers nothing
///
/// **Bug this finds:** Phantom objects in the register after a failed build
#[test]
fn test_try_allocate_with() {
    let fixture = GcFixture::with_defaults();
    let manager = &fixture.manager;

    let failed: Result<Gc<Blob>, &str> = manager.try_allocate_with(|| Err("no blob today"));
    assert_eq!(failed.err(), Some("no blob today"));
    assert_eq!(manager.object_count(), 0);
    assert_eq!(manager.allocated_memory(), 0);

    let built: Result<Gc<Blob>, &str> = manager.try_allocate_with(|| Ok(Blob::new()));
    let built = built.unwrap();
    assert!(manager.is_tracked(&built));
    assert_eq!(built.0[255], 0xAB);
}

/// Runtime entry points on a fresh thread
///
/// **Bug this finds:** Runtime state leaking between threads, late init accepted
#[test]
fn test_runtime_on_fresh_thread() {
    let result = std::thread::spawn(|| -> stackgc::Result<()> {
        let _stale = StaleBlocks::reserve();
        assert!(!runtime::is_initialized());
        runtime::init(small_limit_config())?;
        assert!(runtime::is_initialized());

        let err = runtime::init(GcConfig::default()).unwrap_err();
        assert!(matches!(err, GcError::InvalidState { .. }));

        let counter = FinalizeCounter::new();
        runtime::with_manager(|manager| common::allocate_unreachable(manager, &counter, 5))?;
        let kept = runtime::allocate(Blob::new())?;

        stack::clear_dead_stack(CLEAR_BYTES);
        runtime::collect()?;
        common::assert_finalized(&counter, 5, "runtime collect");
        assert_eq!(runtime::allocated_memory()?, Gc::<Blob>::footprint());
        assert_eq!(runtime::collect_if_needed()?, None);

        assert_eq!(runtime::clear()?, 1);
        assert_eq!(runtime::allocated_memory()?, 0);
        drop(kept);
        Ok(())
    })
    .join()
    .unwrap();

    result.unwrap();
}

/// Verbose managers feed the structured log
///
/// **Bug this finds:** Events missing or carrying wrong numbers
#[test]
fn test_verbose_events_logged() {
    logging::configure_logger(GcLoggerConfig {
        level: LogLevel::Trace,
        console: false,
        ..Default::default()
    });

    let fixture = GcFixture::with_config(GcConfig {
        verbose: true,
        ..Default::default()
    });
    let counter = FinalizeCounter::new();
    let footprint = Gc::<common::Counted>::footprint();

    common::allocate_unreachable(&fixture.manager, &counter, 3);
    let kept = fixture.manager.allocate(Blob::new());
    let freed = collect!(fixture.manager);
    assert_eq!(freed, 3 * footprint);
    std::hint::black_box(&kept);
    drop(fixture);

    let events: Vec<GcEvent> = logging::global_events()
        .into_iter()
        .map(|logged| logged.event)
        .collect();

    let tracked = events
        .iter()
        .filter(|e| matches!(e, GcEvent::AllocationTracked { .. }))
        .count();
    assert_eq!(tracked, 4);

    assert!(events.iter().any(|e| matches!(
        e,
        GcEvent::CycleStart { object_count: 4, reason, .. } if reason == "explicit"
    )));
    assert!(events
        .iter()
        .any(|e| matches!(e, GcEvent::PhaseEnd { phase, .. } if phase == "mark")));
    assert!(events
        .iter()
        .any(|e| matches!(e, GcEvent::PhaseEnd { phase, .. } if phase == "sweep")));
    assert!(events.iter().any(|e| matches!(
        e,
        GcEvent::CycleEnd { reclaimed_bytes, objects_finalized: 3, .. }
            if *reclaimed_bytes == freed
    )));
    assert!(events
        .iter()
        .any(|e| matches!(e, GcEvent::Teardown { objects: 1, .. })));

    let json = serde_json::to_string(&logging::global_events()[0]).unwrap();
    assert!(json.contains("\"type\""));
    assert!(json.contains("\"timestamp\""));
}

#[inline(never)]
fn collect_from_depth(manager: &GcManager, depth: usize) -> stackgc::Result<usize> {
    let padding = std::hint::black_box([0u8; 1024]);
    let result = if depth == 0 {
        manager.garbage_collect()
    } else {
        collect_from_depth(manager, depth - 1)
    };
    std::hint::black_box(&padding);
    result
}

/// Stack in use beyond `max_stack_scan`
///
/// **Bug this finds:** Partial scans sweeping live objects, state left in
/// Marking after the error
#[test]
fn test_stack_scan_cap_fails_cycle_cleanly() {
    let fixture = GcFixture::with_config(GcConfig {
        max_stack_scan: 4096,
        ..Default::default()
    });
    let counter = FinalizeCounter::new();
    common::allocate_unreachable(&fixture.manager, &counter, 3);

    let err = collect_from_depth(&fixture.manager, 32).unwrap_err();

    assert!(matches!(err, GcError::StackBounds(_)), "got {:?}", err);
    assert!(err.is_fatal());
    assert_idle(&fixture.manager, "after refused scan");
    assert_finalized(&counter, 0, "nothing swept");
    common::assert_accounting::<common::Counted>(&fixture.manager, 3, "nothing unaccounted");
    assert!(fixture.manager.last_cycle().is_none());
    assert_eq!(fixture.manager.stats().total_cycles, 0);
}
