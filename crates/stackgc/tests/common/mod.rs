//! Test Utilities for the stackgc Test Suite
//!
//! Conservative scanning makes stale stack contents part of the root set, so
//! the helpers here follow two rules:
//!
//! 1. Objects meant to become garbage are allocated and dropped inside an
//!    `#[inline(never)]` helper, never in the test body itself.
//! 2. Dead stack is zeroed from the test body right before collecting; use
//!    `collect!` (import with `#[macro_use] mod common;`) which does it in
//!    the caller's frame.
//! 3. Live frames above the test can hold addresses of blocks freed before
//!    the test started. Every fixture reserves those blocks first
//!    ([`StaleBlocks`]); tests that allocate through the runtime reserve
//!    them themselves.

#![allow(dead_code)]

pub use stackgc::testing::StaleBlocks;
use stackgc::{Gc, GcConfig, GcManager, GcState, ScanGranularity};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Dead stack zeroed by `collect!` before each cycle
pub const CLEAR_BYTES: usize = 64 * 1024;

/// Clear dead stack in the calling frame, then run one cycle
///
/// Expands in place so the zeroing happens at the caller's depth.
#[allow(unused_macros)]
macro_rules! collect {
    ($manager:expr) => {{
        stackgc::stack::clear_dead_stack($crate::common::CLEAR_BYTES);
        $manager
            .garbage_collect()
            .expect("garbage_collect should succeed")
    }};
}

/// ============================================================================
/// GC FIXTURE
/// ============================================================================

/// Test fixture owning one manager
pub struct GcFixture {
    pub manager: GcManager,
    pub config: GcConfig,
    _stale: StaleBlocks,
}

impl GcFixture {
    /// Create fixture with default configuration
    ///
    /// **Bug this finds:** Configuration validation bugs, stack bound lookup failures
    pub fn with_defaults() -> Self {
        Self::with_config(GcConfig::default())
    }

    /// Create fixture with a given scan step
    pub fn with_granularity(scan_granularity: ScanGranularity) -> Self {
        Self::with_config(GcConfig {
            scan_granularity,
            ..Default::default()
        })
    }

    pub fn with_config(config: GcConfig) -> Self {
        let stale = StaleBlocks::reserve();
        let manager = GcManager::new(config.clone())
            .expect("manager initialization should succeed with valid config");
        Self {
            manager,
            config,
            _stale: stale,
        }
    }
}

/// ============================================================================
/// FINALIZER COUNTING
/// ============================================================================

/// Shared finalizer counter
#[derive(Clone, Default)]
pub struct FinalizeCounter(Rc<Cell<usize>>);

impl FinalizeCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.0.get()
    }

    /// Payload whose `Drop` bumps this counter
    pub fn counted(&self, id: usize) -> Counted {
        Counted {
            counter: self.clone(),
            id,
        }
    }

    fn bump(&self) {
        self.0.set(self.0.get() + 1);
    }
}

/// Object whose finalizer is counted
pub struct Counted {
    counter: FinalizeCounter,
    pub id: usize,
}

impl Drop for Counted {
    fn drop(&mut self) {
        self.counter.bump();
    }
}

/// Graph node with two outgoing edges, finalization counted
pub struct Node {
    pub id: usize,
    pub edges: [RefCell<Option<Gc<Node>>>; 2],
    _counted: Counted,
}

impl Node {
    pub fn new(counter: &FinalizeCounter, id: usize) -> Self {
        Self {
            id,
            edges: [RefCell::new(None), RefCell::new(None)],
            _counted: counter.counted(id),
        }
    }

    pub fn link(&self, slot: usize, target: &Gc<Node>) {
        *self.edges[slot].borrow_mut() = Some(target.clone());
    }

    /// Drop both edges, breaking any cycle through this node
    pub fn unlink(&self) {
        for edge in &self.edges {
            edge.borrow_mut().take();
        }
    }
}

/// ============================================================================
/// GARBAGE BUILDERS
/// ============================================================================

/// Allocate `count` objects and drop every handle
///
/// **Bug this finds:** Unreachable objects retained, finalizers skipped
#[inline(never)]
pub fn allocate_unreachable(manager: &GcManager, counter: &FinalizeCounter, count: usize) {
    for id in 0..count {
        let handle = manager.allocate(counter.counted(id));
        drop(std::hint::black_box(handle));
    }
}

/// Allocate two nodes referencing each other and drop both handles
#[inline(never)]
pub fn allocate_unreachable_cycle(manager: &GcManager, counter: &FinalizeCounter) {
    let a = manager.allocate(Node::new(counter, 0));
    let b = manager.allocate(Node::new(counter, 1));
    a.link(0, &b);
    b.link(0, &a);
    drop(std::hint::black_box(a));
    drop(std::hint::black_box(b));
}

/// Build a linked chain of `len` nodes and return its head
///
/// Only the head handle leaves the helper; every other node is reachable
/// solely through the preceding node's edge.
#[inline(never)]
pub fn allocate_chain(manager: &GcManager, counter: &FinalizeCounter, len: usize) -> Gc<Node> {
    let head = manager.allocate(Node::new(counter, 0));
    let mut tail = head.clone();
    for id in 1..len {
        let next = manager.allocate(Node::new(counter, id));
        tail.link(0, &next);
        tail = next;
    }
    head
}

/// Break every edge reachable from `head`
pub fn unlink_chain(head: &Gc<Node>) {
    let mut current = Some(head.clone());
    while let Some(node) = current {
        current = node.edges[0].borrow_mut().take();
        node.edges[1].borrow_mut().take();
    }
}

/// ============================================================================
/// STRICT ASSERTION HELPERS
/// ============================================================================

/// Assert the exact number of finalizer runs
///
/// **Tolerance:** ZERO - a missing run is a leak, an extra run is a double free
#[track_caller]
pub fn assert_finalized(counter: &FinalizeCounter, expected: usize, context: &str) {
    assert_eq!(
        counter.count(),
        expected,
        "{}: expected {} finalizer runs, saw {}",
        context,
        expected,
        counter.count()
    );
}

/// Assert the manager is idle after a cycle
///
/// **Bug this finds:** State machine stuck after errors or panics
#[track_caller]
pub fn assert_idle(manager: &GcManager, context: &str) {
    assert_eq!(
        manager.state(),
        GcState::Idle,
        "{}: manager state is {:?}, expected Idle",
        context,
        manager.state()
    );
    assert!(!manager.is_collecting(), "{}: still collecting", context);
}

/// Assert the number of stack words that matched a tracked address
///
/// Garbage-only scenarios expect zero; anything else means a stale stack
/// word kept an object alive, which is reported here rather than as a
/// missing finalizer run.
#[track_caller]
pub fn assert_roots_found(manager: &GcManager, expected: usize, context: &str) {
    let roots = manager
        .last_cycle()
        .expect("stats enabled and a cycle has run")
        .roots_found;
    assert_eq!(
        roots, expected,
        "{}: {} stack words matched tracked addresses, expected {} (false retention)",
        context, roots, expected
    );
}

/// Assert accounting covers exactly `tracked` objects of type `T`
///
/// **Bug this finds:** Byte counter drifting from the register contents
#[track_caller]
pub fn assert_accounting<T>(manager: &GcManager, tracked: usize, context: &str) {
    assert_eq!(
        manager.object_count(),
        tracked,
        "{}: object count mismatch",
        context
    );
    assert_eq!(
        manager.allocated_memory(),
        tracked * Gc::<T>::footprint(),
        "{}: allocated bytes do not match {} tracked objects",
        context,
        tracked
    );
}
