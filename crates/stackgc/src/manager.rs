//! Memory Manager - Allocation, Collection and Teardown
//!
//! `GcManager` owns the object register of one thread. It hands out `Gc<T>`
//! handles, keeps one handle per object for itself (the manager hook), and on
//! request runs a stop-the-world cycle over the calling thread:
//!
//! ```text
//! Idle ──► Marking ──► Sweeping ──► Idle
//!          │           │
//!          │           └─ release the hook of every unmarked object,
//!          │              unmark survivors
//!          └─ spill registers, scan [sp, stack base) for tracked
//!             addresses, trace inner references
//! ```
//!
//! All methods take `&self`. Finalizers run while the register is not
//! borrowed, so a `Drop` impl may allocate through the same manager.

use crate::config::GcConfig;
use crate::error::{GcError, Result};
use crate::logging::{self, GcEvent};
use crate::marker::{MarkStats, Marker};
use crate::object::{Gc, ObjectHolder, ObjectRegister, TrackedObject};
use crate::stack::{self, StackBounds};
use crate::stats::{CycleStats, GcStats, GcSummary, GcTimer};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::marker::PhantomData;

/// Collection cycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcState {
    /// No collection in progress
    Idle,
    /// Scanning the stack and tracing inner references
    Marking,
    /// Releasing unmarked objects
    Sweeping,
}

impl fmt::Display for GcState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GcState::Idle => "idle",
            GcState::Marking => "marking",
            GcState::Sweeping => "sweeping",
        };
        f.write_str(name)
    }
}

/// Reason a cycle was started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcReason {
    /// `garbage_collect` called by the client
    Explicit,
    /// `collect_if_needed` found the advisory limit exceeded
    MemoryLimit { allocated: usize, limit: usize },
}

impl fmt::Display for GcReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GcReason::Explicit => f.write_str("explicit"),
            GcReason::MemoryLimit { allocated, limit } => {
                write!(f, "memory limit ({} > {} bytes)", allocated, limit)
            }
        }
    }
}

/// Teardown passes before `clear` gives up on finalizers that keep allocating
const MAX_TEARDOWN_ROUNDS: usize = 64;

/// GcManager - per-thread conservative mark-and-sweep collector
///
/// # Examples
///
/// ```rust
/// use stackgc::{GcConfig, GcManager};
///
/// let manager = GcManager::new(GcConfig::default())?;
/// let numbers = manager.allocate(vec![1, 2, 3]);
/// assert_eq!(numbers.len(), 3);
/// assert!(manager.is_tracked(&numbers));
///
/// // `numbers` is still on the stack, so it survives
/// manager.garbage_collect()?;
/// assert!(manager.is_tracked(&numbers));
/// # Ok::<(), stackgc::GcError>(())
/// ```
pub struct GcManager {
    config: GcConfig,
    bounds: StackBounds,
    register: RefCell<ObjectRegister>,
    allocated: Cell<usize>,
    memory_limit: Cell<usize>,
    state: Cell<GcState>,
    cycle_count: Cell<u64>,
    stats: RefCell<GcStats>,
    /// Tied to the thread whose stack it scans
    _not_send: PhantomData<*const ()>,
}

impl GcManager {
    /// Create a manager for the calling thread
    ///
    /// # Errors
    /// - `Configuration` if `config` does not validate
    /// - `StackBounds` if the thread's stack range cannot be resolved
    pub fn new(config: GcConfig) -> Result<Self> {
        config.validate()?;
        let bounds = stack::stack_bounds()?;

        log::debug!(
            "Collector ready: stack [{:#x}, {:#x}), limit {} bytes, {:?} scan",
            bounds.limit,
            bounds.base,
            config.initial_memory_limit,
            config.scan_granularity
        );

        Ok(Self {
            memory_limit: Cell::new(config.initial_memory_limit),
            config,
            bounds,
            register: RefCell::new(ObjectRegister::new()),
            allocated: Cell::new(0),
            state: Cell::new(GcState::Idle),
            cycle_count: Cell::new(0),
            stats: RefCell::new(GcStats::new()),
            _not_send: PhantomData,
        })
    }

    /// Create a manager with the default configuration
    pub fn with_defaults() -> Result<Self> {
        Self::new(GcConfig::default())
    }

    /// Allocate `value` and start tracking it
    ///
    /// The returned handle and the manager each own one reference.
    pub fn allocate<T: 'static>(&self, value: T) -> Gc<T> {
        let handle = Gc::new(value);
        self.track(ObjectHolder::new(handle.clone()));
        handle
    }

    /// Build a value with `init` and allocate it
    ///
    /// # Errors
    /// Returns the error from `init`; nothing is registered in that case.
    pub fn try_allocate_with<T, E, F>(&self, init: F) -> std::result::Result<Gc<T>, E>
    where
        T: 'static,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        let value = init()?;
        Ok(self.allocate(value))
    }

    fn track<T: 'static>(&self, holder: ObjectHolder<T>) {
        let address = holder.object_address();
        let size = holder.object_size();

        let inserted = self.register.borrow_mut().insert(Box::new(holder));
        debug_assert!(inserted.is_ok(), "fresh allocation collided with a tracked address");
        if let Err(e) = inserted {
            // The holder was dropped with the error; the caller is the sole owner.
            log::error!("Failed to track {}: {}", std::any::type_name::<T>(), e);
            return;
        }

        let allocated = self.allocated.get() + size;
        self.allocated.set(allocated);
        if self.config.stats_enabled {
            self.stats.borrow_mut().record_allocated(allocated);
        }

        log::trace!(
            "Tracked {} at {:#x} ({} bytes)",
            std::any::type_name::<T>(),
            address,
            size
        );
        self.emit(|| GcEvent::AllocationTracked {
            type_name: std::any::type_name::<T>().to_string(),
            address,
            size,
        });
    }

    /// Run a full mark-and-sweep cycle on the calling thread
    ///
    /// Returns the bytes reclaimed: allocated bytes before marking minus
    /// allocated bytes after sweeping. Objects allocated by finalizers during
    /// the sweep count against that difference.
    ///
    /// # Errors
    /// - `ReentrantCollection` when called from a finalizer of this manager
    /// - `StackBounds` when the stack pointer left the recorded stack range,
    ///   or the range to scan exceeds `max_stack_scan`
    #[inline(never)]
    pub fn garbage_collect(&self) -> Result<usize> {
        self.collect_with_reason(GcReason::Explicit)
    }

    #[inline(never)]
    fn collect_with_reason(&self, reason: GcReason) -> Result<usize> {
        if self.state.get() != GcState::Idle {
            return Err(GcError::ReentrantCollection);
        }

        // Frames below this one are about to be reused by the cycle.
        stack::clear_dead_stack(self.config.clear_stack_bytes);

        self.run_cycle(reason)
    }

    #[inline(never)]
    fn run_cycle(&self, reason: GcReason) -> Result<usize> {
        let _guard = CycleGuard::enter(&self.state);

        let cycle = self.cycle_count.get() + 1;
        self.cycle_count.set(cycle);
        let before = self.allocated.get();

        log::debug!("GC cycle {} started ({})", cycle, reason);
        self.emit(|| GcEvent::CycleStart {
            cycle,
            allocated_bytes: before,
            object_count: self.object_count(),
            reason: reason.to_string(),
        });

        let mut timer = GcTimer::new();

        let (mark, stack_bytes) = self.mark_phase()?;
        let mark_duration = timer.lap();
        log::debug!(
            "GC cycle {}: {} roots, {} objects marked, {} stack bytes",
            cycle,
            mark.roots_found,
            mark.objects_marked,
            stack_bytes
        );
        self.emit(|| GcEvent::PhaseEnd {
            cycle,
            phase: "mark".to_string(),
            duration_ms: mark_duration.as_secs_f64() * 1000.0,
        });

        self.state.set(GcState::Sweeping);
        let (swept, finalized) = self.sweep_phase();
        let sweep_duration = timer.lap();
        self.emit(|| GcEvent::PhaseEnd {
            cycle,
            phase: "sweep".to_string(),
            duration_ms: sweep_duration.as_secs_f64() * 1000.0,
        });

        let after = self.allocated.get();
        let freed = before.saturating_sub(after);
        debug_assert_eq!(after, self.register.borrow().total_bytes());

        log::info!(
            "GC cycle {} reclaimed {} bytes ({} swept, {} finalized, {} live)",
            cycle,
            freed,
            swept,
            finalized,
            self.object_count()
        );
        self.emit(|| GcEvent::CycleEnd {
            cycle,
            duration_ms: (mark_duration + sweep_duration).as_secs_f64() * 1000.0,
            reclaimed_bytes: freed,
            objects_swept: swept,
            objects_finalized: finalized,
        });

        if self.config.stats_enabled {
            self.stats.borrow_mut().record_cycle(CycleStats {
                cycle,
                roots_found: mark.roots_found,
                objects_marked: mark.objects_marked,
                objects_swept: swept,
                objects_finalized: finalized,
                bytes_freed: freed,
                stack_bytes_scanned: stack_bytes,
                mark_duration,
                sweep_duration,
            });
        }

        Ok(freed)
    }

    /// Mark everything reachable from the live stack
    ///
    /// Returns the marking counters and the number of stack bytes scanned.
    fn mark_phase(&self) -> Result<(MarkStats, usize)> {
        let register = self.register.borrow();
        let bounds = self.bounds;
        let granularity = self.config.scan_granularity;
        let max_scan = self.config.max_stack_scan;

        stack::with_spilled_registers(|sp| {
            if !bounds.contains(sp) {
                return Err(GcError::StackBounds(format!(
                    "stack pointer {:#x} outside recorded stack [{:#x}, {:#x})",
                    sp, bounds.limit, bounds.base
                )));
            }

            let stack_bytes = bounds.base - sp;
            if stack_bytes > max_scan {
                log::warn!(
                    "Stack range too large: {:#x} bytes (max_stack_scan {:#x})",
                    stack_bytes,
                    max_scan
                );
                return Err(GcError::StackBounds(format!(
                    "{} bytes of stack in use exceeds max_stack_scan ({})",
                    stack_bytes, max_scan
                )));
            }

            let mut marker = Marker::new(&register, granularity);
            // SAFETY: [sp, base) is the live part of this thread's stack.
            unsafe {
                marker.scan_roots(sp, bounds.base);
            }
            marker.trace();

            Ok((marker.finish(), stack_bytes))
        })
    }

    /// Release every unmarked object and unmark the survivors
    ///
    /// Returns `(swept, finalized)`.
    fn sweep_phase(&self) -> (usize, usize) {
        let doomed = {
            let mut register = self.register.borrow_mut();
            let doomed = register.remove_if(|holder| !holder.is_marked());
            register.for_each(|holder| holder.unmark());
            doomed
        };

        self.release(doomed)
    }

    /// Subtract and destroy detached holders, returning `(released, finalized)`
    fn release(&self, mut holders: Vec<Box<dyn TrackedObject>>) -> (usize, usize) {
        let bytes: usize = holders.iter().map(|holder| holder.object_size()).sum();
        self.allocated.set(self.allocated.get() - bytes);

        let mut finalized = 0;
        for holder in holders.iter_mut() {
            log::trace!(
                "Releasing {} at {:#x}",
                holder.type_name(),
                holder.object_address()
            );
            if holder.destroy_object() {
                finalized += 1;
            }
        }

        (holders.len(), finalized)
    }

    /// Release every tracked object regardless of reachability
    ///
    /// Objects allocated by finalizers while tearing down are released too,
    /// for up to 64 rounds. Finalizers that still allocate after that leave
    /// their objects tracked: a warning is logged, the `Teardown` event
    /// reports them as `remaining`, and `allocated_memory()` stays non-zero.
    /// Returns the number of objects released.
    pub fn clear(&self) -> usize {
        let mut released = 0;
        let mut finalized = 0;
        let mut bytes = 0;

        for _ in 0..MAX_TEARDOWN_ROUNDS {
            let detached = self.register.borrow_mut().clear();
            if detached.is_empty() {
                break;
            }
            bytes += detached.iter().map(|holder| holder.object_size()).sum::<usize>();

            let (count, done) = self.release(detached);
            released += count;
            finalized += done;
        }

        let remaining = self.object_count();
        if remaining > 0 {
            log::warn!(
                "Teardown stopped after {} rounds with {} objects ({} bytes) still tracked",
                MAX_TEARDOWN_ROUNDS,
                remaining,
                self.allocated.get()
            );
        }

        if released > 0 {
            log::debug!(
                "Teardown released {} objects ({} bytes, {} finalized)",
                released,
                bytes,
                finalized
            );
            self.emit(|| GcEvent::Teardown {
                objects: released,
                bytes,
                finalized,
                remaining,
            });
        }

        released
    }

    /// Bytes currently tracked
    pub fn allocated_memory(&self) -> usize {
        self.allocated.get()
    }

    /// Advisory collection threshold in bytes
    pub fn memory_limit(&self) -> usize {
        self.memory_limit.get()
    }

    /// Double the advisory threshold, capped at `max_memory_limit`
    ///
    /// Returns the new limit.
    pub fn bump_memory_limit(&self) -> usize {
        let old_limit = self.memory_limit.get();
        let new_limit = old_limit
            .saturating_mul(2)
            .min(self.config.max_memory_limit);

        if new_limit != old_limit {
            self.memory_limit.set(new_limit);
            log::info!("Memory limit raised from {} to {} bytes", old_limit, new_limit);
            self.emit(|| GcEvent::LimitBumped {
                old_limit,
                new_limit,
            });
        }

        new_limit
    }

    /// Check if allocated bytes exceed the advisory threshold
    pub fn is_collection_needed(&self) -> bool {
        self.allocated.get() > self.memory_limit.get()
    }

    /// Collect when the advisory threshold is exceeded
    ///
    /// After collecting, the limit is bumped if less than half of the
    /// overshoot was reclaimed. Returns `None` when no cycle ran.
    pub fn collect_if_needed(&self) -> Result<Option<usize>> {
        if !self.is_collection_needed() {
            return Ok(None);
        }

        let allocated = self.allocated.get();
        let limit = self.memory_limit.get();
        let overshoot = allocated - limit;

        let freed = self.collect_with_reason(GcReason::MemoryLimit { allocated, limit })?;
        if freed < overshoot / 2 {
            self.bump_memory_limit();
        }

        Ok(Some(freed))
    }

    /// Number of tracked objects
    pub fn object_count(&self) -> usize {
        self.register.borrow().len()
    }

    /// Check if the manager still holds a hook on `handle`'s object
    pub fn is_tracked<T>(&self, handle: &Gc<T>) -> bool {
        self.register.borrow().is_registered(Gc::address(handle))
    }

    /// Mark bit of a tracked object, `None` if untracked
    pub fn is_marked<T>(&self, handle: &Gc<T>) -> Option<bool> {
        self.register
            .borrow()
            .lookup(Gc::address(handle))
            .map(|holder| holder.is_marked())
    }

    /// Accounted size of a tracked object, `None` if untracked
    pub fn object_size<T>(&self, handle: &Gc<T>) -> Option<usize> {
        self.register
            .borrow()
            .lookup(Gc::address(handle))
            .map(|holder| holder.object_size())
    }

    pub fn state(&self) -> GcState {
        self.state.get()
    }

    pub fn is_collecting(&self) -> bool {
        self.state.get() != GcState::Idle
    }

    /// Cycles started on this manager
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count.get()
    }

    pub fn config(&self) -> &GcConfig {
        &self.config
    }

    /// Stack range recorded when the manager was created
    pub fn stack_bounds(&self) -> StackBounds {
        self.bounds
    }

    /// Summary of all recorded cycles
    pub fn stats(&self) -> GcSummary {
        self.stats.borrow().summary()
    }

    /// Record of the most recent cycle
    pub fn last_cycle(&self) -> Option<CycleStats> {
        self.stats.borrow().last_cycle().cloned()
    }

    fn emit<F>(&self, event: F)
    where
        F: FnOnce() -> GcEvent,
    {
        if self.config.verbose {
            logging::log_event(event());
        }
    }
}

impl Drop for GcManager {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for GcManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcManager")
            .field("state", &self.state.get())
            .field("objects", &self.register.borrow().len())
            .field("allocated", &self.allocated.get())
            .field("memory_limit", &self.memory_limit.get())
            .field("cycles", &self.cycle_count.get())
            .finish()
    }
}

/// Returns the manager to `Idle` when a cycle ends, including by unwinding
/// out of a panicking finalizer
struct CycleGuard<'a> {
    state: &'a Cell<GcState>,
}

impl<'a> CycleGuard<'a> {
    fn enter(state: &'a Cell<GcState>) -> Self {
        state.set(GcState::Marking);
        Self { state }
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.state.set(GcState::Idle);
    }
}
