//! Marker Module - Conservative Marking
//!
//! Computes the set of tracked objects reachable from a root range.
//!
//! Marking Algorithm:
//! 1. **Root scan** - every candidate word in the root range (the live stack)
//!    that equals a registered address is queued
//! 2. **Trace** - pop an address; if its object is unmarked, mark it and scan
//!    the object's whole box the same way, queuing inner references
//! 3. Repeat until the queue is empty
//!
//! Membership is an exact-start test against the register, so a value that
//! points into the middle of an object never keeps it alive.

pub mod mark_queue;
pub mod range_scan;

pub use mark_queue::{MarkQueue, MarkQueueStats};
pub use range_scan::{scan_range, RangeScan};

use crate::config::ScanGranularity;
use crate::object::ObjectRegister;

/// Counters for one marking pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkStats {
    /// Root-range words that matched a registered address
    pub roots_found: usize,
    /// Objects that went from unmarked to marked
    pub objects_marked: usize,
    /// Object-range words that matched a registered address
    pub inner_references: usize,
    /// Words read from the root range
    pub root_words_scanned: usize,
    /// Words read from object boxes
    pub object_words_scanned: usize,
}

/// Marker - one marking pass over a register
pub struct Marker<'r> {
    register: &'r ObjectRegister,
    queue: MarkQueue,
    granularity: ScanGranularity,
    stats: MarkStats,
}

impl<'r> Marker<'r> {
    pub fn new(register: &'r ObjectRegister, granularity: ScanGranularity) -> Self {
        Self {
            register,
            queue: MarkQueue::with_capacity(64),
            granularity,
            stats: MarkStats::default(),
        }
    }

    /// Queue every registered address found in `[start, end)`
    ///
    /// # Safety
    ///
    /// The range must stay readable for the duration of the call.
    pub unsafe fn scan_roots(&mut self, start: usize, end: usize) {
        let register = self.register;
        let queue = &mut self.queue;
        let mut roots = 0;

        let scan = scan_range(start, end, self.granularity, |candidate| {
            if register.is_registered(candidate) {
                log::trace!("Root {:#x}", candidate);
                queue.push(candidate);
                roots += 1;
            }
        });

        self.stats.roots_found += roots;
        self.stats.root_words_scanned += scan.reads;
    }

    /// Mark everything reachable from the queued roots
    pub fn trace(&mut self) {
        let register = self.register;

        while let Some(address) = self.queue.pop() {
            let holder = match register.lookup(address) {
                Some(holder) => holder,
                None => continue,
            };
            if holder.is_marked() {
                continue;
            }

            holder.mark();
            self.stats.objects_marked += 1;

            let start = holder.object_address();
            let end = start + holder.object_size();
            let queue = &mut self.queue;
            let mut inner = 0;

            // SAFETY: the register holds a handle to every tracked object,
            // so the box stays allocated while it is scanned.
            let scan = unsafe {
                scan_range(start, end, self.granularity, |candidate| {
                    if let Some(target) = register.lookup(candidate) {
                        if !target.is_marked() {
                            log::trace!("Inner reference {:#x} -> {:#x}", start, candidate);
                            queue.push(candidate);
                        }
                        inner += 1;
                    }
                })
            };

            self.stats.inner_references += inner;
            self.stats.object_words_scanned += scan.reads;
        }
    }

    /// Finish the pass and return its counters
    pub fn finish(self) -> MarkStats {
        debug_assert!(self.queue.is_empty(), "marking finished with pending work");
        let queue = self.queue.stats();
        log::trace!(
            "Mark queue: {} enqueued, {} processed, peak {}",
            queue.enqueued,
            queue.processed,
            queue.peak_len
        );
        self.stats
    }
}
