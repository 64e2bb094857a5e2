//! Test Support - Deterministic Reclamation
//!
//! Frames above a test (the thread-start frame in particular) can still hold
//! the address of a heap block that was freed before the test began. If the
//! allocator later hands that block to a tracked object, the conservative
//! scan finds a root nobody wrote and the object survives.
//!
//! [`StaleBlocks::reserve`] snapshots the live stack, then allocates small
//! blocks until it has taken every free block whose address appears in the
//! snapshot. Those blocks stay reserved until the guard is dropped, so no
//! tracked object can land on them.

use crate::config::ScanGranularity;
use crate::marker::scan_range;
use crate::stack;
use crate::util::constants::WORD_SIZE;
use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};

/// Largest block size checked for reuse; covers every small object footprint
const MAX_BLOCK_SIZE: usize = 512;

/// Blocks drawn per size, enough to drain the per-thread free caches
const BLOCKS_PER_SIZE: usize = 64;

const MAX_RESERVED: usize = 32;

/// Guard holding heap blocks whose addresses linger on the live stack
///
/// Create it before the first tracked allocation and keep it alive for the
/// whole test.
pub struct StaleBlocks {
    reserved: [Option<(usize, Layout)>; MAX_RESERVED],
    count: usize,
    leaked: usize,
}

impl StaleBlocks {
    /// Reserve every free block of up to 512 bytes that a live stack word
    /// points at
    #[inline(never)]
    pub fn reserve() -> Self {
        let stale = live_stack_words();
        let mut blocks = Self {
            reserved: [None; MAX_RESERVED],
            count: 0,
            leaked: 0,
        };

        // Plain array: a heap buffer here could itself be a stale block.
        let mut drawn = [0usize; BLOCKS_PER_SIZE];

        for size in (WORD_SIZE..=MAX_BLOCK_SIZE).step_by(WORD_SIZE) {
            let layout = match Layout::from_size_align(size, WORD_SIZE) {
                Ok(layout) => layout,
                Err(_) => continue,
            };

            let mut returned = 0;
            for _ in 0..BLOCKS_PER_SIZE {
                // SAFETY: layout has a non-zero size.
                let ptr = unsafe { alloc(layout) };
                if ptr.is_null() {
                    handle_alloc_error(layout);
                }

                let address = ptr as usize;
                if stale.binary_search(&address).is_ok() {
                    blocks.keep(address, layout);
                } else {
                    drawn[returned] = address;
                    returned += 1;
                }
            }

            for &address in &drawn[..returned] {
                // SAFETY: allocated above with the same layout.
                unsafe { dealloc(address as *mut u8, layout) };
            }
        }

        if blocks.count > 0 || blocks.leaked > 0 {
            log::debug!(
                "Reserved {} stale heap blocks ({} leaked)",
                blocks.count,
                blocks.leaked
            );
        }
        blocks
    }

    /// Number of blocks held
    pub fn len(&self) -> usize {
        self.count + self.leaked
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn keep(&mut self, address: usize, layout: Layout) {
        if self.count < MAX_RESERVED {
            self.reserved[self.count] = Some((address, layout));
            self.count += 1;
        } else {
            // Never freed, so it can never be reused either.
            self.leaked += 1;
        }
    }
}

impl Drop for StaleBlocks {
    fn drop(&mut self) {
        for (address, layout) in self.reserved.iter_mut().filter_map(Option::take) {
            // SAFETY: allocated in `reserve` with this layout, freed once.
            unsafe { dealloc(address as *mut u8, layout) };
        }
    }
}

/// Sorted, deduplicated words of `[sp, stack base)`
fn live_stack_words() -> Vec<usize> {
    let base = match stack::stack_bounds() {
        Ok(bounds) => bounds.base,
        Err(_) => return Vec::new(),
    };

    stack::with_spilled_registers(|sp| {
        let mut words = Vec::with_capacity(base.saturating_sub(sp) / WORD_SIZE + 1);
        // SAFETY: [sp, base) is the live part of this thread's stack.
        unsafe {
            scan_range(sp, base, ScanGranularity::Word, |word| words.push(word));
        }
        words.sort_unstable();
        words.dedup();
        words
    })
}
