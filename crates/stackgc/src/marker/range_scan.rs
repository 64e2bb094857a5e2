//! Range Scanning - Conservative Candidate Discovery
//!
//! Walks a memory range and reads a machine word at every candidate offset.
//! Nothing about the range's contents is known; each value read is merely a
//! number that might equal a tracked address.
//!
//! ## Granularity
//!
//! | Mode | Candidate offsets | Reads per 4KB (64-bit) |
//! |------|-------------------|------------------------|
//! | `Word` | `align_up(start, WORD)`, then every `WORD` bytes | 512 |
//! | `Byte` | every byte with a full word before `end` | 4089 |
//!
//! `Byte` also finds addresses stored at misaligned offsets (packed structs,
//! byte buffers), which `Word` skips.

use crate::config::ScanGranularity;
use crate::util::constants::WORD_SIZE;
use crate::util::Alignment;

/// Number of candidate reads over a range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeScan {
    /// Words read
    pub reads: usize,
}

/// Read every candidate word in `[start, end)` and pass it to `on_candidate`
///
/// Only reads that fit entirely inside the range are made. An empty or
/// inverted range reads nothing.
///
/// # Safety
///
/// `[start, end)` must be readable memory for the whole call: the live part
/// of the current thread's stack, or the box of an object that is kept alive
/// while it is being scanned.
pub unsafe fn scan_range<F>(
    start: usize,
    end: usize,
    granularity: ScanGranularity,
    mut on_candidate: F,
) -> RangeScan
where
    F: FnMut(usize),
{
    let mut scan = RangeScan::default();
    if start >= end {
        return scan;
    }

    let mut addr = match granularity {
        ScanGranularity::Word => Alignment::align_up(start, Alignment::WORD),
        ScanGranularity::Byte => start,
    };
    let step = granularity.step();

    while let Some(read_end) = addr.checked_add(WORD_SIZE) {
        if read_end > end {
            break;
        }

        let value = match granularity {
            ScanGranularity::Word => (addr as *const usize).read_volatile(),
            ScanGranularity::Byte => {
                usize::from_ne_bytes((addr as *const [u8; WORD_SIZE]).read_volatile())
            }
        };
        scan.reads += 1;
        on_candidate(value);

        addr += step;
    }

    scan
}
