//! Stack Inspector - Thread Stack Introspection
//!
//! Provides the root-set boundary for conservative scanning:
//!
//! 1. **Stack pointer** - read straight from the CPU register with inline assembly
//! 2. **Stack bounds** - the calling thread's stack range from the OS
//! 3. **Register spilling** - callee-saved registers stored into the current frame
//!    so pointers that live only in registers become visible to a memory scan
//!
//! ## Platform Support
//!
//! | Platform | Bounds source |
//! |----------|---------------|
//! | Linux / Android | `pthread_getattr_np` + `pthread_attr_getstack` |
//! | FreeBSD | `pthread_attr_get_np` + `pthread_attr_getstack` |
//! | macOS / iOS | `pthread_get_stackaddr_np` + `pthread_get_stacksize_np` |
//! | Windows | `GetCurrentThreadStackLimits` |
//!
//! Any other platform reports [`GcError::StackBounds`]. There is no fallback:
//! guessing the range either misses roots or reads unmapped memory.
//!
//! The stack is assumed to grow downward on every supported target, so the
//! live region is `[current, base)`.

mod arch;
mod os;

use crate::error::{GcError, Result};

pub use arch::current_stack_pointer;

/// Stack range of the calling thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackBounds {
    /// Highest address of the stack (exclusive), where it starts growing from
    pub base: usize,
    /// Lowest address the stack may grow to
    pub limit: usize,
    /// Stack pointer at the time the bounds were queried
    pub current: usize,
}

impl StackBounds {
    /// Total reserved stack size in bytes
    pub fn size(&self) -> usize {
        self.base - self.limit
    }

    /// Bytes currently in use between `current` and `base`
    pub fn used(&self) -> usize {
        self.base.saturating_sub(self.current)
    }

    /// Check if an address lies inside the reserved stack range
    pub fn contains(&self, address: usize) -> bool {
        address >= self.limit && address < self.base
    }
}

/// Query the calling thread's stack range
///
/// # Errors
/// Returns [`GcError::StackBounds`] when the platform is unsupported, the OS
/// call fails, or the live stack pointer is not inside the reported range.
///
/// # Examples
///
/// ```rust
/// let bounds = stackgc::stack::stack_bounds()?;
/// let local = 0u64;
/// assert!(bounds.contains(&local as *const u64 as usize));
/// # Ok::<(), stackgc::GcError>(())
/// ```
pub fn stack_bounds() -> Result<StackBounds> {
    let (limit, base) = os::thread_stack_range()?;
    let current = current_stack_pointer();

    if limit >= base {
        return Err(GcError::StackBounds(format!(
            "empty stack range [{:#x}, {:#x})",
            limit, base
        )));
    }

    let bounds = StackBounds {
        base,
        limit,
        current,
    };

    if !bounds.contains(current) {
        return Err(GcError::StackBounds(format!(
            "stack pointer {:#x} outside thread stack [{:#x}, {:#x})",
            current, limit, base
        )));
    }

    log::trace!(
        "Thread stack [{:#x}, {:#x}), sp {:#x}, {} bytes in use",
        limit,
        base,
        current,
        bounds.used()
    );

    Ok(bounds)
}

/// Run `f` with every callee-saved register stored in this frame
///
/// `f` receives the stack pointer of the spilling frame. Every pointer that
/// lived only in a register when this function was called is stored at an
/// address `>= sp`, so scanning `[sp, base)` covers it. Caller-saved
/// registers are spilled by the calling convention itself.
#[inline(never)]
pub fn with_spilled_registers<R>(f: impl FnOnce(usize) -> R) -> R {
    let mut registers = [0usize; arch::SPILL_SLOTS];
    arch::spill_callee_saved(&mut registers);
    std::hint::black_box(&mut registers);

    let sp = current_stack_pointer();
    let result = f(sp);

    // Keep the buffer live until the scan is over.
    std::hint::black_box(&registers);
    result
}

const CLEAR_CHUNK_WORDS: usize = 128;
const CLEAR_CHUNK_BYTES: usize = CLEAR_CHUNK_WORDS * std::mem::size_of::<usize>();

/// Zero roughly `bytes` of dead stack below the caller
///
/// Returned frames keep their old contents, so a handle that was dropped in
/// a callee can still look like a root to a later scan. Calling this before
/// collecting overwrites those slots. Zero bytes is a no-op.
pub fn clear_dead_stack(bytes: usize) {
    if bytes > 0 {
        clear_chunks(bytes);
    }
}

#[inline(never)]
fn clear_chunks(bytes: usize) {
    let mut chunk = [0usize; CLEAR_CHUNK_WORDS];
    std::hint::black_box(&mut chunk);

    if bytes > CLEAR_CHUNK_BYTES {
        clear_chunks(bytes - CLEAR_CHUNK_BYTES);
    }

    std::hint::black_box(&chunk);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_contain_locals() {
        let bounds = stack_bounds().expect("stack bounds on a supported platform");
        let local = 0xdead_beefusize;
        let addr = std::hint::black_box(&local) as *const usize as usize;

        assert!(bounds.contains(addr));
        assert!(bounds.current <= addr);
        assert!(bounds.used() > 0);
        assert!(bounds.size() >= bounds.used());
    }

    #[test]
    fn test_stack_pointer_is_below_locals() {
        let local = 7u32;
        let addr = std::hint::black_box(&local) as *const u32 as usize;
        let sp = current_stack_pointer();
        assert!(sp <= addr, "sp {:#x} above local {:#x}", sp, addr);
    }

    #[test]
    fn test_spilled_frame_is_below_caller() {
        let local = 1u64;
        let addr = std::hint::black_box(&local) as *const u64 as usize;
        let sp = with_spilled_registers(|sp| sp);
        assert!(sp < addr);
    }

    #[test]
    fn test_bounds_in_spawned_thread() {
        let handle = std::thread::Builder::new()
            .stack_size(256 * 1024)
            .spawn(|| stack_bounds().map(|b| b.size()))
            .unwrap();
        let size = handle.join().unwrap().unwrap();
        assert!(size >= 128 * 1024, "reported stack size {} too small", size);
    }

    #[test]
    fn test_clear_dead_stack_runs() {
        clear_dead_stack(16 * 1024);
        clear_dead_stack(0);
    }
}
