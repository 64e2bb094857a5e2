//! Architecture-specific register access

/// Read the current stack pointer
///
/// Always inlined so the value belongs to the caller's frame.
#[cfg(target_arch = "x86_64")]
#[inline(always)]
pub fn current_stack_pointer() -> usize {
    let sp: usize;
    unsafe {
        std::arch::asm!(
            "mov {}, rsp",
            out(reg) sp,
            options(nomem, nostack, preserves_flags)
        );
    }
    sp
}

/// Read the current stack pointer
#[cfg(target_arch = "aarch64")]
#[inline(always)]
pub fn current_stack_pointer() -> usize {
    let sp: usize;
    unsafe {
        std::arch::asm!(
            "mov {}, sp",
            out(reg) sp,
            options(nomem, nostack, preserves_flags)
        );
    }
    sp
}

/// Read the current stack pointer
#[cfg(target_arch = "x86")]
#[inline(always)]
pub fn current_stack_pointer() -> usize {
    let sp: usize;
    unsafe {
        std::arch::asm!(
            "mov {}, esp",
            out(reg) sp,
            options(nomem, nostack, preserves_flags)
        );
    }
    sp
}

/// Read the current stack pointer
#[cfg(target_arch = "riscv64")]
#[inline(always)]
pub fn current_stack_pointer() -> usize {
    let sp: usize;
    unsafe {
        std::arch::asm!(
            "mv {}, sp",
            out(reg) sp,
            options(nomem, nostack, preserves_flags)
        );
    }
    sp
}

/// Approximate the stack pointer with the address of a local
#[cfg(not(any(
    target_arch = "x86_64",
    target_arch = "aarch64",
    target_arch = "x86",
    target_arch = "riscv64"
)))]
#[inline(always)]
pub fn current_stack_pointer() -> usize {
    let marker = 0u8;
    std::hint::black_box(&marker) as *const u8 as usize
}

/// rbx, rbp, r12-r15, plus rsi/rdi which are callee-saved on Windows
#[cfg(target_arch = "x86_64")]
pub const SPILL_SLOTS: usize = 8;

/// x19-x28, frame pointer and link register
#[cfg(target_arch = "aarch64")]
pub const SPILL_SLOTS: usize = 12;

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
pub const SPILL_SLOTS: usize = 1;

/// Store callee-saved registers into `buf`
#[cfg(target_arch = "x86_64")]
#[inline(always)]
pub fn spill_callee_saved(buf: &mut [usize; SPILL_SLOTS]) {
    unsafe {
        std::arch::asm!(
            "mov [{buf}], rbx",
            "mov [{buf} + 8], rbp",
            "mov [{buf} + 16], r12",
            "mov [{buf} + 24], r13",
            "mov [{buf} + 32], r14",
            "mov [{buf} + 40], r15",
            buf = in(reg) buf.as_mut_ptr(),
            options(nostack, preserves_flags)
        );
    }

    // rsi/rdi are callee-saved only on Windows.
    #[cfg(windows)]
    unsafe {
        std::arch::asm!(
            "mov [{buf} + 48], rsi",
            "mov [{buf} + 56], rdi",
            buf = in(reg) buf.as_mut_ptr(),
            options(nostack, preserves_flags)
        );
    }
}

/// Store callee-saved registers into `buf`
#[cfg(target_arch = "aarch64")]
#[inline(always)]
pub fn spill_callee_saved(buf: &mut [usize; SPILL_SLOTS]) {
    unsafe {
        std::arch::asm!(
            "stp x19, x20, [{buf}]",
            "stp x21, x22, [{buf}, #16]",
            "stp x23, x24, [{buf}, #32]",
            "stp x25, x26, [{buf}, #48]",
            "stp x27, x28, [{buf}, #64]",
            "stp x29, x30, [{buf}, #80]",
            buf = in(reg) buf.as_mut_ptr(),
            options(nostack, preserves_flags)
        );
    }
}

/// No explicit spill; the optimizer barrier in the caller is all there is.
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[inline(always)]
pub fn spill_callee_saved(buf: &mut [usize; SPILL_SLOTS]) {
    std::hint::black_box(buf);
}
