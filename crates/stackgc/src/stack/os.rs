//! OS-specific thread stack range queries
//!
//! Every variant returns `(low, high)` with `high` exclusive.

use crate::error::{GcError, Result};

#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn thread_stack_range() -> Result<(usize, usize)> {
    unsafe {
        let mut attr: libc::pthread_attr_t = std::mem::zeroed();
        let rc = libc::pthread_getattr_np(libc::pthread_self(), &mut attr);
        if rc != 0 {
            return Err(GcError::StackBounds(format!(
                "pthread_getattr_np failed with code {}",
                rc
            )));
        }

        let mut addr: *mut libc::c_void = std::ptr::null_mut();
        let mut size: libc::size_t = 0;
        let rc = libc::pthread_attr_getstack(&attr, &mut addr, &mut size);
        libc::pthread_attr_destroy(&mut attr);

        if rc != 0 {
            return Err(GcError::StackBounds(format!(
                "pthread_attr_getstack failed with code {}",
                rc
            )));
        }

        let low = addr as usize;
        Ok((low, low + size))
    }
}

#[cfg(target_os = "freebsd")]
pub fn thread_stack_range() -> Result<(usize, usize)> {
    unsafe {
        let mut attr: libc::pthread_attr_t = std::mem::zeroed();
        let rc = libc::pthread_attr_init(&mut attr);
        if rc != 0 {
            return Err(GcError::StackBounds(format!(
                "pthread_attr_init failed with code {}",
                rc
            )));
        }

        let rc = libc::pthread_attr_get_np(libc::pthread_self(), &mut attr);
        if rc != 0 {
            libc::pthread_attr_destroy(&mut attr);
            return Err(GcError::StackBounds(format!(
                "pthread_attr_get_np failed with code {}",
                rc
            )));
        }

        let mut addr: *mut libc::c_void = std::ptr::null_mut();
        let mut size: libc::size_t = 0;
        let rc = libc::pthread_attr_getstack(&attr, &mut addr, &mut size);
        libc::pthread_attr_destroy(&mut attr);

        if rc != 0 {
            return Err(GcError::StackBounds(format!(
                "pthread_attr_getstack failed with code {}",
                rc
            )));
        }

        let low = addr as usize;
        Ok((low, low + size))
    }
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
pub fn thread_stack_range() -> Result<(usize, usize)> {
    unsafe {
        let thread = libc::pthread_self();
        // Returns the high end of the stack.
        let high = libc::pthread_get_stackaddr_np(thread) as usize;
        let size = libc::pthread_get_stacksize_np(thread);

        if high == 0 || size == 0 {
            return Err(GcError::StackBounds(
                "pthread_get_stackaddr_np returned an empty stack".to_string(),
            ));
        }

        Ok((high - size, high))
    }
}

#[cfg(windows)]
pub fn thread_stack_range() -> Result<(usize, usize)> {
    use windows_sys::Win32::System::Threading::GetCurrentThreadStackLimits;

    let mut low: usize = 0;
    let mut high: usize = 0;
    unsafe {
        GetCurrentThreadStackLimits(&mut low, &mut high);
    }

    if low == 0 || high == 0 {
        return Err(GcError::StackBounds(
            "GetCurrentThreadStackLimits returned an empty stack".to_string(),
        ));
    }

    Ok((low, high))
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "macos",
    target_os = "ios",
    windows
)))]
pub fn thread_stack_range() -> Result<(usize, usize)> {
    Err(GcError::StackBounds(format!(
        "no thread stack introspection for {}-{}",
        std::env::consts::OS,
        std::env::consts::ARCH
    )))
}
