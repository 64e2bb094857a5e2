//! Gc Handle - Reference-Counted Owning Pointer
//!
//! `Gc<T>` is the shared handle returned by the allocator. It is a single
//! word that points at the start of a heap box holding a reference count and
//! the value, so the bits a scanner reads out of a stack slot or an object
//! field are exactly the address the register tracks.
//!
//! ```text
//! Gc<T> ──► ┌──────────────┐  <- tracked address
//!           │ strong count │
//!           ├──────────────┤
//!           │   value: T   │
//!           └──────────────┘  <- address + footprint
//! ```
//!
//! Counting is non-atomic; a `Gc<T>` never leaves the thread that allocated it.

use std::cell::Cell;
use std::fmt;
use std::hash::Hasher;
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::NonNull;

#[repr(C)]
struct GcBox<T> {
    strong: Cell<usize>,
    value: T,
}

/// Shared owning handle to a tracked object
///
/// Cloning bumps the count; dropping the last handle runs `T::drop` (the
/// finalizer) and frees the box. The manager keeps one handle of its own
/// until the object is swept.
#[repr(transparent)]
pub struct Gc<T> {
    ptr: NonNull<GcBox<T>>,
    _marker: PhantomData<GcBox<T>>,
}

impl<T> Gc<T> {
    /// Box a value with a count of one
    pub(crate) fn new(value: T) -> Self {
        let boxed = Box::new(GcBox {
            strong: Cell::new(1),
            value,
        });
        Self {
            ptr: NonNull::from(Box::leak(boxed)),
            _marker: PhantomData,
        }
    }

    fn inner(&self) -> &GcBox<T> {
        // SAFETY: the box stays allocated while any handle exists.
        unsafe { self.ptr.as_ref() }
    }

    /// Address of the heap box, the identity the register tracks
    pub fn address(this: &Self) -> usize {
        this.ptr.as_ptr() as usize
    }

    /// Bytes occupied by the heap box of a `Gc<T>`
    pub fn footprint() -> usize {
        std::mem::size_of::<GcBox<T>>()
    }

    /// Number of live handles, the manager's included
    pub fn strong_count(this: &Self) -> usize {
        this.inner().strong.get()
    }

    /// Check if two handles share one box
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        a.ptr == b.ptr
    }

    /// Address-derived hash, stable for the object's lifetime
    pub fn identity_hash(this: &Self) -> u64 {
        let mut hasher = rustc_hash::FxHasher::default();
        hasher.write_usize(Self::address(this));
        hasher.finish()
    }
}

impl<T> Clone for Gc<T> {
    fn clone(&self) -> Self {
        let strong = &self.inner().strong;
        match strong.get().checked_add(1) {
            Some(count) => strong.set(count),
            None => std::process::abort(),
        }
        Self {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }
}

impl<T> Drop for Gc<T> {
    fn drop(&mut self) {
        let strong = &self.inner().strong;
        let count = strong.get() - 1;
        strong.set(count);

        if count == 0 {
            // SAFETY: last handle; the box came from `Box::leak` in `new`.
            unsafe {
                drop(Box::from_raw(self.ptr.as_ptr()));
            }
        }
    }
}

impl<T> Deref for Gc<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner().value
    }
}

impl<T> AsRef<T> for Gc<T> {
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T: fmt::Debug> fmt::Debug for Gc<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: fmt::Display> fmt::Display for Gc<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

impl<T> fmt::Pointer for Gc<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.ptr, f)
    }
}
