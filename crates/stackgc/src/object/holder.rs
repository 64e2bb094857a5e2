//! Object Holder - Type-Erased Tracking Record
//!
//! The register stores objects of many types side by side. Each one is
//! wrapped in an `ObjectHolder<T>` built at the allocation site, where `T` is
//! still known, and handled afterwards only through `dyn TrackedObject`.

use super::handle::Gc;
use std::cell::Cell;
use std::fmt;

/// Capability set the manager uses on every tracked object
pub trait TrackedObject {
    /// Address of the object's heap box
    fn object_address(&self) -> usize;

    /// Bytes scanned during marking and counted by the manager
    fn object_size(&self) -> usize;

    /// Whether the object was reached in the current cycle
    fn is_marked(&self) -> bool;

    /// Mark as reachable
    fn mark(&self);

    /// Clear the mark bit
    fn unmark(&self);

    /// Release the manager's handle
    ///
    /// Returns `true` if that handle was the last owner, in which case the
    /// object's finalizer has already run when this returns. Later calls do
    /// nothing and return `false`.
    fn destroy_object(&mut self) -> bool;

    /// Type name of the payload, for diagnostics
    fn type_name(&self) -> &'static str;
}

impl fmt::Debug for dyn TrackedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedObject")
            .field("address", &format_args!("{:#x}", self.object_address()))
            .field("size", &self.object_size())
            .field("marked", &self.is_marked())
            .field("type", &self.type_name())
            .finish()
    }
}

/// Holder for one object of type `T`
pub struct ObjectHolder<T: 'static> {
    /// The manager's own handle; `None` once destroyed
    hook: Option<Gc<T>>,
    address: usize,
    size: usize,
    marked: Cell<bool>,
}

impl<T: 'static> ObjectHolder<T> {
    /// Wrap the manager's handle to a freshly allocated object
    pub fn new(hook: Gc<T>) -> Self {
        Self {
            address: Gc::address(&hook),
            size: Gc::<T>::footprint(),
            hook: Some(hook),
            marked: Cell::new(false),
        }
    }

    /// Check if the manager's handle has been released
    pub fn is_destroyed(&self) -> bool {
        self.hook.is_none()
    }
}

impl<T: 'static> TrackedObject for ObjectHolder<T> {
    fn object_address(&self) -> usize {
        self.address
    }

    fn object_size(&self) -> usize {
        self.size
    }

    fn is_marked(&self) -> bool {
        self.marked.get()
    }

    fn mark(&self) {
        self.marked.set(true);
    }

    fn unmark(&self) {
        self.marked.set(false);
    }

    fn destroy_object(&mut self) -> bool {
        match self.hook.take() {
            Some(hook) => {
                let last_owner = Gc::strong_count(&hook) == 1;
                drop(hook);
                last_owner
            }
            None => false,
        }
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}
