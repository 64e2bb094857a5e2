//! Object Register - Address to Holder Mapping
//!
//! The register answers the one question conservative marking keeps asking:
//! "is this word the address of an object I track?". Keys are exact box
//! addresses, so a hit is never a pointer into the middle of an object.
//!
//! Removal hands holders back to the caller instead of destroying them in
//! place. Destruction runs finalizers, finalizers may allocate, and
//! allocation needs the register, so the caller destroys only after its
//! borrow of the register has ended.

use super::holder::TrackedObject;
use crate::error::{GcError, Result};
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

type HolderMap = IndexMap<usize, Box<dyn TrackedObject>, FxBuildHasher>;

/// ObjectRegister - every object the manager currently owns a handle to
///
/// Iteration follows insertion order.
pub struct ObjectRegister {
    objects: HolderMap,
    total_bytes: usize,
}

impl ObjectRegister {
    /// Create an empty register
    pub fn new() -> Self {
        Self {
            objects: HolderMap::default(),
            total_bytes: 0,
        }
    }

    /// Register a new holder
    ///
    /// # Errors
    /// Returns `DuplicateAddress` if the address is already tracked; the
    /// register is left unchanged.
    pub fn insert(&mut self, holder: Box<dyn TrackedObject>) -> Result<()> {
        let address = holder.object_address();
        if self.objects.contains_key(&address) {
            return Err(GcError::DuplicateAddress { address });
        }

        self.total_bytes += holder.object_size();
        self.objects.insert(address, holder);
        Ok(())
    }

    /// Check if `address` is the start of a tracked object
    #[inline]
    pub fn is_registered(&self, address: usize) -> bool {
        self.objects.contains_key(&address)
    }

    /// Find the holder for `address`
    pub fn lookup(&self, address: usize) -> Option<&dyn TrackedObject> {
        self.objects.get(&address).map(|holder| holder.as_ref())
    }

    /// Visit every holder
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&dyn TrackedObject),
    {
        for holder in self.objects.values() {
            visitor(holder.as_ref());
        }
    }

    /// Detach every holder matching `predicate`
    ///
    /// The predicate sees each holder exactly once. Detached holders are
    /// returned in register order and must be destroyed by the caller.
    pub fn remove_if<F>(&mut self, mut predicate: F) -> Vec<Box<dyn TrackedObject>>
    where
        F: FnMut(&dyn TrackedObject) -> bool,
    {
        let mut removed = Vec::new();
        let mut kept = HolderMap::with_capacity_and_hasher(self.objects.len(), FxBuildHasher);

        for (address, holder) in self.objects.drain(..) {
            if predicate(holder.as_ref()) {
                self.total_bytes -= holder.object_size();
                removed.push(holder);
            } else {
                kept.insert(address, holder);
            }
        }

        self.objects = kept;
        removed
    }

    /// Detach every holder regardless of state
    pub fn clear(&mut self) -> Vec<Box<dyn TrackedObject>> {
        self.total_bytes = 0;
        self.objects.drain(..).map(|(_, holder)| holder).collect()
    }

    /// Number of tracked objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Sum of `object_size` over all tracked objects
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }
}

impl Default for ObjectRegister {
    fn default() -> Self {
        Self::new()
    }
}
