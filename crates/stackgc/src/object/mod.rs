//! Object Module - Tracked Object Bookkeeping
//!
//! - [`Gc`] - the shared handle clients hold
//! - [`ObjectHolder`] / [`TrackedObject`] - per-object record behind a
//!   type-erased interface
//! - [`ObjectRegister`] - address to holder map used by mark and sweep

pub mod handle;
pub mod holder;
pub mod register;

pub use handle::Gc;
pub use holder::{ObjectHolder, TrackedObject};
pub use register::ObjectRegister;
