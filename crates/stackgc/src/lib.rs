//! # stackgc - Conservative Stack-Scanning Collector
//!
//! stackgc layers reclaim-on-demand semantics on top of reference-counted
//! ownership. Every object allocated through a [`GcManager`] is owned by the
//! caller's [`Gc`] handles *and* by one handle the manager keeps for itself.
//! A collection finds the objects the current thread can still reach from
//! its stack and releases the manager's handle on everything else.
//!
//! ## Quick Start
//!
//! ```rust
//! use stackgc::{GcConfig, GcManager};
//!
//! fn main() -> Result<(), stackgc::GcError> {
//!     let manager = GcManager::new(GcConfig::default())?;
//!
//!     let greeting = manager.allocate(String::from("hello"));
//!     assert_eq!(manager.object_count(), 1);
//!
//!     // `greeting` lives on this frame, so it is a root
//!     manager.garbage_collect()?;
//!     assert!(manager.is_tracked(&greeting));
//!
//!     // Release everything, running finalizers of objects nobody else owns
//!     manager.clear();
//!     assert_eq!(manager.allocated_memory(), 0);
//!     Ok(())
//! }
//! ```
//!
//! ## Collection Cycle
//!
//! ```text
//! ┌────────────────────────────── thread stack ─┐
//! │ base ─► caller frames ... garbage_collect   │
//! │         spilled callee-saved registers      │◄── sp
//! └─────────────────────────────────────────────┘
//!          │ every word equal to a tracked address is a root
//!          ▼
//!   ┌────────────┐  inner    ┌────────────┐
//!   │  object A  │─────────► │  object B  │    object C (unreached)
//!   └────────────┘ reference └────────────┘
//!          │
//!          ▼
//!   sweep: release the manager hook on C, unmark A and B
//! ```
//!
//! 1. **Mark**: spill registers, scan `[sp, stack base)`, then scan the box
//!    of every newly marked object for further tracked addresses
//! 2. **Sweep**: detach every unmarked object, release its manager hook
//!    (running `Drop` if that was the last owner), unmark the survivors
//!
//! ## Ownership Rules
//!
//! - The manager only ever drops its *own* reference. An object another
//!   owner still holds (another `Gc`, possibly inside a reference cycle) is
//!   untracked by the sweep but not destroyed.
//! - Scanning is conservative: a stack word that happens to equal a tracked
//!   address keeps that object alive for the cycle.
//! - A manager serves the thread that created it and is neither `Send` nor
//!   `Sync`. [`runtime`] provides one per thread.
//!
//! ## Platform Support
//!
//! | Platform | Stack bounds | Register spill |
//! |----------|--------------|----------------|
//! | Linux / Android | `pthread_getattr_np` | x86_64, aarch64 |
//! | FreeBSD | `pthread_attr_get_np` | x86_64, aarch64 |
//! | macOS / iOS | `pthread_get_stackaddr_np` | x86_64, aarch64 |
//! | Windows | `GetCurrentThreadStackLimits` | x86_64, aarch64 |

pub mod config;
pub mod error;
pub mod logging;
pub mod manager;
pub mod marker;
pub mod object;
pub mod runtime;
pub mod stack;
pub mod stats;
#[doc(hidden)]
pub mod testing;
pub mod util;

pub use config::{ConfigError, GcConfig, ScanGranularity};
pub use error::{GcError, Result};
pub use manager::{GcManager, GcReason, GcState};
pub use object::{Gc, ObjectHolder, ObjectRegister, TrackedObject};
pub use stack::StackBounds;
pub use stats::{CycleStats, GcSummary};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
