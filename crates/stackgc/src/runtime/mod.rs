//! Runtime Module - Per-Thread Manager
//!
//! Every thread gets its own [`GcManager`], built on first use from
//! [`GcConfig::from_env`] (or from the config passed to [`init`]). Nothing is
//! shared between threads, so none of this locks.
//!
//! The thread's manager is torn down with the thread: its `Drop` releases
//! every object still tracked. Finalizers running at that point can no longer
//! reach the runtime and get `GcError::InvalidState` back.

use crate::config::GcConfig;
use crate::error::{GcError, Result};
use crate::manager::GcManager;
use crate::object::Gc;
use std::cell::OnceCell;

thread_local! {
    static MANAGER: OnceCell<GcManager> = const { OnceCell::new() };
}

fn unavailable() -> GcError {
    GcError::InvalidState {
        expected: "live thread runtime".to_string(),
        actual: "thread-local storage destroyed".to_string(),
    }
}

/// Build this thread's manager with `config`
///
/// # Errors
/// - `InvalidState` if the manager already exists
/// - whatever `GcManager::new` reports
pub fn init(config: GcConfig) -> Result<()> {
    MANAGER
        .try_with(|cell| {
            if cell.get().is_some() {
                return Err(GcError::InvalidState {
                    expected: "uninitialized thread runtime".to_string(),
                    actual: "already initialized".to_string(),
                });
            }
            let manager = GcManager::new(config)?;
            log::debug!("Thread runtime initialized");
            cell.set(manager).map_err(|_| GcError::InvalidState {
                expected: "uninitialized thread runtime".to_string(),
                actual: "initialized during construction".to_string(),
            })
        })
        .map_err(|_| unavailable())?
}

/// Check if this thread's manager has been built
pub fn is_initialized() -> bool {
    MANAGER
        .try_with(|cell| cell.get().is_some())
        .unwrap_or(false)
}

/// Run `f` with this thread's manager, building it if needed
pub fn with_manager<R, F>(f: F) -> Result<R>
where
    F: FnOnce(&GcManager) -> R,
{
    MANAGER
        .try_with(|cell| {
            if cell.get().is_none() {
                let manager = GcManager::new(GcConfig::from_env())?;
                // A failed set means a nested call got there first; keep theirs.
                let _ = cell.set(manager);
            }
            cell.get().map(f).ok_or_else(unavailable)
        })
        .map_err(|_| unavailable())?
}

/// Allocate through this thread's manager
pub fn allocate<T: 'static>(value: T) -> Result<Gc<T>> {
    with_manager(|manager| manager.allocate(value))
}

/// Collect on this thread's manager
pub fn collect() -> Result<usize> {
    with_manager(|manager| manager.garbage_collect())?
}

/// Collect on this thread's manager if its advisory limit is exceeded
pub fn collect_if_needed() -> Result<Option<usize>> {
    with_manager(|manager| manager.collect_if_needed())?
}

/// Bytes tracked by this thread's manager
pub fn allocated_memory() -> Result<usize> {
    with_manager(|manager| manager.allocated_memory())
}

/// Release everything tracked by this thread's manager
pub fn clear() -> Result<usize> {
    with_manager(|manager| manager.clear())
}
