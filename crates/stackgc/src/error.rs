//! Error Module - stackgc Error Types
//!
//! Defines all error types used by the collector.
//!
//! # Error Categories
//!
//! ## Platform Errors
//! - `StackBounds` - The calling thread's stack range could not be resolved
//!
//! ## Collector Errors
//! - `ReentrantCollection` - A cycle was requested while one is running
//! - `DuplicateAddress` - The register already tracks an address
//! - `InvalidState` - Internal state machine violation
//!
//! ## Configuration Errors
//! - `Configuration` - Invalid configuration

use thiserror::Error;

/// Main error type for all collector operations
///
/// # Examples
///
/// ```rust
/// use stackgc::GcError;
///
/// fn handle_error(err: GcError) {
///     match err {
///         GcError::StackBounds(reason) => {
///             eprintln!("cannot scan this thread: {}", reason);
///         }
///         _ => {
///             eprintln!("Other error: {}", err);
///         }
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum GcError {
    /// Stack bounds could not be resolved
    ///
    /// **When returned:** The OS thread-introspection call failed, the
    /// platform is unsupported, or the live stack pointer lies outside the
    /// bounds recorded when the manager was built.
    ///
    /// **Recovery strategy:** None. A conservative collector has no safe
    /// degraded mode without accurate bounds.
    #[error("Stack bounds unavailable: {0}")]
    StackBounds(String),

    /// Collection requested while a collection is running
    ///
    /// **When returned:** A finalizer triggered by a sweep called
    /// `garbage_collect` on the same manager.
    ///
    /// **Recovery strategy:** Collect again after the outer cycle returns.
    #[error("Garbage collection is already running on this thread")]
    ReentrantCollection,

    /// Address already registered
    ///
    /// **When returned:** Two holders claim the same object address.
    ///
    /// **Recovery strategy:** Cannot recover - this is a bug
    #[error("Address {address:#x} is already registered")]
    DuplicateAddress { address: usize },

    /// Configuration error
    ///
    /// **When returned:** `GcConfig::validate` rejected the configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid state
    ///
    /// **When returned:** Internal state machine violation
    ///
    /// **Recovery strategy:** Cannot recover - indicates bug
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },
}

impl GcError {
    /// Check if this error leaves the manager unusable on this thread
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GcError::StackBounds(_) | GcError::Configuration(_)
        )
    }

    /// Check if this error indicates a bug in the code
    pub fn is_bug(&self) -> bool {
        matches!(
            self,
            GcError::InvalidState { .. } | GcError::DuplicateAddress { .. }
        )
    }
}

impl From<crate::config::ConfigError> for GcError {
    fn from(err: crate::config::ConfigError) -> Self {
        GcError::Configuration(err.to_string())
    }
}

/// Result type alias for collector operations
pub type Result<T> = std::result::Result<T, GcError>;
