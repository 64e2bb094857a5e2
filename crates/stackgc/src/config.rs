//! Configuration Module - Collector Tuning Parameters
//!
//! Manages the configuration parameters of a [`GcManager`](crate::GcManager).
//! The memory limit only drives the advisory `is_collection_needed` signal;
//! the manager never decides on its own when to collect.

use crate::util::constants::{GB, KB, MB};
use serde::{Deserialize, Serialize};

/// Step size used when scanning a memory range for candidate addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanGranularity {
    /// Read one machine word at every word-aligned offset
    Word,
    /// Read one (unaligned) machine word at every byte offset
    ///
    /// Finds addresses stored at misaligned offsets at roughly
    /// `size_of::<usize>()` times the cost of `Word`.
    Byte,
}

impl ScanGranularity {
    /// Distance between two consecutive candidate reads
    pub fn step(self) -> usize {
        match self {
            ScanGranularity::Word => std::mem::size_of::<usize>(),
            ScanGranularity::Byte => 1,
        }
    }
}

impl Default for ScanGranularity {
    fn default() -> Self {
        ScanGranularity::Word
    }
}

impl std::str::FromStr for ScanGranularity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "word" => Ok(ScanGranularity::Word),
            "byte" => Ok(ScanGranularity::Byte),
            other => Err(ConfigError::InvalidGranularity(other.to_string())),
        }
    }
}

/// Main configuration for the collector
///
/// # Examples
///
/// ```rust
/// use stackgc::{GcConfig, ScanGranularity};
///
/// // Use default configuration
/// let config = GcConfig::default();
///
/// // Replicate byte-stepping scans with a small initial limit
/// let config = GcConfig {
///     initial_memory_limit: 64 * 1024,
///     scan_granularity: ScanGranularity::Byte,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GcConfig {
    /// Allocated-byte threshold above which a collection is advised
    ///
    /// Default: 1MB
    pub initial_memory_limit: usize,

    /// Upper bound for `bump_memory_limit`
    ///
    /// Default: 1GB
    pub max_memory_limit: usize,

    /// Scan step for stack and object ranges
    ///
    /// Default: `ScanGranularity::Word`
    pub scan_granularity: ScanGranularity,

    /// Largest stack range a single collection will scan
    ///
    /// Default: 64MB
    pub max_stack_scan: usize,

    /// Dead stack zeroed below the collector before each scan
    ///
    /// Clears handle copies left behind in returned frames so they do not
    /// act as roots. Zero disables clearing.
    ///
    /// Default: 16KB
    pub clear_stack_bytes: usize,

    /// Emit structured `GcEvent`s to the global logger
    ///
    /// Default: false
    pub verbose: bool,

    /// Keep per-cycle statistics
    ///
    /// Default: true
    pub stats_enabled: bool,
}

impl Default for GcConfig {
    fn default() -> Self {
        GcConfig {
            initial_memory_limit: MB,
            max_memory_limit: GB,
            scan_granularity: ScanGranularity::Word,
            max_stack_scan: 64 * MB,
            clear_stack_bytes: 16 * KB,
            verbose: false,
            stats_enabled: true,
        }
    }
}

impl GcConfig {
    /// Validate configuration
    ///
    /// ```rust
    /// use stackgc::GcConfig;
    ///
    /// let config = GcConfig {
    ///     initial_memory_limit: 0,
    ///     ..Default::default()
    /// };
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_memory_limit == 0 {
            return Err(ConfigError::InvalidMemoryLimit(
                "initial_memory_limit must be > 0".to_string(),
            ));
        }

        if self.initial_memory_limit > self.max_memory_limit {
            return Err(ConfigError::InvalidMemoryLimit(
                "initial_memory_limit cannot exceed max_memory_limit".to_string(),
            ));
        }

        if self.max_stack_scan < KB {
            return Err(ConfigError::InvalidStackScan(
                "max_stack_scan must be at least 1KB".to_string(),
            ));
        }

        if self.clear_stack_bytes > MB {
            return Err(ConfigError::InvalidStackScan(
                "clear_stack_bytes cannot exceed 1MB".to_string(),
            ));
        }

        Ok(())
    }

    /// Build configuration from environment variables
    ///
    /// Overrides defaults with:
    /// - STACKGC_LIMIT
    /// - STACKGC_MAX_LIMIT
    /// - STACKGC_SCAN (`word` or `byte`)
    /// - STACKGC_CLEAR_STACK
    /// - STACKGC_VERBOSE
    ///
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("STACKGC_LIMIT") {
            if let Ok(size) = val.parse::<usize>() {
                config.initial_memory_limit = size;
            }
        }

        if let Ok(val) = std::env::var("STACKGC_MAX_LIMIT") {
            if let Ok(size) = val.parse::<usize>() {
                config.max_memory_limit = size;
            }
        }

        if let Ok(val) = std::env::var("STACKGC_SCAN") {
            match val.parse::<ScanGranularity>() {
                Ok(granularity) => config.scan_granularity = granularity,
                Err(e) => log::warn!("Ignoring STACKGC_SCAN: {}", e),
            }
        }

        if let Ok(val) = std::env::var("STACKGC_CLEAR_STACK") {
            if let Ok(size) = val.parse::<usize>() {
                config.clear_stack_bytes = size;
            }
        }

        if let Ok(val) = std::env::var("STACKGC_VERBOSE") {
            config.verbose = val == "1" || val.eq_ignore_ascii_case("true");
        }

        config
    }
}

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid memory limit: {0}")]
    InvalidMemoryLimit(String),

    #[error("Invalid stack scan limit: {0}")]
    InvalidStackScan(String),

    #[error("Invalid scan granularity: {0:?} (expected \"word\" or \"byte\")")]
    InvalidGranularity(String),
}
