//! Collector Logging and Tracing
//!
//! Two layers:
//! - `log` macros throughout the crate for ordinary diagnostics
//! - [`GcLogger`] structured [`GcEvent`]s, emitted by managers built with
//!   `GcConfig::verbose`, printed as text or JSON and kept in a bounded buffer
//!
//! Log Levels:
//! - WARN (`log` only): Unusual conditions (oversized scan ranges)
//! - INFO: Cycles, teardown, limit changes
//! - DEBUG: Phases
//! - TRACE: Per-object operations

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;

/// Log level for collector events
///
/// Warnings and errors go through the `log` macros only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Info,
    Debug,
    Trace,
}

/// Collector event types
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GcEvent {
    /// Collection cycle started
    CycleStart {
        cycle: u64,
        allocated_bytes: usize,
        object_count: usize,
        reason: String,
    },

    /// Phase completed
    PhaseEnd {
        cycle: u64,
        phase: String,
        duration_ms: f64,
    },

    /// Collection cycle completed
    CycleEnd {
        cycle: u64,
        duration_ms: f64,
        reclaimed_bytes: usize,
        objects_swept: usize,
        /// Released as last owner, see `CycleStats::objects_finalized`
        objects_finalized: usize,
    },

    /// Manager released its tracked objects
    Teardown {
        objects: usize,
        bytes: usize,
        finalized: usize,
        /// Objects still tracked when the round cap was hit
        remaining: usize,
    },

    /// Advisory memory limit raised
    LimitBumped { old_limit: usize, new_limit: usize },

    /// Object registered
    AllocationTracked {
        type_name: String,
        address: usize,
        size: usize,
    },
}

impl GcEvent {
    /// Level the event is logged at
    pub fn level(&self) -> LogLevel {
        match self {
            GcEvent::CycleStart { .. }
            | GcEvent::CycleEnd { .. }
            | GcEvent::Teardown { .. }
            | GcEvent::LimitBumped { .. } => LogLevel::Info,
            GcEvent::PhaseEnd { .. } => LogLevel::Debug,
            GcEvent::AllocationTracked { .. } => LogLevel::Trace,
        }
    }

    /// One-line human-readable rendering
    pub fn describe(&self) -> String {
        match self {
            GcEvent::CycleStart {
                cycle,
                allocated_bytes,
                object_count,
                reason,
            } => format!(
                "[GC] Cycle {} started ({} objects, {} bytes, reason: {})",
                cycle, object_count, allocated_bytes, reason
            ),
            GcEvent::PhaseEnd {
                cycle,
                phase,
                duration_ms,
            } => format!(
                "[GC] Cycle {}: {} phase completed ({:.3}ms)",
                cycle, phase, duration_ms
            ),
            GcEvent::CycleEnd {
                cycle,
                duration_ms,
                reclaimed_bytes,
                objects_swept,
                objects_finalized,
            } => format!(
                "[GC] Cycle {} completed ({:.3}ms, swept {}, finalized {}, reclaimed {} bytes)",
                cycle, duration_ms, objects_swept, objects_finalized, reclaimed_bytes
            ),
            GcEvent::Teardown {
                objects,
                bytes,
                finalized,
                remaining,
            } => format!(
                "[GC] Teardown released {} objects ({} bytes, {} finalized, {} remaining)",
                objects, bytes, finalized, remaining
            ),
            GcEvent::LimitBumped {
                old_limit,
                new_limit,
            } => format!("[GC] Memory limit {} -> {} bytes", old_limit, new_limit),
            GcEvent::AllocationTracked {
                type_name,
                address,
                size,
            } => format!("[GC] Tracked {} at {:#x} ({} bytes)", type_name, address, size),
        }
    }
}

/// Logger configuration
#[derive(Debug, Clone)]
pub struct GcLoggerConfig {
    /// Minimum log level
    pub level: LogLevel,

    /// Print events to stdout
    pub console: bool,

    /// Print JSON instead of text
    pub json: bool,

    /// Prefix console lines with a local timestamp
    pub timestamps: bool,

    /// Events kept in memory; the oldest are dropped first
    pub max_events: usize,
}

impl Default for GcLoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            console: true,
            json: false,
            timestamps: true,
            max_events: 4096,
        }
    }
}

/// Event as stored by the logger
#[derive(Debug, Clone, Serialize)]
pub struct LoggedEvent {
    pub timestamp: DateTime<Local>,
    #[serde(flatten)]
    pub event: GcEvent,
}

/// GcLogger - structured event sink
pub struct GcLogger {
    config: GcLoggerConfig,
    events: Mutex<VecDeque<LoggedEvent>>,
}

impl GcLogger {
    pub fn new(config: GcLoggerConfig) -> Self {
        Self {
            config,
            events: Mutex::new(VecDeque::new()),
        }
    }

    /// Record an event
    pub fn log(&self, event: GcEvent) {
        if event.level() > self.config.level {
            return;
        }

        let logged = LoggedEvent {
            timestamp: Local::now(),
            event,
        };

        if self.config.console {
            self.output_console(&logged);
        }

        let mut events = self.events.lock();
        if self.config.max_events == 0 {
            return;
        }
        while events.len() >= self.config.max_events {
            events.pop_front();
        }
        events.push_back(logged);
    }

    fn output_console(&self, logged: &LoggedEvent) {
        if self.config.json {
            match serde_json::to_string(logged) {
                Ok(line) => println!("{}", line),
                Err(e) => log::warn!("Failed to serialize GC event: {}", e),
            }
            return;
        }

        if self.config.timestamps {
            println!(
                "[{}] {}",
                logged.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
                logged.event.describe()
            );
        } else {
            println!("{}", logged.event.describe());
        }
    }

    /// Snapshot of the buffered events, oldest first
    pub fn events(&self) -> Vec<LoggedEvent> {
        self.events.lock().iter().cloned().collect()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().len()
    }
}

impl Default for GcLogger {
    fn default() -> Self {
        Self::new(GcLoggerConfig::default())
    }
}

lazy_static::lazy_static! {
    static ref GLOBAL_LOGGER: Mutex<GcLogger> = Mutex::new(GcLogger::default());
}

/// Log an event to the global logger
pub fn log_event(event: GcEvent) {
    GLOBAL_LOGGER.lock().log(event);
}

/// Replace the global logger
pub fn configure_logger(config: GcLoggerConfig) {
    *GLOBAL_LOGGER.lock() = GcLogger::new(config);
}

/// Buffered events of the global logger
pub fn global_events() -> Vec<LoggedEvent> {
    GLOBAL_LOGGER.lock().events()
}

/// Global logger event count
pub fn get_event_count() -> usize {
    GLOBAL_LOGGER.lock().event_count()
}
