//! Stats Module - Collection Statistics
//!
//! Per-cycle records and running totals kept by each manager when
//! `GcConfig::stats_enabled` is set.
//!
//! Metrics:
//! - Pause time (mark + sweep) per cycle, average and maximum
//! - Objects swept and finalized
//! - Bytes reclaimed and peak allocated bytes

pub mod timer;

pub use timer::GcTimer;

use serde::Serialize;
use std::time::{Duration, Instant};

/// Record of one `garbage_collect` call
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleStats {
    /// 1-based cycle number within the manager
    pub cycle: u64,
    /// Stack words matching a tracked address
    pub roots_found: usize,
    /// Objects found reachable
    pub objects_marked: usize,
    /// Objects whose manager hook was released
    pub objects_swept: usize,
    /// Swept objects released as last owner: the manager's hook was the
    /// only reference left when the sweep dropped it
    ///
    /// Objects freed indirectly, because another swept object owned them,
    /// are not counted even when that happens in the same sweep.
    pub objects_finalized: usize,
    /// Bytes reclaimed as reported by `garbage_collect`
    pub bytes_freed: usize,
    /// Stack bytes scanned for roots
    pub stack_bytes_scanned: usize,
    pub mark_duration: Duration,
    pub sweep_duration: Duration,
}

impl CycleStats {
    /// Mark plus sweep time
    pub fn pause(&self) -> Duration {
        self.mark_duration + self.sweep_duration
    }
}

/// GcStats - running totals for one manager
#[derive(Debug, Clone)]
pub struct GcStats {
    total_cycles: u64,
    total_bytes_freed: u64,
    total_objects_swept: u64,
    total_objects_finalized: u64,
    total_pause: Duration,
    max_pause: Duration,
    peak_allocated: usize,
    last_cycle: Option<CycleStats>,
    start_time: Instant,
}

impl GcStats {
    pub fn new() -> Self {
        Self {
            total_cycles: 0,
            total_bytes_freed: 0,
            total_objects_swept: 0,
            total_objects_finalized: 0,
            total_pause: Duration::ZERO,
            max_pause: Duration::ZERO,
            peak_allocated: 0,
            last_cycle: None,
            start_time: Instant::now(),
        }
    }

    /// Record a finished cycle
    pub fn record_cycle(&mut self, cycle: CycleStats) {
        let pause = cycle.pause();
        self.total_cycles += 1;
        self.total_bytes_freed += cycle.bytes_freed as u64;
        self.total_objects_swept += cycle.objects_swept as u64;
        self.total_objects_finalized += cycle.objects_finalized as u64;
        self.total_pause += pause;
        self.max_pause = self.max_pause.max(pause);
        self.last_cycle = Some(cycle);
    }

    /// Record the current allocated byte count
    pub fn record_allocated(&mut self, bytes: usize) {
        self.peak_allocated = self.peak_allocated.max(bytes);
    }

    pub fn last_cycle(&self) -> Option<&CycleStats> {
        self.last_cycle.as_ref()
    }

    /// Get summary statistics
    pub fn summary(&self) -> GcSummary {
        let avg_pause_ms = if self.total_cycles == 0 {
            0.0
        } else {
            self.total_pause.as_secs_f64() * 1000.0 / self.total_cycles as f64
        };

        GcSummary {
            total_cycles: self.total_cycles,
            total_bytes_freed: self.total_bytes_freed,
            total_objects_swept: self.total_objects_swept,
            total_objects_finalized: self.total_objects_finalized,
            avg_pause_ms,
            max_pause_ms: self.max_pause.as_secs_f64() * 1000.0,
            peak_allocated_bytes: self.peak_allocated,
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

}

impl Default for GcStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GcSummary {
    pub total_cycles: u64,
    pub total_bytes_freed: u64,
    pub total_objects_swept: u64,
    pub total_objects_finalized: u64,
    /// Average pause time (ms)
    pub avg_pause_ms: f64,
    /// Max pause time (ms)
    pub max_pause_ms: f64,
    pub peak_allocated_bytes: usize,
    pub uptime_secs: u64,
}
