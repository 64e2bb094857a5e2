//! Collector Timer - Timing Utilities

use std::time::{Duration, Instant};

/// GcTimer - timer for measuring collection phases
#[derive(Debug, Clone, Copy)]
pub struct GcTimer {
    start: Instant,
}

impl GcTimer {
    /// Start a new timer
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Return the elapsed time and start over
    pub fn lap(&mut self) -> Duration {
        let now = Instant::now();
        let lap = now - self.start;
        self.start = now;
        lap
    }
}

impl Default for GcTimer {
    fn default() -> Self {
        Self::new()
    }
}
