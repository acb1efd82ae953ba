//! Continuous-duration timers for eye closure and yawning

use std::time::{Duration, Instant};

/// Measures how long a condition has held without interruption
///
/// Threshold-agnostic: callers compare the returned elapsed time against their
/// own limit.
#[derive(Debug, Clone, Default)]
pub struct DurationTimer {
    started_at: Option<Instant>,
}

impl DurationTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the timer with the condition's value for this frame
    pub fn tick(&mut self, active: bool, now: Instant) -> Duration {
        if !active {
            self.started_at = None;
            return Duration::ZERO;
        }
        let started = *self.started_at.get_or_insert(now);
        now.saturating_duration_since(started)
    }

    /// Elapsed time without advancing state
    pub fn elapsed(&self, now: Instant) -> Duration {
        self.started_at
            .map(|started| now.saturating_duration_since(started))
            .unwrap_or(Duration::ZERO)
    }

    pub fn reset(&mut self) {
        self.started_at = None;
    }
}
