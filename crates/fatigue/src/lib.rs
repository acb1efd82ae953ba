//! Fatigue Tracking
//!
//! Accumulates session and daily drive time and folds it together with the
//! day's behaviour counts into a single 0-100% fatigue level.

mod aggregator;
mod drive_time;

pub use aggregator::{
    fatigue_percentage, FatigueAggregator, FatigueBand, FatigueEvent, FatigueReading, WarnLatch,
};
pub use drive_time::{format_hms, DriveTimeState, DriveTimeSummary, DriveTimeTracker};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatigue errors
#[derive(Debug, Error)]
pub enum FatigueError {
    #[error("Invalid fatigue configuration: {0}")]
    InvalidConfig(String),
}

/// Fatigue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FatigueConfig {
    /// Upper bound on the reported daily drive time (seconds)
    pub drive_cap_seconds: u64,
    /// Drive time that alone accounts for 70% fatigue (seconds)
    pub drive_seconds_for_70pct: u64,
    /// Weight applied to the daily danger-frame ratio
    pub k_behavior: f64,
    /// Fatigue level that raises the one-shot danger warning (%)
    pub fatigue_warn_pct: f64,
}

impl Default for FatigueConfig {
    fn default() -> Self {
        Self {
            drive_cap_seconds: 10 * 3600,
            drive_seconds_for_70pct: 4 * 3600,
            k_behavior: 110.0,
            fatigue_warn_pct: 70.0,
        }
    }
}

impl FatigueConfig {
    pub fn validate(&self) -> Result<(), FatigueError> {
        if self.drive_cap_seconds == 0 {
            return Err(FatigueError::InvalidConfig("drive_cap_seconds must be positive".into()));
        }
        if self.drive_seconds_for_70pct == 0 {
            return Err(FatigueError::InvalidConfig(
                "drive_seconds_for_70pct must be positive".into(),
            ));
        }
        if !self.k_behavior.is_finite() || self.k_behavior < 0.0 {
            return Err(FatigueError::InvalidConfig(format!(
                "k_behavior must be a non-negative number, got {}",
                self.k_behavior
            )));
        }
        if !(0.0..=100.0).contains(&self.fatigue_warn_pct) {
            return Err(FatigueError::InvalidConfig(format!(
                "fatigue_warn_pct {} outside [0, 100]",
                self.fatigue_warn_pct
            )));
        }
        Ok(())
    }
}
