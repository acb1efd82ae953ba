//! Driver Monitor
//!
//! Owns one driving session and runs its two tick sources:
//! - Frame ticks (~30 ms): DMS analysis, then the alarm decision
//! - Clock ticks (1 s): drive time, then the daily fatigue level and its warning
//!
//! Both must be serialized by the caller; the monitor has a single writer.

mod session;
mod snapshot;

pub use session::{DriverMonitor, SessionGuard};
pub use snapshot::{MonitorSnapshot, SessionSummary};

use alerting::{AlarmConfig, AlertError};
use dms::{DmsConfig, DmsError};
use fatigue::{FatigueConfig, FatigueError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Monitor error types
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error(transparent)]
    Dms(#[from] DmsError),

    #[error(transparent)]
    Fatigue(#[from] FatigueError),

    #[error(transparent)]
    Alert(#[from] AlertError),

    #[error("A session is already running")]
    SessionActive,
}

/// Every tunable threshold of the monitor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub dms: DmsConfig,
    pub alarm: AlarmConfig,
    pub fatigue: FatigueConfig,
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), MonitorError> {
        self.dms.validate()?;
        self.alarm.validate()?;
        self.fatigue.validate()?;
        Ok(())
    }
}
