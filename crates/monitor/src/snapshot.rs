//! Read-only views handed to the presentation layer

use alerting::AlarmState;
use fatigue::FatigueBand;
use serde::{Deserialize, Serialize};

/// Everything the dashboard shows for one tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub session_active: bool,
    /// Classifier unavailable, only nods are tracked
    pub degraded: bool,

    pub score_alert: f64,
    pub score_sleep: f64,
    pub score_yawn: f64,
    pub nod_count: u32,
    pub eye_closure_ratio: f64,

    pub fatigue_pct: f64,
    pub fatigue_band: FatigueBand,
    pub fatigue_warning_playing: bool,

    pub alarm_is_playing: bool,
    pub alarm: AlarmState,

    pub session_seconds: u64,
    pub total_seconds: u64,
    /// Session time as `HH:MM:SS`
    pub session_time: String,
    /// Daily drive time as a share of the cap
    pub daily_drive_percent: f64,

    pub status_text: String,
    pub frames: u64,
}

/// What a finished session leaves behind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_seconds: u64,
    /// Daily drive cache after the commit
    pub daily_seconds: u64,
    pub alarm_count: u32,
    pub peak_fatigue: f64,
    pub frames: u64,
}
