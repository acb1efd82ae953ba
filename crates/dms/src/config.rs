//! DMS configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::DmsError;

/// What a frame without a detected face does to classification-driven state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoFacePolicy {
    /// Timers and scores keep their last value
    #[default]
    Hold,
    /// Timers stop and scores decay as if the driver were alert
    Decay,
}

/// DMS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    /// Continuous eye closure before a drowsiness warning (seconds)
    pub eye_close_thresh_sec: f64,

    /// Continuous yawn before the yawn score starts rising (seconds)
    pub yawn_thresh_sec: f64,

    /// Completed nods that count as a drowsiness warning
    pub nod_count_thresh: u32,

    /// Idle time after which an unfinished nod series is forgiven (seconds)
    pub nod_reset_time_sec: f64,

    /// Nose travel that counts as a nod stroke (pixels, absolute)
    pub nod_threshold_px: i32,

    /// MAR above this forces the label to yawning
    pub force_yawn_mar: f64,

    /// A yawning label with MAR below this is treated as normal
    pub block_yawn_mar: f64,

    /// Sleep score rise per eyes-closed frame
    pub sleep_rise: f64,

    /// Sleep score decay per open-eyes frame
    pub sleep_decay: f64,

    /// Yawn score rise per frame past the yawn threshold
    pub yawn_rise: f64,

    /// Yawn score decay per non-yawning frame
    pub yawn_decay: f64,

    /// Extra sleep score per frame while the nod count is at or past threshold
    pub nod_boost: f64,

    /// Whether a yawn past threshold raises the audible alarm
    pub yawn_alarm: bool,

    /// Behaviour on frames without a face
    pub no_face_policy: NoFacePolicy,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            eye_close_thresh_sec: 2.0,
            yawn_thresh_sec: 1.0,
            nod_count_thresh: 8,
            nod_reset_time_sec: 4.0,
            nod_threshold_px: 60,
            force_yawn_mar: 0.4,
            block_yawn_mar: 0.3,
            sleep_rise: 0.5,
            sleep_decay: 0.2,
            yawn_rise: 0.5,
            yawn_decay: 0.2,
            nod_boost: 2.0,
            yawn_alarm: false,
            no_face_policy: NoFacePolicy::Hold,
        }
    }
}

impl DmsConfig {
    /// Create strict config (lower thresholds)
    pub fn strict() -> Self {
        Self {
            eye_close_thresh_sec: 1.5,
            nod_count_thresh: 4,
            nod_threshold_px: 40,
            yawn_alarm: true,
            ..Default::default()
        }
    }

    /// Create lenient config (higher thresholds)
    pub fn lenient() -> Self {
        Self {
            eye_close_thresh_sec: 2.5,
            yawn_thresh_sec: 3.0,
            nod_count_thresh: 10,
            ..Default::default()
        }
    }

    pub fn eye_close_thresh(&self) -> Duration {
        Duration::try_from_secs_f64(self.eye_close_thresh_sec).unwrap_or(Duration::MAX)
    }

    pub fn yawn_thresh(&self) -> Duration {
        Duration::try_from_secs_f64(self.yawn_thresh_sec).unwrap_or(Duration::MAX)
    }

    pub fn nod_reset_time(&self) -> Duration {
        Duration::try_from_secs_f64(self.nod_reset_time_sec).unwrap_or(Duration::MAX)
    }

    /// Reject tunings the state machine cannot honour
    pub fn validate(&self) -> Result<(), DmsError> {
        let seconds = [
            ("eye_close_thresh_sec", self.eye_close_thresh_sec),
            ("yawn_thresh_sec", self.yawn_thresh_sec),
            ("nod_reset_time_sec", self.nod_reset_time_sec),
        ];
        for (field, value) in seconds {
            match Duration::try_from_secs_f64(value) {
                Ok(duration) if !duration.is_zero() => {}
                _ => {
                    return Err(DmsError::Config(format!(
                        "{field} must be a positive duration, got {value}"
                    )))
                }
            }
        }

        if self.nod_count_thresh == 0 {
            return Err(DmsError::Config("nod_count_thresh must be at least 1".into()));
        }
        if self.nod_threshold_px <= 0 {
            return Err(DmsError::Config(format!(
                "nod_threshold_px must be positive, got {}",
                self.nod_threshold_px
            )));
        }
        if self.block_yawn_mar > self.force_yawn_mar {
            return Err(DmsError::Config(format!(
                "block_yawn_mar {} exceeds force_yawn_mar {}",
                self.block_yawn_mar, self.force_yawn_mar
            )));
        }
        if self.sleep_rise < self.sleep_decay || self.yawn_rise < self.yawn_decay {
            return Err(DmsError::Config("score rise rates must not be below decay rates".into()));
        }
        if self.nod_boost < 0.0 {
            return Err(DmsError::Config("nod_boost must not be negative".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(DmsConfig::default().validate().is_ok());
        assert!(DmsConfig::strict().validate().is_ok());
        assert!(DmsConfig::lenient().validate().is_ok());
    }

    #[test]
    fn test_decay_faster_than_rise_rejected() {
        let config = DmsConfig {
            sleep_rise: 0.1,
            sleep_decay: 0.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DmsError::Config(_))));
    }

    #[test]
    fn test_inverted_mar_thresholds_rejected() {
        let config = DmsConfig {
            force_yawn_mar: 0.3,
            block_yawn_mar: 0.4,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unrepresentable_seconds_rejected() {
        for bad in [1e20, f64::INFINITY, f64::NAN, 0.0, -2.0] {
            let config = DmsConfig { eye_close_thresh_sec: bad, ..Default::default() };
            assert!(matches!(config.validate(), Err(DmsError::Config(_))), "accepted {}", bad);
            let config = DmsConfig { nod_reset_time_sec: bad, ..Default::default() };
            assert!(config.validate().is_err(), "accepted {}", bad);
        }
    }

    #[test]
    fn test_durations() {
        let config = DmsConfig::default();
        assert_eq!(config.eye_close_thresh(), Duration::from_secs(2));
        assert_eq!(config.nod_reset_time(), Duration::from_secs(4));
    }
}
