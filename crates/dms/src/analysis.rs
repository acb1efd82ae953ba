//! DMS per-frame analysis results

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::score::ScoreState;
use crate::signal::Label;

/// Reason the frame counts as a drowsiness warning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCause {
    /// Eyes closed past the eye-closure threshold
    EyesClosed,
    /// Nod count at or past threshold
    Nodding,
    /// Yawn past threshold (only when yawn alarms are enabled)
    Yawning,
}

/// Every warning cause active on one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WarningSet {
    pub eyes_closed: bool,
    pub nodding: bool,
    pub yawning: bool,
}

impl WarningSet {
    pub fn insert(&mut self, cause: WarningCause) {
        match cause {
            WarningCause::EyesClosed => self.eyes_closed = true,
            WarningCause::Nodding => self.nodding = true,
            WarningCause::Yawning => self.yawning = true,
        }
    }

    pub fn contains(&self, cause: WarningCause) -> bool {
        match cause {
            WarningCause::EyesClosed => self.eyes_closed,
            WarningCause::Nodding => self.nodding,
            WarningCause::Yawning => self.yawning,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.eyes_closed || self.nodding || self.yawning)
    }

    /// Whether any cause here was absent from `previous`
    pub fn raised_since(&self, previous: WarningSet) -> bool {
        (self.eyes_closed && !previous.eyes_closed)
            || (self.nodding && !previous.nodding)
            || (self.yawning && !previous.yawning)
    }

    /// Highest-priority cause: nodding, then eye closure, then yawning
    pub fn primary(&self) -> Option<WarningCause> {
        [WarningCause::Nodding, WarningCause::EyesClosed, WarningCause::Yawning]
            .into_iter()
            .find(|cause| self.contains(*cause))
    }
}

impl From<WarningCause> for WarningSet {
    fn from(cause: WarningCause) -> Self {
        let mut set = WarningSet::default();
        set.insert(cause);
        set
    }
}

/// Driver status shown to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DriverStatus {
    #[default]
    Normal,
    EyesClosed { seconds: f64 },
    /// Yawning, not yet past the yawn threshold
    MouthOpening { seconds: f64 },
    Yawning { seconds: f64 },
    Nodding,
    NoFace,
    /// Face tracked without a classifier
    FeaturesOnly,
    Stopped,
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverStatus::Normal => write!(f, "NORMAL"),
            DriverStatus::EyesClosed { seconds } => write!(f, "EYES CLOSED: {:.1}s", seconds),
            DriverStatus::MouthOpening { seconds } => write!(f, "MOUTH OPENING {:.1}s", seconds),
            DriverStatus::Yawning { seconds } => write!(f, "YAWNING ({:.1}s)", seconds),
            DriverStatus::Nodding => write!(f, "DROWSY (NODDING)"),
            DriverStatus::NoFace => write!(f, "NO FACE"),
            DriverStatus::FeaturesOnly => write!(f, "MONITORING (NO CLASSIFIER)"),
            DriverStatus::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// Complete result of one frame tick
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameAnalysis {
    /// Whether a face was detected
    pub face_detected: bool,

    /// Classification-driven state was left untouched (no face, hold policy)
    pub state_held: bool,

    /// Label after the MAR override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<Label>,

    /// Completed nods in the current series
    pub nod_count: u32,

    /// Continuous eye closure so far
    pub eyes_closed: Duration,

    /// Continuous yawn so far
    pub yawn: Duration,

    /// Eye closure as a fraction of the threshold, capped at 1
    pub eye_closure_ratio: f64,

    /// Normalized scores after this frame
    pub scores: ScoreState,

    /// Every warning cause active on this frame
    pub causes: WarningSet,

    /// Highest-priority cause, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<WarningCause>,

    pub status: DriverStatus,
}

impl FrameAnalysis {
    pub fn is_warning(&self) -> bool {
        !self.causes.is_empty()
    }
}
