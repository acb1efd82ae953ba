//! Behaviour counts tracked over a session

use serde::{Deserialize, Serialize};

use crate::signal::Label;

/// Classified frame counts since the last session start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyBehaviorStats {
    pub day_total: u64,
    pub day_sleep: u64,
    pub day_yawn: u64,
}

impl DailyBehaviorStats {
    /// Count one frame by its raw classifier label
    pub fn record(&mut self, label: Label) {
        self.day_total += 1;
        match label {
            Label::EyesClosed => self.day_sleep += 1,
            Label::Yawning => self.day_yawn += 1,
            Label::Normal => {}
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
