//! Alerting System
//!
//! Decides when the audible drowsiness alarm starts and stops, and drives looping
//! sounds through an [`AudioSink`].

mod alarm;
mod audio;

use thiserror::Error;

pub use alarm::{AlarmConfig, AlarmController, AlarmPhase, AlarmState};
pub use audio::{AudioError, AudioSink, LogAudioSink, LoopingSound, SoundId};

/// Alerting error types
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Invalid alarm configuration: {0}")]
    InvalidConfig(String),
}
