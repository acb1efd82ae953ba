//! Audio playback collaborator

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Sounds the monitor can loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundId {
    /// Drowsiness alarm bell
    Alarm,
    /// Daily fatigue warning beep
    FatigueWarning,
}

/// Audio playback errors
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Audio device unavailable: {0}")]
    Device(String),
    #[error("Sound not loaded: {0:?}")]
    NotLoaded(SoundId),
}

/// Fire-and-forget looping playback
///
/// Both calls must be idempotent. Callers log failures and carry on.
pub trait AudioSink: Send {
    fn play_loop(&mut self, sound: SoundId) -> Result<(), AudioError>;
    fn stop(&mut self, sound: SoundId) -> Result<(), AudioError>;
}

/// Sink that only logs, for headless deployments
#[derive(Debug, Default)]
pub struct LogAudioSink;

impl AudioSink for LogAudioSink {
    fn play_loop(&mut self, sound: SoundId) -> Result<(), AudioError> {
        info!(?sound, "Sound loop started");
        Ok(())
    }

    fn stop(&mut self, sound: SoundId) -> Result<(), AudioError> {
        info!(?sound, "Sound stopped");
        Ok(())
    }
}

/// Tracks the intended on/off state of one looping sound
///
/// The intent flips even when the sink fails; the failure is only logged.
#[derive(Debug, Clone)]
pub struct LoopingSound {
    sound: SoundId,
    playing: bool,
}

impl LoopingSound {
    pub fn new(sound: SoundId) -> Self {
        Self { sound, playing: false }
    }

    /// Start looping if not already; returns true on a fresh start
    pub fn start(&mut self, audio: &mut dyn AudioSink) -> bool {
        if self.playing {
            return false;
        }
        if let Err(e) = audio.play_loop(self.sound) {
            warn!("Failed to start {:?}: {}", self.sound, e);
        }
        self.playing = true;
        true
    }

    /// Stop if playing; returns true if it was playing
    pub fn stop(&mut self, audio: &mut dyn AudioSink) -> bool {
        if !self.playing {
            return false;
        }
        self.force_stop(audio);
        true
    }

    /// Stop regardless of the tracked state
    pub fn force_stop(&mut self, audio: &mut dyn AudioSink) {
        if let Err(e) = audio.stop(self.sound) {
            warn!("Failed to stop {:?}: {}", self.sound, e);
        }
        self.playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Sink that records every call and can be told to fail
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub calls: Vec<(&'static str, SoundId)>,
        pub fail: bool,
    }

    impl AudioSink for RecordingSink {
        fn play_loop(&mut self, sound: SoundId) -> Result<(), AudioError> {
            self.calls.push(("play", sound));
            if self.fail {
                return Err(AudioError::Device("no output device".into()));
            }
            Ok(())
        }

        fn stop(&mut self, sound: SoundId) -> Result<(), AudioError> {
            self.calls.push(("stop", sound));
            if self.fail {
                return Err(AudioError::Device("no output device".into()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_start_is_idempotent() {
        let mut sink = RecordingSink::default();
        let mut tone = LoopingSound::new(SoundId::FatigueWarning);
        assert!(tone.start(&mut sink));
        assert!(!tone.start(&mut sink));
        assert_eq!(sink.calls, vec![("play", SoundId::FatigueWarning)]);

        assert!(tone.stop(&mut sink));
        assert!(!tone.stop(&mut sink));
        assert_eq!(sink.calls.len(), 2);
    }

    #[test]
    fn test_failure_still_flips_intent() {
        let mut sink = RecordingSink { fail: true, ..Default::default() };
        let mut tone = LoopingSound::new(SoundId::Alarm);
        tone.start(&mut sink);
        assert!(tone.is_playing());
        tone.stop(&mut sink);
        assert!(!tone.is_playing());
    }
}
