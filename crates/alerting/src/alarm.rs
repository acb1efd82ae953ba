//! Alarm Controller Implementation

use dms::WarningSet;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::audio::{AudioSink, LoopingSound, SoundId};
use crate::AlertError;

/// Alarm configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    /// Warning-free time after which a playing alarm stops (seconds)
    pub alarm_awake_sec: f64,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self { alarm_awake_sec: 5.0 }
    }
}

impl AlarmConfig {
    pub fn awake_stop(&self) -> Duration {
        Duration::try_from_secs_f64(self.alarm_awake_sec).unwrap_or(Duration::ZERO)
    }

    pub fn validate(&self) -> Result<(), AlertError> {
        match Duration::try_from_secs_f64(self.alarm_awake_sec) {
            Ok(stop) if !stop.is_zero() => Ok(()),
            _ => Err(AlertError::InvalidConfig(format!(
                "alarm_awake_sec must be a positive duration, got {}",
                self.alarm_awake_sec
            ))),
        }
    }
}

/// Externally visible alarm phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmPhase {
    #[default]
    Idle,
    Playing,
    /// Danger is current but the driver muted the alarm
    PlayingMuted,
}

/// Snapshot of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmState {
    pub phase: AlarmPhase,
    pub playing: bool,
    pub muted: bool,
    /// Seconds the driver has been warning-free, while counting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub awake_seconds: Option<u64>,
    /// Alarms started since the last reset
    pub alarm_count: u32,
}

/// Alarm state machine
///
/// A warning cause that was not active on the previous frame clears any mute and
/// starts the alarm, so a mute only covers the danger it was pressed for. A playing alarm stops once
/// the driver stays warning-free for `alarm_awake_sec`, or immediately on mute.
/// Playback failures never block a transition.
pub struct AlarmController {
    config: AlarmConfig,
    siren: LoopingSound,
    muted: bool,
    active: WarningSet,
    awake_since: Option<Instant>,
    alarm_count: u32,
}

impl AlarmController {
    /// Create a new alarm controller
    pub fn new(config: AlarmConfig) -> Self {
        debug!("Creating alarm controller with config: {:?}", config);
        Self {
            config,
            siren: LoopingSound::new(SoundId::Alarm),
            muted: false,
            active: WarningSet::default(),
            awake_since: None,
            alarm_count: 0,
        }
    }

    /// Feed this frame's active warning causes
    pub fn update(&mut self, causes: WarningSet, now: Instant, audio: &mut dyn AudioSink) -> AlarmPhase {
        let raised = causes.raised_since(self.active);
        self.active = causes;

        if !causes.is_empty() {
            self.awake_since = None;
            if raised && self.muted {
                info!("New drowsiness warning {:?}, clearing mute", causes.primary());
                self.muted = false;
            }
            if !self.muted && self.siren.start(audio) {
                self.alarm_count += 1;
                info!("Alarm started (count: {})", self.alarm_count);
            }
        } else if self.muted {
            self.siren.stop(audio);
            self.awake_since = None;
        } else {
            match self.awake_since {
                None => self.awake_since = Some(now),
                Some(since) => {
                    if now.saturating_duration_since(since) >= self.config.awake_stop()
                        && self.siren.stop(audio)
                    {
                        info!("Driver awake for {:?}, alarm stopped", self.config.awake_stop());
                    }
                }
            }
        }

        self.phase()
    }

    /// Mute the alarm; stops playback at once
    pub fn mute(&mut self, audio: &mut dyn AudioSink) {
        self.muted = true;
        self.awake_since = None;
        if self.siren.stop(audio) {
            info!("Alarm muted by driver");
        }
    }

    /// Flip the mute flag, returning the new value
    pub fn toggle_mute(&mut self, audio: &mut dyn AudioSink) -> bool {
        if self.muted {
            self.muted = false;
            info!("Alarm unmuted by driver");
        } else {
            self.mute(audio);
        }
        self.muted
    }

    /// Force idle with audio stopped (session stop)
    pub fn force_idle(&mut self, audio: &mut dyn AudioSink) {
        self.siren.force_stop(audio);
        self.muted = false;
        self.active = WarningSet::default();
        self.awake_since = None;
    }

    /// Reset counters for a new session
    pub fn reset(&mut self, audio: &mut dyn AudioSink) {
        self.force_idle(audio);
        self.alarm_count = 0;
    }

    pub fn phase(&self) -> AlarmPhase {
        if self.siren.is_playing() {
            AlarmPhase::Playing
        } else if self.muted && !self.active.is_empty() {
            AlarmPhase::PlayingMuted
        } else {
            AlarmPhase::Idle
        }
    }

    pub fn is_playing(&self) -> bool {
        self.siren.is_playing()
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn alarm_count(&self) -> u32 {
        self.alarm_count
    }

    pub fn state(&self, now: Instant) -> AlarmState {
        AlarmState {
            phase: self.phase(),
            playing: self.siren.is_playing(),
            muted: self.muted,
            awake_seconds: self
                .awake_since
                .map(|since| now.saturating_duration_since(since).as_secs()),
            alarm_count: self.alarm_count,
        }
    }
}

impl Default for AlarmController {
    fn default() -> Self {
        Self::new(AlarmConfig::default())
    }
}
