//! Driver Monitoring System (DMS)
//!
//! Turns per-frame facial features and classifier labels into stable drowsiness
//! signals:
//! - MAR-based label overrides
//! - Head-nod cycle counting
//! - Eye-closure and yawn duration timers
//! - Sleep/yawn scores with asymmetric rise and decay, normalized against alertness

pub mod analysis;
pub mod config;
pub mod detector;
pub mod nod;
pub mod score;
pub mod signal;
pub mod state;
pub mod timer;

pub use analysis::{DriverStatus, FrameAnalysis, WarningCause, WarningSet};
pub use config::{DmsConfig, NoFacePolicy};
pub use detector::{
    eye_aspect_ratio, mouth_aspect_ratio, FaceBox, FaceFeatures, FaceLandmarks, Landmark, MouthLandmarks,
};
pub use nod::{NodCycleDetector, NodPhase};
pub use score::{normalize, ScoreAccumulator, ScoreState};
pub use signal::{override_label, Classifier, FrameSignal, Label, Observation};
pub use state::DailyBehaviorStats;
pub use timer::DurationTimer;

use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Invalid classifier label: {0}")]
    InvalidLabel(u8),
}

/// Per-frame drowsiness state machine
pub struct DmsModule {
    config: DmsConfig,
    nod: NodCycleDetector,
    eye_timer: DurationTimer,
    yawn_timer: DurationTimer,
    sleep_score: ScoreAccumulator,
    yawn_score: ScoreAccumulator,
    scores: ScoreState,
    stats: DailyBehaviorStats,
    /// Classifier unavailable: only nod detection runs
    degraded: bool,
}

impl DmsModule {
    /// Create a new DMS module with configuration
    pub fn new(config: DmsConfig, degraded: bool, now: Instant) -> Result<Self, DmsError> {
        config.validate()?;
        if degraded {
            info!("DMS running in features-only mode, nod detection only");
        }
        Ok(Self {
            nod: NodCycleDetector::new(&config, now),
            eye_timer: DurationTimer::new(),
            yawn_timer: DurationTimer::new(),
            sleep_score: ScoreAccumulator::new(config.sleep_rise, config.sleep_decay)?,
            yawn_score: ScoreAccumulator::new(config.yawn_rise, config.yawn_decay)?,
            scores: ScoreState::default(),
            stats: DailyBehaviorStats::default(),
            degraded,
            config,
        })
    }

    /// Process one frame tick
    pub fn process(&mut self, observation: &Observation, now: Instant) -> FrameAnalysis {
        match observation {
            Observation::NoFace => self.no_face(now),
            Observation::FeaturesOnly(features) => self.features_only(features.nose.1, now),
            Observation::Classified(signal) if self.degraded => self.features_only(signal.nose_y, now),
            Observation::Classified(signal) => self.classified(signal, now),
        }
    }

    fn classified(&mut self, signal: &FrameSignal, now: Instant) -> FrameAnalysis {
        // Behaviour counts use the classifier's own opinion
        self.stats.record(signal.classifier_label);
        let label = override_label(signal.classifier_label, signal.mar, &self.config);

        let nod_count = self.nod.update(signal.nose_y, now);
        let nodding = self.nod.is_nodding();

        let eyes_closed_now = label == Label::EyesClosed;
        let eyes_closed = self.eye_timer.tick(eyes_closed_now, now);
        self.sleep_score.tick(eyes_closed_now);
        let eye_warning = eyes_closed_now && eyes_closed >= self.config.eye_close_thresh();

        let yawning_now = label == Label::Yawning;
        let yawn = self.yawn_timer.tick(yawning_now, now);
        let yawn_past = yawning_now && yawn > self.config.yawn_thresh();
        if yawn_past || !yawning_now {
            self.yawn_score.tick(yawn_past);
        }

        if nodding {
            self.sleep_score.boost(self.config.nod_boost);
        }
        let scores = self.normalize_scores();

        let mut causes = WarningSet::default();
        if nodding {
            causes.insert(WarningCause::Nodding);
        }
        if eye_warning {
            causes.insert(WarningCause::EyesClosed);
        }
        if yawn_past && self.config.yawn_alarm {
            causes.insert(WarningCause::Yawning);
        }
        let warning = causes.primary();

        let status = if nodding {
            DriverStatus::Nodding
        } else if yawn_past {
            DriverStatus::Yawning { seconds: yawn.as_secs_f64() }
        } else if yawning_now {
            DriverStatus::MouthOpening { seconds: yawn.as_secs_f64() }
        } else if eyes_closed_now {
            DriverStatus::EyesClosed { seconds: eyes_closed.as_secs_f64() }
        } else {
            DriverStatus::Normal
        };

        if let Some(cause) = warning {
            debug!("Drowsiness warning: {:?} (nods {}, eyes {:?})", cause, nod_count, eyes_closed);
        }

        FrameAnalysis {
            face_detected: true,
            state_held: false,
            label: Some(label),
            nod_count,
            eyes_closed,
            yawn,
            eye_closure_ratio: self.eye_closure_ratio(eyes_closed),
            scores,
            causes,
            warning,
            status,
        }
    }

    fn features_only(&mut self, nose_y: i32, now: Instant) -> FrameAnalysis {
        let nod_count = self.nod.update(nose_y, now);
        let nodding = self.nod.is_nodding();
        if nodding {
            self.sleep_score.boost(self.config.nod_boost);
        }
        let scores = self.normalize_scores();
        let causes = if nodding {
            WarningSet::from(WarningCause::Nodding)
        } else {
            WarningSet::default()
        };

        FrameAnalysis {
            face_detected: true,
            state_held: false,
            label: None,
            nod_count,
            eyes_closed: self.eye_timer.elapsed(now),
            yawn: self.yawn_timer.elapsed(now),
            eye_closure_ratio: self.eye_closure_ratio(self.eye_timer.elapsed(now)),
            scores,
            causes,
            warning: causes.primary(),
            status: if nodding { DriverStatus::Nodding } else { DriverStatus::FeaturesOnly },
        }
    }

    fn no_face(&mut self, now: Instant) -> FrameAnalysis {
        let state_held = match self.config.no_face_policy {
            NoFacePolicy::Hold => true,
            NoFacePolicy::Decay => {
                self.eye_timer.tick(false, now);
                self.yawn_timer.tick(false, now);
                self.sleep_score.tick(false);
                self.yawn_score.tick(false);
                self.normalize_scores();
                false
            }
        };

        FrameAnalysis {
            face_detected: false,
            state_held,
            label: None,
            nod_count: self.nod.nod_count(),
            eyes_closed: self.eye_timer.elapsed(now),
            yawn: self.yawn_timer.elapsed(now),
            eye_closure_ratio: self.eye_closure_ratio(self.eye_timer.elapsed(now)),
            scores: self.scores,
            causes: WarningSet::default(),
            warning: None,
            status: DriverStatus::NoFace,
        }
    }

    fn normalize_scores(&mut self) -> ScoreState {
        let scores = normalize(self.sleep_score.value(), self.yawn_score.value());
        self.sleep_score.set(scores.sleep);
        self.yawn_score.set(scores.yawn);
        self.scores = scores;
        scores
    }

    fn eye_closure_ratio(&self, eyes_closed: std::time::Duration) -> f64 {
        (eyes_closed.as_secs_f64() / self.config.eye_close_thresh_sec).min(1.0)
    }

    pub fn scores(&self) -> ScoreState {
        self.scores
    }

    pub fn stats(&self) -> DailyBehaviorStats {
        self.stats
    }

    pub fn nod_count(&self) -> u32 {
        self.nod.nod_count()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Reset all per-session state (session start or driver change)
    pub fn reset_state(&mut self, now: Instant) {
        self.nod.reset(now);
        self.eye_timer.reset();
        self.yawn_timer.reset();
        self.sleep_score.reset();
        self.yawn_score.reset();
        self.scores = ScoreState::default();
        self.stats.reset();
    }
}
