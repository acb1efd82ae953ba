//! Drowsiness scores: asymmetric integrators and the 100-point partition

use serde::{Deserialize, Serialize};

use crate::DmsError;

const SCORE_MAX: f64 = 100.0;

/// Rise/decay integrator bounded to [0, 100]
///
/// Rises faster than it decays so a sustained danger signal is never masked by
/// quick forgiveness.
#[derive(Debug, Clone)]
pub struct ScoreAccumulator {
    score: f64,
    rise: f64,
    decay: f64,
}

impl ScoreAccumulator {
    pub fn new(rise: f64, decay: f64) -> Result<Self, DmsError> {
        if !rise.is_finite() || !decay.is_finite() || decay < 0.0 {
            return Err(DmsError::Config(format!("invalid score rates +{rise}/-{decay}")));
        }
        if rise < decay {
            return Err(DmsError::Config(format!(
                "score rise {rise} is slower than decay {decay}"
            )));
        }
        Ok(Self { score: 0.0, rise, decay })
    }

    /// One frame: rise when active, decay otherwise
    pub fn tick(&mut self, active: bool) -> f64 {
        if active {
            self.score = (self.score + self.rise).min(SCORE_MAX);
        } else {
            self.score = (self.score - self.decay).max(0.0);
        }
        self.score
    }

    /// Add an extra increment on top of the regular rise
    pub fn boost(&mut self, amount: f64) -> f64 {
        self.score = (self.score + amount).clamp(0.0, SCORE_MAX);
        self.score
    }

    pub fn value(&self) -> f64 {
        self.score
    }

    /// Overwrite the score, e.g. with a normalized value
    pub fn set(&mut self, value: f64) {
        self.score = value.clamp(0.0, SCORE_MAX);
    }

    pub fn reset(&mut self) {
        self.score = 0.0;
    }
}

/// Sleep, yawn and alert percentages that always sum to 100
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreState {
    pub sleep: f64,
    pub yawn: f64,
    pub alert: f64,
}

impl Default for ScoreState {
    fn default() -> Self {
        Self {
            sleep: 0.0,
            yawn: 0.0,
            alert: SCORE_MAX,
        }
    }
}

/// Partition 100 points between sleep, yawn and alert
///
/// Alert is the complement. When sleep and yawn together exceed 100 they are
/// rescaled proportionally and alert drops to zero.
pub fn normalize(sleep: f64, yawn: f64) -> ScoreState {
    let sleep = sleep.clamp(0.0, SCORE_MAX);
    let yawn = yawn.clamp(0.0, SCORE_MAX);
    let total = sleep + yawn;

    if total > SCORE_MAX {
        let sleep = sleep * SCORE_MAX / total;
        ScoreState {
            sleep,
            yawn: SCORE_MAX - sleep,
            alert: 0.0,
        }
    } else {
        ScoreState {
            sleep,
            yawn,
            alert: SCORE_MAX - total,
        }
    }
}
