//! Daily fatigue level and its one-shot danger warning

use dms::DailyBehaviorStats;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{FatigueConfig, FatigueError};

/// Presentation band of a fatigue level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FatigueBand {
    Awake,
    Tiring,
    Danger,
}

impl FatigueBand {
    pub fn from_percent(pct: f64) -> Self {
        if pct < 40.0 {
            FatigueBand::Awake
        } else if pct < 70.0 {
            FatigueBand::Tiring
        } else {
            FatigueBand::Danger
        }
    }
}

/// Edge produced by the warning latch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FatigueEvent {
    /// Level crossed the threshold upward
    Danger,
    /// Level fell back below the threshold
    Rearmed,
}

/// Edge-triggered latch: fires once per upward crossing
#[derive(Debug, Clone)]
pub struct WarnLatch {
    threshold: f64,
    warned: bool,
}

impl WarnLatch {
    pub fn new(threshold: f64) -> Self {
        Self { threshold, warned: false }
    }

    pub fn update(&mut self, value: f64) -> Option<FatigueEvent> {
        if value >= self.threshold {
            if self.warned {
                return None;
            }
            self.warned = true;
            Some(FatigueEvent::Danger)
        } else if self.warned {
            self.warned = false;
            Some(FatigueEvent::Rearmed)
        } else {
            None
        }
    }

    pub fn is_warned(&self) -> bool {
        self.warned
    }

    pub fn rearm(&mut self) {
        self.warned = false;
    }
}

/// Combine daily behaviour and drive time into a 0-100 fatigue level
///
/// `behavioral = (sleep + 0.5 * yawn) / total * k_behavior`, zero with no frames;
/// `time_factor = drive_seconds / drive_seconds_for_70pct * 70`.
pub fn fatigue_percentage(
    stats: &DailyBehaviorStats,
    total_drive_seconds: u64,
    config: &FatigueConfig,
) -> f64 {
    let behavioral = if stats.day_total == 0 {
        0.0
    } else {
        (stats.day_sleep as f64 + 0.5 * stats.day_yawn as f64) / stats.day_total as f64
            * config.k_behavior
    };
    let time_factor = if config.drive_seconds_for_70pct == 0 {
        0.0
    } else {
        total_drive_seconds as f64 / config.drive_seconds_for_70pct as f64 * 70.0
    };

    (behavioral + time_factor).clamp(0.0, 100.0)
}

/// One evaluation of the fatigue level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FatigueReading {
    pub percent: f64,
    pub band: FatigueBand,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<FatigueEvent>,
}

/// Fatigue level with warning debounce
pub struct FatigueAggregator {
    config: FatigueConfig,
    latch: WarnLatch,
    percent: f64,
    peak: f64,
}

impl FatigueAggregator {
    pub fn new(config: FatigueConfig) -> Result<Self, FatigueError> {
        config.validate()?;
        Ok(Self {
            latch: WarnLatch::new(config.fatigue_warn_pct),
            percent: 0.0,
            peak: 0.0,
            config,
        })
    }

    /// Recompute the level, emitting the danger event on an upward crossing
    pub fn evaluate(&mut self, stats: &DailyBehaviorStats, total_drive_seconds: u64) -> FatigueReading {
        let percent = fatigue_percentage(stats, total_drive_seconds, &self.config);
        self.percent = percent;
        self.peak = self.peak.max(percent);

        let event = self.latch.update(percent);
        match event {
            Some(FatigueEvent::Danger) => warn!("Fatigue reached {:.0}%, driver should rest", percent),
            Some(FatigueEvent::Rearmed) => info!("Fatigue back below warning level ({:.0}%)", percent),
            None => {}
        }

        FatigueReading {
            percent,
            band: FatigueBand::from_percent(percent),
            event,
        }
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }

    /// Highest level seen since the last reset
    pub fn peak(&self) -> f64 {
        self.peak
    }

    pub fn is_warned(&self) -> bool {
        self.latch.is_warned()
    }

    /// Session start: zero the level and re-arm the warning
    pub fn reset(&mut self) {
        self.percent = 0.0;
        self.peak = 0.0;
        self.latch.rearm();
    }
}
