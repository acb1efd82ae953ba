//! Session control shared by the frame pipeline and the HTTP commands

use std::time::Instant;

use chrono::{DateTime, Local, NaiveDate, Utc};
use dms::{FrameAnalysis, Observation};
use fatigue::FatigueReading;
use monitor::{DriverMonitor, MonitorError, MonitorSnapshot};
use storage::{Repository, SessionRecord, StorageError};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::telemetry;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Monitor(#[from] MonitorError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("No session is running")]
    NoSession,
}

/// The monitor plus everything needed to persist what it produces
pub struct Controller {
    monitor: DriverMonitor,
    repository: Repository,
    started_at: Option<DateTime<Utc>>,
    day: NaiveDate,
}

impl Controller {
    /// Wrap a monitor whose daily cache was restored for `day`
    pub fn new(monitor: DriverMonitor, repository: Repository, day: NaiveDate) -> Self {
        Self {
            monitor,
            repository,
            started_at: None,
            day,
        }
    }

    pub fn start(&mut self) -> Result<MonitorSnapshot, ControlError> {
        let now = Instant::now();
        self.monitor.start_session(now)?;
        self.started_at = Some(Utc::now());
        Ok(self.monitor.snapshot(now))
    }

    /// Stop the session and persist its summary and the daily cache
    pub async fn stop(&mut self) -> Result<SessionRecord, ControlError> {
        let summary = self
            .monitor
            .stop_session(Instant::now())
            .ok_or(ControlError::NoSession)?;
        let ended_at = Utc::now();

        let record = SessionRecord {
            id: Uuid::new_v4(),
            started_at: self.started_at.take().unwrap_or(ended_at),
            ended_at,
            session_seconds: summary.session_seconds,
            daily_seconds: summary.daily_seconds,
            alarm_count: summary.alarm_count,
            peak_fatigue: summary.peak_fatigue,
            frames: summary.frames,
        };

        // Both writes are attempted; the first failure is reported
        let recorded = self.repository.record_session(&record).await;
        if let Err(e) = &recorded {
            warn!("Session {} not recorded: {}", record.id, e);
        }
        let saved = self.repository.save_daily(self.day, summary.daily_seconds).await;
        if let Err(e) = &saved {
            warn!("Daily drive time for {} not saved: {}", self.day, e);
        }
        recorded.and(saved)?;
        Ok(record)
    }

    pub fn on_frame(&mut self, observation: &Observation) -> Option<FrameAnalysis> {
        let analysis = self.monitor.on_frame(observation, Instant::now())?;
        telemetry::record_frame(&analysis);
        Some(analysis)
    }

    pub fn on_clock(&mut self) -> Option<FatigueReading> {
        self.roll_day(Local::now().date_naive());
        let now = Instant::now();
        let reading = self.monitor.on_clock(now)?;
        telemetry::record_clock(&reading, &self.monitor.snapshot(now));
        Some(reading)
    }

    /// Zero the daily cache once the local date moves on
    pub fn roll_day(&mut self, today: NaiveDate) -> bool {
        if today == self.day {
            return false;
        }
        info!("New day {}, resetting daily drive time", today);
        self.day = today;
        self.monitor.reset_day();
        true
    }

    pub fn toggle_mute(&mut self) -> bool {
        self.monitor.toggle_mute()
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        self.monitor.snapshot(Instant::now())
    }

    pub fn is_active(&self) -> bool {
        self.monitor.is_active()
    }

    pub fn is_degraded(&self) -> bool {
        self.monitor.is_degraded()
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Stop and persist an active session, logging instead of failing
    pub async fn shutdown(&mut self) {
        if !self.is_active() {
            return;
        }
        match self.stop().await {
            Ok(record) => info!("Session {} persisted on shutdown", record.id),
            Err(e) => warn!("Failed to persist session on shutdown: {}", e),
        }
    }
}
