//! Session and daily drive-time accounting

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Drive-time counters as reported to consumers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveTimeState {
    /// Seconds in the current session
    pub session_seconds: u64,
    /// Seconds committed by earlier sessions today
    pub daily_cache_seconds: u64,
    /// Cache plus session, capped
    pub total_seconds: u64,
}

/// What a stopped session contributed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveTimeSummary {
    pub session_seconds: u64,
    /// Daily cache after the commit
    pub daily_seconds: u64,
}

/// Tracks session drive time on top of a daily cache
///
/// The cache survives stop/start within a day and is zeroed only by
/// [`DriveTimeTracker::reset_day`].
#[derive(Debug, Clone)]
pub struct DriveTimeTracker {
    cap_seconds: u64,
    session_start: Option<Instant>,
    session_seconds: u64,
    daily_cache_seconds: u64,
    total_seconds: u64,
}

impl DriveTimeTracker {
    /// Create a tracker, restoring today's committed drive time
    pub fn new(cap_seconds: u64, daily_cache_seconds: u64) -> Self {
        Self {
            cap_seconds,
            session_start: None,
            session_seconds: 0,
            daily_cache_seconds,
            total_seconds: daily_cache_seconds.min(cap_seconds),
        }
    }

    /// Begin a session; the daily cache carries over
    pub fn start(&mut self, now: Instant) -> bool {
        if self.session_start.is_some() {
            warn!("Drive session already running, ignoring start");
            return false;
        }
        self.session_start = Some(now);
        self.session_seconds = 0;
        self.refresh_total();
        info!(
            "Drive session started, {}s already driven today",
            self.daily_cache_seconds
        );
        true
    }

    /// One-second clock tick, returns `(session_seconds, total_seconds)`
    pub fn tick(&mut self, now: Instant) -> (u64, u64) {
        if let Some(start) = self.session_start {
            self.session_seconds = now.saturating_duration_since(start).as_secs();
            self.refresh_total();
        }
        (self.session_seconds, self.total_seconds)
    }

    /// End the session and commit its time into the daily cache
    pub fn stop(&mut self, now: Instant) -> Option<DriveTimeSummary> {
        self.session_start?;
        let (session_seconds, _) = self.tick(now);

        self.daily_cache_seconds = self.daily_cache_seconds.saturating_add(session_seconds);
        self.session_seconds = 0;
        self.session_start = None;
        self.refresh_total();

        info!(
            "Drive session stopped after {}s, {}s driven today",
            session_seconds, self.daily_cache_seconds
        );
        Some(DriveTimeSummary {
            session_seconds,
            daily_seconds: self.daily_cache_seconds,
        })
    }

    /// New-day boundary: forget everything committed so far
    pub fn reset_day(&mut self) {
        debug!("Drive time day rollover, dropping {}s", self.daily_cache_seconds);
        self.daily_cache_seconds = 0;
        self.refresh_total();
    }

    fn refresh_total(&mut self) {
        self.total_seconds = self
            .daily_cache_seconds
            .saturating_add(self.session_seconds)
            .min(self.cap_seconds);
    }

    pub fn is_active(&self) -> bool {
        self.session_start.is_some()
    }

    pub fn total_seconds(&self) -> u64 {
        self.total_seconds
    }

    pub fn daily_cache_seconds(&self) -> u64 {
        self.daily_cache_seconds
    }

    /// Total drive time as a percentage of the cap
    pub fn daily_percent(&self) -> f64 {
        self.total_seconds as f64 / self.cap_seconds as f64 * 100.0
    }

    pub fn state(&self) -> DriveTimeState {
        DriveTimeState {
            session_seconds: self.session_seconds,
            daily_cache_seconds: self.daily_cache_seconds,
            total_seconds: self.total_seconds,
        }
    }
}

/// `HH:MM:SS` label for a second count
pub fn format_hms(seconds: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    const CAP: u64 = 36_000;

    #[test]
    fn test_session_counts_whole_seconds() {
        let t0 = Instant::now();
        let mut drive = DriveTimeTracker::new(CAP, 0);
        drive.start(t0);
        assert_eq!(drive.tick(t0 + Duration::from_millis(2_900)), (2, 2));
        assert_eq!(drive.tick(t0 + Duration::from_secs(61)), (61, 61));
    }

    #[test]
    fn test_cache_carries_over_stop_start() {
        let t0 = Instant::now();
        let mut drive = DriveTimeTracker::new(CAP, 100);
        drive.start(t0);
        let summary = drive.stop(t0 + Duration::from_secs(50)).unwrap();
        assert_eq!(summary, DriveTimeSummary { session_seconds: 50, daily_seconds: 150 });
        assert_eq!(drive.state().session_seconds, 0);
        assert!(!drive.is_active());

        let t1 = t0 + Duration::from_secs(600);
        drive.start(t1);
        assert_eq!(drive.tick(t1 + Duration::from_secs(10)), (10, 160));
    }

    #[test]
    fn test_tick_without_session_reports_cache() {
        let mut drive = DriveTimeTracker::new(CAP, 42);
        assert_eq!(drive.tick(Instant::now()), (0, 42));
        assert!(drive.stop(Instant::now()).is_none());
    }

    #[test]
    fn test_total_capped_at_ten_hours() {
        let t0 = Instant::now();
        let mut drive = DriveTimeTracker::new(CAP, 35_000);
        drive.start(t0);
        assert_eq!(drive.tick(t0 + Duration::from_secs(2_000)), (2_000, CAP));
        assert_eq!(drive.daily_percent(), 100.0);

        // Commit keeps the uncapped sum
        let summary = drive.stop(t0 + Duration::from_secs(2_000)).unwrap();
        assert_eq!(summary.daily_seconds, 37_000);
        assert_eq!(drive.total_seconds(), CAP);
    }

    #[test]
    fn test_reset_day() {
        let mut drive = DriveTimeTracker::new(CAP, 5_000);
        drive.reset_day();
        assert_eq!(drive.state(), DriveTimeState::default());
    }

    #[test]
    fn test_double_start_ignored() {
        let t0 = Instant::now();
        let mut drive = DriveTimeTracker::new(CAP, 0);
        assert!(drive.start(t0));
        assert!(!drive.start(t0 + Duration::from_secs(30)));
        assert_eq!(drive.tick(t0 + Duration::from_secs(40)).0, 40);
    }

    #[test]
    fn test_format_hms() {
        assert_eq!(format_hms(0), "00:00:00");
        assert_eq!(format_hms(3_725), "01:02:05");
    }

    proptest! {
        #[test]
        fn prop_total_never_exceeds_cap(cache in 0u64..100_000, elapsed in 0u64..1_000_000) {
            let t0 = Instant::now();
            let mut drive = DriveTimeTracker::new(CAP, cache);
            drive.start(t0);
            let (_, total) = drive.tick(t0 + Duration::from_secs(elapsed));
            prop_assert!(total <= CAP);
            drive.stop(t0 + Duration::from_secs(elapsed));
            prop_assert!(drive.total_seconds() <= CAP);
        }
    }
}
