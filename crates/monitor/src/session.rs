//! Session lifecycle and tick handling

use std::ops::{Deref, DerefMut};
use std::time::Instant;

use alerting::{AlarmController, AudioSink, LoopingSound, SoundId};
use dms::{DmsModule, DriverStatus, FrameAnalysis, Observation};
use fatigue::{
    format_hms, DriveTimeTracker, FatigueAggregator, FatigueBand, FatigueEvent, FatigueReading,
};
use tracing::{debug, info, warn};

use crate::{MonitorConfig, MonitorError, MonitorSnapshot, SessionSummary};

/// State that lives exactly as long as one session
struct SessionState {
    dms: DmsModule,
    frames: u64,
    last: Option<FrameAnalysis>,
}

/// Single owner of all monitoring state
///
/// Dropping the monitor stops an active session, so the drive time is committed
/// and the audio silenced on every exit path.
pub struct DriverMonitor {
    config: MonitorConfig,
    audio: Box<dyn AudioSink>,
    degraded: bool,
    alarm: AlarmController,
    drive: DriveTimeTracker,
    fatigue: FatigueAggregator,
    fatigue_tone: LoopingSound,
    session: Option<SessionState>,
}

impl DriverMonitor {
    /// Create a monitor, restoring today's committed drive time
    pub fn new(
        config: MonitorConfig,
        audio: Box<dyn AudioSink>,
        degraded: bool,
        daily_cache_seconds: u64,
    ) -> Result<Self, MonitorError> {
        config.validate()?;
        info!(
            "Creating driver monitor (degraded: {}, daily drive: {}s)",
            degraded, daily_cache_seconds
        );
        Ok(Self {
            alarm: AlarmController::new(config.alarm.clone()),
            drive: DriveTimeTracker::new(config.fatigue.drive_cap_seconds, daily_cache_seconds),
            fatigue: FatigueAggregator::new(config.fatigue.clone())?,
            fatigue_tone: LoopingSound::new(SoundId::FatigueWarning),
            session: None,
            audio,
            degraded,
            config,
        })
    }

    /// Start a session with fresh timers, scores and behaviour counts
    pub fn start_session(&mut self, now: Instant) -> Result<(), MonitorError> {
        if self.session.is_some() {
            return Err(MonitorError::SessionActive);
        }
        let dms = DmsModule::new(self.config.dms.clone(), self.degraded, now)?;

        self.alarm.reset(self.audio.as_mut());
        self.fatigue.reset();
        self.drive.start(now);
        self.session = Some(SessionState { dms, frames: 0, last: None });

        info!("Monitoring session started");
        Ok(())
    }

    /// Scoped session: stopped when the guard goes out of scope
    pub fn session(&mut self, now: Instant) -> Result<SessionGuard<'_>, MonitorError> {
        self.start_session(now)?;
        Ok(SessionGuard { monitor: self })
    }

    /// Stop the session, committing drive time and silencing all audio
    pub fn stop_session(&mut self, now: Instant) -> Option<SessionSummary> {
        let session = self.session.take()?;

        let drive = self.drive.stop(now);
        self.alarm.force_idle(self.audio.as_mut());
        self.fatigue_tone.force_stop(self.audio.as_mut());

        let summary = SessionSummary {
            session_seconds: drive.map(|d| d.session_seconds).unwrap_or(0),
            daily_seconds: self.drive.daily_cache_seconds(),
            alarm_count: self.alarm.alarm_count(),
            peak_fatigue: self.fatigue.peak(),
            frames: session.frames,
        };
        info!(
            "Monitoring session stopped: {}s, {} alarms, peak fatigue {:.0}%",
            summary.session_seconds, summary.alarm_count, summary.peak_fatigue
        );
        Some(summary)
    }

    /// Frame tick; ignored while no session is running
    pub fn on_frame(&mut self, observation: &Observation, now: Instant) -> Option<FrameAnalysis> {
        let session = self.session.as_mut()?;
        let analysis = session.dms.process(observation, now);
        session.frames += 1;

        if !analysis.state_held {
            self.alarm.update(analysis.causes, now, self.audio.as_mut());
        }

        session.last = Some(analysis.clone());
        Some(analysis)
    }

    /// One-second clock tick: drive time, then fatigue
    pub fn on_clock(&mut self, now: Instant) -> Option<FatigueReading> {
        let session = self.session.as_ref()?;
        let (_, total_seconds) = self.drive.tick(now);
        let stats = session.dms.stats();

        let reading = self.fatigue.evaluate(&stats, total_seconds);
        match reading.event {
            Some(FatigueEvent::Danger) => {
                if self.alarm.is_muted() {
                    debug!("Fatigue warning tone suppressed by mute");
                } else {
                    self.fatigue_tone.start(self.audio.as_mut());
                }
            }
            Some(FatigueEvent::Rearmed) => {
                self.fatigue_tone.stop(self.audio.as_mut());
            }
            None => {}
        }
        Some(reading)
    }

    /// Driver mute button; muting silences both the alarm and the fatigue tone
    pub fn toggle_mute(&mut self) -> bool {
        let muted = self.alarm.toggle_mute(self.audio.as_mut());
        if muted {
            self.fatigue_tone.stop(self.audio.as_mut());
        }
        muted
    }

    /// New-day boundary for the drive-time cache
    pub fn reset_day(&mut self) {
        self.drive.reset_day();
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn daily_cache_seconds(&self) -> u64 {
        self.drive.daily_cache_seconds()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Read-only view for the presentation layer
    pub fn snapshot(&self, now: Instant) -> MonitorSnapshot {
        let last = self.session.as_ref().and_then(|s| s.last.as_ref());
        let scores = last.map(|a| a.scores).unwrap_or_default();
        let status = match (&self.session, last) {
            (None, _) => DriverStatus::Stopped,
            (Some(_), None) => DriverStatus::Normal,
            (Some(_), Some(a)) => a.status,
        };
        let drive = self.drive.state();
        let fatigue_pct = self.fatigue.percent();

        MonitorSnapshot {
            session_active: self.session.is_some(),
            degraded: self.degraded,
            score_alert: scores.alert,
            score_sleep: scores.sleep,
            score_yawn: scores.yawn,
            nod_count: last.map(|a| a.nod_count).unwrap_or(0),
            eye_closure_ratio: last.map(|a| a.eye_closure_ratio).unwrap_or(0.0),
            fatigue_pct,
            fatigue_band: FatigueBand::from_percent(fatigue_pct),
            fatigue_warning_playing: self.fatigue_tone.is_playing(),
            alarm_is_playing: self.alarm.is_playing(),
            alarm: self.alarm.state(now),
            session_seconds: drive.session_seconds,
            total_seconds: drive.total_seconds,
            session_time: format_hms(drive.session_seconds),
            daily_drive_percent: self.drive.daily_percent(),
            status_text: status.to_string(),
            frames: self.session.as_ref().map(|s| s.frames).unwrap_or(0),
        }
    }
}

impl Drop for DriverMonitor {
    fn drop(&mut self) {
        if self.session.is_some() {
            warn!("Driver monitor dropped during a session, stopping it");
            self.stop_session(Instant::now());
        }
    }
}

/// Borrowed session that stops itself on drop
pub struct SessionGuard<'a> {
    monitor: &'a mut DriverMonitor,
}

impl SessionGuard<'_> {
    /// Stop explicitly, returning the session summary
    pub fn finish(self, now: Instant) -> Option<SessionSummary> {
        self.monitor.stop_session(now)
    }
}

impl Deref for SessionGuard<'_> {
    type Target = DriverMonitor;

    fn deref(&self) -> &Self::Target {
        self.monitor
    }
}

impl DerefMut for SessionGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.monitor
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        if self.monitor.is_active() {
            self.monitor.stop_session(Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerting::{AlarmPhase, AudioError};
    use dms::{FaceBox, FrameSignal, Label};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type Calls = Arc<Mutex<Vec<(&'static str, SoundId)>>>;

    struct SharedSink(Calls);

    impl AudioSink for SharedSink {
        fn play_loop(&mut self, sound: SoundId) -> Result<(), AudioError> {
            self.0.lock().unwrap().push(("play", sound));
            Ok(())
        }

        fn stop(&mut self, sound: SoundId) -> Result<(), AudioError> {
            self.0.lock().unwrap().push(("stop", sound));
            Ok(())
        }
    }

    fn monitor(config: MonitorConfig, cache: u64) -> (DriverMonitor, Calls) {
        let calls = Calls::default();
        let monitor =
            DriverMonitor::new(config, Box::new(SharedSink(calls.clone())), false, cache).unwrap();
        (monitor, calls)
    }

    fn frame(label: Label) -> Observation {
        frame_at_height(label, 240)
    }

    fn frame_at_height(label: Label, nose_y: i32) -> Observation {
        Observation::Classified(FrameSignal {
            left_ear: 0.3,
            right_ear: 0.3,
            mar: 0.1,
            nose_y,
            bbox: FaceBox::default(),
            classifier_label: label,
        })
    }

    fn at(t0: Instant, i: u32) -> Instant {
        t0 + Duration::from_secs(2) * i / 60
    }

    #[test]
    fn test_frames_ignored_without_session() {
        let (mut monitor, _) = monitor(MonitorConfig::default(), 0);
        assert!(monitor.on_frame(&frame(Label::EyesClosed), Instant::now()).is_none());
        assert!(monitor.on_clock(Instant::now()).is_none());
        assert_eq!(monitor.snapshot(Instant::now()).status_text, "STOPPED");
    }

    #[test]
    fn test_sustained_eye_closure_starts_alarm() {
        let t0 = Instant::now();
        let (mut monitor, calls) = monitor(MonitorConfig::default(), 0);
        monitor.start_session(t0).unwrap();

        for i in 0..60 {
            monitor.on_frame(&frame(Label::EyesClosed), at(t0, i));
            assert!(!monitor.snapshot(at(t0, i)).alarm_is_playing);
        }
        let analysis = monitor.on_frame(&frame(Label::EyesClosed), at(t0, 60)).unwrap();
        assert!(analysis.is_warning());

        let snap = monitor.snapshot(at(t0, 60));
        assert!(snap.alarm_is_playing);
        assert_eq!(snap.alarm.phase, AlarmPhase::Playing);
        assert_eq!(snap.score_sleep, 30.5);
        assert!(calls.lock().unwrap().contains(&("play", SoundId::Alarm)));
    }

    #[test]
    fn test_mute_during_nodding_does_not_silence_eye_closure() {
        let t0 = Instant::now();
        let mut config = MonitorConfig::default();
        config.dms.nod_count_thresh = 2;
        let (mut monitor, _) = monitor(config, 0);
        monitor.start_session(t0).unwrap();

        let step = Duration::from_millis(30);
        let mut now = t0;
        for y in [200, 270, 200, 200, 270, 200, 200] {
            monitor.on_frame(&frame_at_height(Label::Normal, y), now);
            now += step;
        }
        assert!(monitor.snapshot(now).alarm_is_playing);

        assert!(monitor.toggle_mute());
        let open_until = now + Duration::from_secs(10);
        while now < open_until {
            monitor.on_frame(&frame_at_height(Label::Normal, 200), now);
            now += step;
        }
        let snap = monitor.snapshot(now);
        assert!(!snap.alarm_is_playing);
        assert_eq!(snap.alarm.phase, AlarmPhase::PlayingMuted);

        let closed_until = now + Duration::from_secs(6);
        while now < closed_until {
            monitor.on_frame(&frame_at_height(Label::EyesClosed, 200), now);
            now += step;
        }
        let snap = monitor.snapshot(now);
        assert!(snap.alarm_is_playing);
        assert!(!snap.alarm.muted);
        assert_eq!(snap.alarm.alarm_count, 2);
    }

    #[test]
    fn test_unrepresentable_durations_rejected() {
        let mut config = MonitorConfig::default();
        config.dms.eye_close_thresh_sec = 1e20;
        assert!(matches!(
            DriverMonitor::new(config, Box::new(alerting::LogAudioSink), false, 0),
            Err(MonitorError::Dms(_))
        ));

        let mut config = MonitorConfig::default();
        config.alarm.alarm_awake_sec = f64::INFINITY;
        assert!(matches!(
            DriverMonitor::new(config, Box::new(alerting::LogAudioSink), false, 0),
            Err(MonitorError::Alert(_))
        ));
    }

    #[test]
    fn test_alarm_stops_after_five_awake_seconds() {
        let t0 = Instant::now();
        let (mut monitor, _) = monitor(MonitorConfig::default(), 0);
        monitor.start_session(t0).unwrap();
        for i in 0..=60 {
            monitor.on_frame(&frame(Label::EyesClosed), at(t0, i));
        }

        let clear = at(t0, 61);
        monitor.on_frame(&frame(Label::Normal), clear);
        monitor.on_frame(&frame(Label::Normal), clear + Duration::from_millis(4_900));
        assert!(monitor.snapshot(clear).alarm_is_playing);
        monitor.on_frame(&frame(Label::Normal), clear + Duration::from_secs(5));
        assert!(!monitor.snapshot(clear).alarm_is_playing);
    }

    #[test]
    fn test_no_face_holds_alarm() {
        let t0 = Instant::now();
        let (mut monitor, _) = monitor(MonitorConfig::default(), 0);
        monitor.start_session(t0).unwrap();
        for i in 0..=60 {
            monitor.on_frame(&frame(Label::EyesClosed), at(t0, i));
        }
        monitor.on_frame(&frame(Label::Normal), at(t0, 61));
        // Face lost well past the awake window: nothing changes
        monitor.on_frame(&Observation::NoFace, at(t0, 61) + Duration::from_secs(10));
        assert!(monitor.snapshot(t0).alarm_is_playing);
        assert_eq!(monitor.snapshot(t0).status_text, "NO FACE");
    }

    #[test]
    fn test_fatigue_warning_tone() {
        let t0 = Instant::now();
        let (mut monitor, calls) = monitor(MonitorConfig::default(), 4 * 3600);
        monitor.start_session(t0).unwrap();

        let reading = monitor.on_clock(t0 + Duration::from_secs(1)).unwrap();
        assert_eq!(reading.event, Some(FatigueEvent::Danger));
        assert!(monitor.snapshot(t0).fatigue_warning_playing);

        // Still high: no second event
        assert_eq!(monitor.on_clock(t0 + Duration::from_secs(2)).unwrap().event, None);
        let plays = calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == ("play", SoundId::FatigueWarning))
            .count();
        assert_eq!(plays, 1);

        assert!(monitor.toggle_mute());
        assert!(!monitor.snapshot(t0).fatigue_warning_playing);
    }

    #[test]
    fn test_stop_commits_drive_time_and_silences() {
        let t0 = Instant::now();
        let (mut monitor, calls) = monitor(MonitorConfig::default(), 100);
        monitor.start_session(t0).unwrap();
        for i in 0..=60 {
            monitor.on_frame(&frame(Label::EyesClosed), at(t0, i));
        }
        monitor.on_clock(t0 + Duration::from_secs(1));

        let summary = monitor.stop_session(t0 + Duration::from_secs(30)).unwrap();
        assert_eq!(summary.session_seconds, 30);
        assert_eq!(summary.daily_seconds, 130);
        assert_eq!(summary.alarm_count, 1);
        assert_eq!(summary.frames, 61);
        assert!(calls.lock().unwrap().ends_with(&[
            ("stop", SoundId::Alarm),
            ("stop", SoundId::FatigueWarning)
        ]));

        let snap = monitor.snapshot(t0);
        assert!(!snap.session_active);
        assert!(!snap.alarm_is_playing);
        assert_eq!(snap.total_seconds, 130);
        assert!(monitor.stop_session(t0).is_none());
    }

    #[test]
    fn test_restart_resets_session_state() {
        let t0 = Instant::now();
        let (mut monitor, _) = monitor(MonitorConfig::default(), 0);
        monitor.start_session(t0).unwrap();
        assert!(matches!(monitor.start_session(t0), Err(MonitorError::SessionActive)));
        for i in 0..10 {
            monitor.on_frame(&frame(Label::EyesClosed), at(t0, i));
        }
        monitor.stop_session(t0 + Duration::from_secs(1));

        let t1 = t0 + Duration::from_secs(60);
        monitor.start_session(t1).unwrap();
        let snap = monitor.snapshot(t1);
        assert_eq!(snap.score_sleep, 0.0);
        assert_eq!(snap.score_alert, 100.0);
        assert_eq!(snap.frames, 0);
        assert_eq!(snap.total_seconds, 1);
    }

    #[test]
    fn test_guard_stops_on_scope_exit() {
        let t0 = Instant::now();
        let (mut monitor, calls) = monitor(MonitorConfig::default(), 0);
        {
            let mut session = monitor.session(t0).unwrap();
            for i in 0..=60 {
                session.on_frame(&frame(Label::EyesClosed), at(t0, i));
            }
            assert!(session.snapshot(t0).alarm_is_playing);
        }
        assert!(!monitor.is_active());
        assert!(!monitor.snapshot(t0).alarm_is_playing);
        assert_eq!(calls.lock().unwrap().last(), Some(&("stop", SoundId::FatigueWarning)));
    }

    #[test]
    fn test_dropping_monitor_stops_audio() {
        let t0 = Instant::now();
        let (mut monitor, calls) = monitor(MonitorConfig::default(), 0);
        monitor.start_session(t0).unwrap();
        for i in 0..=60 {
            monitor.on_frame(&frame(Label::EyesClosed), at(t0, i));
        }
        drop(monitor);
        assert!(calls.lock().unwrap().contains(&("stop", SoundId::Alarm)));
    }

    #[test]
    fn test_degraded_snapshot() {
        let calls = Calls::default();
        let mut monitor =
            DriverMonitor::new(MonitorConfig::default(), Box::new(SharedSink(calls)), true, 0).unwrap();
        let t0 = Instant::now();
        monitor.start_session(t0).unwrap();
        monitor.on_frame(&frame(Label::EyesClosed), t0);
        let snap = monitor.snapshot(t0);
        assert!(snap.degraded);
        assert_eq!(snap.status_text, "MONITORING (NO CLASSIFIER)");
    }
}
