//! Frame and clock tick loop
//!
//! Both tick sources run on one task and take the controller lock in turn, so
//! frame analysis and the drive-time clock never interleave.

use std::sync::Arc;
use std::time::Duration;

use dms::Classifier;
use tokio::sync::{watch, Mutex};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::control::Controller;
use crate::source::ReplaySource;

pub struct Pipeline {
    controller: Arc<Mutex<Controller>>,
    source: Option<ReplaySource>,
    classifier: Option<Arc<dyn Classifier>>,
    use_recorded_labels: bool,
    frame_interval: Duration,
}

impl Pipeline {
    pub fn new(
        controller: Arc<Mutex<Controller>>,
        source: Option<ReplaySource>,
        classifier: Option<Arc<dyn Classifier>>,
        use_recorded_labels: bool,
        frame_interval: Duration,
    ) -> Self {
        Self {
            controller,
            source,
            classifier,
            use_recorded_labels,
            frame_interval,
        }
    }

    /// Tick until `shutdown` flips to true
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut frames = interval(self.frame_interval);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut clock = interval(Duration::from_secs(1));
        clock.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Frame pipeline running ({:?} per frame, source: {})",
            self.frame_interval,
            if self.source.is_some() { "replay" } else { "none" }
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = frames.tick(), if self.source.is_some() => {
                    self.frame_tick().await;
                }
                _ = clock.tick() => {
                    if let Some(reading) = self.controller.lock().await.on_clock() {
                        debug!("Fatigue {:.1}% ({:?})", reading.percent, reading.band);
                    }
                }
            }
        }
        info!("Frame pipeline stopped");
    }

    async fn frame_tick(&mut self) {
        let Some(source) = self.source.as_mut() else {
            return;
        };
        let mut control = self.controller.lock().await;
        if !control.is_active() {
            return;
        }

        match source.next_frame() {
            Some(record) => {
                let observation = record.observe(self.use_recorded_labels, self.classifier.as_deref());
                control.on_frame(&observation);
            }
            None => {
                info!("Recording finished, stopping session");
                if let Err(e) = control.stop().await {
                    warn!("Failed to stop session at end of recording: {}", e);
                }
                drop(control);
                self.source = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerting::LogAudioSink;
    use chrono::Local;
    use monitor::{DriverMonitor, MonitorConfig};
    use storage::Repository;

    const CLOSED: &str = r#"{"face": {"left_ear": 0.1, "right_ear": 0.1, "mar": 0.2, "bbox": {"x_min": 0, "y_min": 0, "x_max": 200, "y_max": 200}, "nose": [100, 120]}, "label": 1}"#;

    async fn controller() -> (Arc<Mutex<Controller>>, Repository) {
        let repository = Repository::connect("sqlite::memory:", 1).await.unwrap();
        let monitor =
            DriverMonitor::new(MonitorConfig::default(), Box::new(LogAudioSink), false, 0).unwrap();
        let controller = Controller::new(monitor, repository.clone(), Local::now().date_naive());
        (Arc::new(Mutex::new(controller)), repository)
    }

    /// Poll `done` between frame intervals until it holds, failing after `limit`
    async fn wait_for<F, Fut>(limit: Duration, mut done: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        tokio::time::timeout(limit, async {
            while !done().await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_replay_drives_session_to_completion() {
        let (controller, repository) = controller().await;
        controller.lock().await.start().unwrap();

        let recording = vec![CLOSED; 10].join("\n");
        let source = ReplaySource::parse(&recording, false).unwrap();
        let pipeline = Pipeline::new(controller.clone(), Some(source), None, true, Duration::from_millis(5));

        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(pipeline.run(rx));

        // The stop and its writes finish under the controller lock
        wait_for(Duration::from_secs(10), || {
            let controller = controller.clone();
            async move { !controller.lock().await.is_active() }
        })
        .await;

        tx.send(true).unwrap();
        task.await.unwrap();

        let sessions = repository.recent_sessions(5).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].frames, 10);
    }

    #[tokio::test]
    async fn test_frames_wait_for_session() {
        let (controller, repository) = controller().await;
        let source = ReplaySource::parse(CLOSED, false).unwrap();
        let pipeline = Pipeline::new(controller.clone(), Some(source), None, true, Duration::from_millis(5));
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(pipeline.run(rx));

        // Let several frame ticks pass with no session; a slow runner only makes
        // this weaker, never wrong
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(repository.recent_sessions(5).await.unwrap().is_empty());

        // The single frame is still queued for the first session
        controller.lock().await.start().unwrap();
        wait_for(Duration::from_secs(10), || {
            let controller = controller.clone();
            async move { !controller.lock().await.is_active() }
        })
        .await;

        let sessions = repository.recent_sessions(5).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].frames, 1);

        tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_ends_loop_without_source() {
        let (controller, _) = controller().await;
        let pipeline = Pipeline::new(controller, None, None, false, Duration::from_millis(5));
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(pipeline.run(rx));

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(10), task)
            .await
            .expect("pipeline ignored shutdown")
            .unwrap();
    }
}
