//! Logging setup and Prometheus metrics

use std::str::FromStr;

use anyhow::Context;
use dms::{FrameAnalysis, WarningCause};
use fatigue::FatigueReading;
use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use monitor::MonitorSnapshot;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::settings::LoggingSettings;

/// Initialize logging
pub fn init_logging(settings: &LoggingSettings) -> anyhow::Result<()> {
    let level = Level::from_str(&settings.level).unwrap_or(Level::INFO);
    let builder = FmtSubscriber::builder().with_max_level(level).with_target(true);

    let installed = if settings.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    installed.context("Failed to set tracing subscriber")
}

/// Install the global Prometheus recorder, returning the render handle
pub fn install_metrics() -> anyhow::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install metrics recorder")
}

pub fn record_frame(analysis: &FrameAnalysis) {
    counter!("dms_frames_total").increment(1);
    if !analysis.face_detected {
        counter!("dms_no_face_frames_total").increment(1);
    }
    for (cause, label) in [
        (WarningCause::EyesClosed, "eyes_closed"),
        (WarningCause::Nodding, "nodding"),
        (WarningCause::Yawning, "yawning"),
    ] {
        if analysis.causes.contains(cause) {
            counter!("dms_warning_frames_total", "cause" => label).increment(1);
        }
    }
    gauge!("dms_score_alert").set(analysis.scores.alert);
    gauge!("dms_score_sleep").set(analysis.scores.sleep);
    gauge!("dms_score_yawn").set(analysis.scores.yawn);
    gauge!("dms_nod_count").set(f64::from(analysis.nod_count));
}

pub fn record_clock(reading: &FatigueReading, snapshot: &MonitorSnapshot) {
    gauge!("dms_fatigue_percent").set(reading.percent);
    if reading.event == Some(fatigue::FatigueEvent::Danger) {
        counter!("dms_fatigue_warnings_total").increment(1);
    }
    gauge!("dms_session_seconds").set(snapshot.session_seconds as f64);
    gauge!("dms_total_drive_seconds").set(snapshot.total_seconds as f64);
    gauge!("dms_alarm_playing").set(if snapshot.alarm_is_playing { 1.0 } else { 0.0 });
    gauge!("dms_alarm_count").set(f64::from(snapshot.alarm.alarm_count));
}
