//! Read-only routes: health, live status, metrics

use axum::{extract::State, Json};
use chrono::Utc;
use monitor::MonitorSnapshot;
use serde::{Deserialize, Serialize};

use crate::SharedState;

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: i64,
    pub version: String,
    pub uptime_seconds: u64,
    pub session_active: bool,
    /// Running without a classifier
    pub degraded: bool,
}

pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let control = state.controller.lock().await;

    Json(HealthResponse {
        status: if control.is_degraded() { "degraded" } else { "healthy" }.to_string(),
        timestamp: Utc::now().timestamp(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        session_active: control.is_active(),
        degraded: control.is_degraded(),
    })
}

/// Dashboard snapshot
pub async fn status(State(state): State<SharedState>) -> Json<MonitorSnapshot> {
    Json(state.controller.lock().await.snapshot())
}

/// Prometheus text exposition
pub async fn metrics(State(state): State<SharedState>) -> String {
    state.metrics.render()
}
