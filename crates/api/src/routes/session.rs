//! Driver commands: session start/stop and alarm mute

use axum::{
    extract::{Query, State},
    Json,
};
use monitor::MonitorSnapshot;
use serde::{Deserialize, Serialize};
use storage::SessionRecord;
use tracing::info;

use crate::control::ControlError;
use crate::SharedState;

pub async fn start_session(
    State(state): State<SharedState>,
) -> Result<Json<MonitorSnapshot>, ControlError> {
    let snapshot = state.controller.lock().await.start()?;
    info!("Session started via API");
    Ok(Json(snapshot))
}

pub async fn stop_session(
    State(state): State<SharedState>,
) -> Result<Json<SessionRecord>, ControlError> {
    let record = state.controller.lock().await.stop().await?;
    info!("Session {} stopped via API", record.id);
    Ok(Json(record))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MuteResponse {
    pub muted: bool,
}

pub async fn toggle_mute(State(state): State<SharedState>) -> Json<MuteResponse> {
    let muted = state.controller.lock().await.toggle_mute();
    Json(MuteResponse { muted })
}

/// Query parameters for the session history endpoint
#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    20
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionList {
    pub data: Vec<SessionRecord>,
    pub count: usize,
}

pub async fn list_sessions(
    State(state): State<SharedState>,
    Query(params): Query<SessionQuery>,
) -> Result<Json<SessionList>, ControlError> {
    let data = state
        .repository
        .recent_sessions(params.limit.min(500))
        .await?;
    Ok(Json(SessionList {
        count: data.len(),
        data,
    }))
}
