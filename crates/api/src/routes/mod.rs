//! HTTP routes

pub mod session;
pub mod status;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::control::ControlError;
use monitor::MonitorError;

/// Error body returned by every route
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        let status = match &self {
            ControlError::Monitor(MonitorError::SessionActive) | ControlError::NoSession => {
                StatusCode::CONFLICT
            }
            ControlError::Monitor(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ControlError::Storage(e) => {
                error!("Storage failure: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}
