//! Health check endpoint.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub listener: &'static str,
}

/// GET /health: reports whether the encoder result listener is still running.
///
/// Answers 503 once the listener has stopped, so an orchestrator can restart
/// the worker.
pub async fn check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    if state.listener_stopped.is_cancelled() {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "degraded",
                listener: "stopped",
            }),
        )
    } else {
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                listener: "running",
            }),
        )
    }
}
