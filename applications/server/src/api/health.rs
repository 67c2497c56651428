/// Health check API routes
use axum::{extract::State, Json};
use eve_ts3_sync::EngineState;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub engine: String,
    pub pending_registrations: usize,
}

/// GET /api/health - Health check endpoint
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine = match state.engine.state() {
        EngineState::Running => "running",
        EngineState::Stopping => "stopping",
        EngineState::Stopped => "stopped",
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        engine: engine.to_string(),
        pending_registrations: state.engine.queue().len(),
    })
}
