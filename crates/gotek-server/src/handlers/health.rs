//! Health check

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;
use gotek_core::AIBackend;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Configured AI backend, if any
    pub ai: Option<AIStatus>,
    /// Whether bot replies can be sent
    pub whatsapp: bool,
}

#[derive(Serialize)]
pub struct AIStatus {
    pub backend: &'static str,
    pub model: String,
}

/// GET /api/health - Liveness and configured integrations
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        ai: state.ai.as_ref().map(|ai| AIStatus {
            backend: ai.backend_name(),
            model: ai.model().to_string(),
        }),
        whatsapp: state.messenger.is_some(),
    })
}
