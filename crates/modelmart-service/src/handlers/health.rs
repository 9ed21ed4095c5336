//! Liveness endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

/// Liveness response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `ok` while the process serves requests.
    pub status: &'static str,
    /// Service name.
    pub service: &'static str,
    /// Crate version.
    pub version: &'static str,
    /// `remote` when inference is delegated over HTTP, `mock` otherwise.
    pub inference: &'static str,
}

/// Report liveness. Touches no storage.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "modelmart",
        version: env!("CARGO_PKG_VERSION"),
        inference: if state.config.inference_url.is_some() {
            "remote"
        } else {
            "mock"
        },
    })
}
