//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use super::todos::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub todos: usize,
    pub version: u64,
}

/// GET /health — returns system health and the size of the todo store.
pub async fn check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        todos: state.store.len(),
        version: state.store.version().as_u64(),
    })
}
