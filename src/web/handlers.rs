//! HTTP request handlers.

use super::AppState;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};

/// Content type of the Prometheus text exposition format.
const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

// ============================================================================
// Metrics
// ============================================================================

pub async fn handle_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = state.exporter.render(&state.metrics.snapshot());
    ([(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)], body)
}

// ============================================================================
// API: Status
// ============================================================================

pub async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let results: Vec<_> = state.metrics.snapshot().into_values().collect();
    Json(results)
}

pub async fn handle_get_target_status(
    State(state): State<AppState>,
    Path(host): Path<String>,
) -> impl IntoResponse {
    match state.metrics.get(&host) {
        Some(result) => Json(result).into_response(),
        None => (StatusCode::NOT_FOUND, format!("unknown target: {}", host)).into_response(),
    }
}
