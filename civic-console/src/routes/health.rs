use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use civic_shared::{HealthResponse, HealthStatus};
use std::sync::Arc;

use crate::AppState;

/// Liveness plus a probe of the reports backend.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let response = HealthResponse::healthy("civic-console", env!("CARGO_PKG_VERSION"))
        .with_checks(vec![state.api.health().await]);

    let status = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, Json(response)).into_response()
}

/// Returns Prometheus metrics.
pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state
        .metrics_handle
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}
