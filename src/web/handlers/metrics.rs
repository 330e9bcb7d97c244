//! # Metrics Handler

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use std::sync::Arc;
use tracing::debug;

use crate::web::state::WebState;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Prometheus metrics endpoint: GET /metrics
pub async fn prometheus_metrics(State(state): State<Arc<WebState>>) -> impl IntoResponse {
    debug!("Serving Prometheus metrics");
    (
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        state.service().export_metrics(),
    )
}
