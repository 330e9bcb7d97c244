//! # Web API
//!
//! HTTP boundary of the conversion service, built on axum.
//!
//! - `GET /health`, `GET /ready`, `GET /api/health`: liveness and readiness probes
//! - `POST /api/convert/{kind}`: run one record through the pipeline for `kind`
//! - `GET /metrics`: Prometheus text exposition
//!
//! Errors are rendered as `{"error": "...", "code": "..."}`. Load monitors key off the
//! literal substrings `Circuit breaker` (breaker open) and `temporarily unavailable` /
//! `degraded` (timeout, overload) in 503 bodies, so those texts are stable.

pub mod errors;
pub mod handlers;
pub mod routes;
pub mod state;

use axum::Router;
use std::sync::Arc;

pub use errors::{ApiError, ApiResult};
pub use state::WebState;

/// Build the application router over a shared service
pub fn router(state: Arc<WebState>) -> Router {
    Router::new()
        .merge(routes::health_routes())
        .merge(routes::conversion_routes())
        .merge(routes::metrics_routes())
        .with_state(state)
}
