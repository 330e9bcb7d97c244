//! Route definitions grouped by functionality.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::web::{handlers, state::WebState};

/// Health check routes for monitoring and load balancer probes
pub fn health_routes() -> Router<Arc<WebState>> {
    Router::new()
        .route("/health", get(handlers::health::basic_health))
        .route("/ready", get(handlers::health::readiness_probe))
        .route("/api/health", get(handlers::health::api_health))
}

/// Conversion endpoints
pub fn conversion_routes() -> Router<Arc<WebState>> {
    Router::new().route("/api/convert/{kind}", post(handlers::convert::convert_record))
}

/// Metrics routes for Prometheus scraping
pub fn metrics_routes() -> Router<Arc<WebState>> {
    Router::new().route("/metrics", get(handlers::metrics::prometheus_metrics))
}
