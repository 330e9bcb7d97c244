//! # Health Check Handlers
//!
//! Health endpoints for monitoring and load balancing.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::orchestration::OrchestratorHealth;
use crate::web::errors::ApiError;
use crate::web::state::WebState;

/// Basic health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    uptime: f64,
    timestamp: String,
}

/// Readiness response with per-converter detail
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    status: String,
    uptime: f64,
    timestamp: String,
    pipelines: Vec<OrchestratorHealth>,
}

/// Basic health check endpoint: GET /health
///
/// Returns OK while the process is running, even during shutdown.
pub async fn basic_health(State(state): State<Arc<WebState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime: state.uptime_seconds(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Readiness probe: GET /ready
///
/// 503 once the service has started shutting down.
pub async fn readiness_probe(
    State(state): State<Arc<WebState>>,
) -> Result<Json<ReadinessResponse>, ApiError> {
    debug!("Performing readiness probe");

    if !state.service().is_ready() {
        return Err(ApiError::NotReady);
    }

    Ok(Json(ReadinessResponse {
        status: "ready".to_string(),
        uptime: state.uptime_seconds(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        pipelines: state.service().health(),
    }))
}

/// API health endpoint: GET /api/health
///
/// Always 200; `status` is `degraded` while any circuit breaker is open.
pub async fn api_health(State(state): State<Arc<WebState>>) -> Json<HealthResponse> {
    let status = if state.service().is_degraded() {
        "degraded"
    } else {
        "ok"
    };

    Json(HealthResponse {
        status: status.to_string(),
        uptime: state.uptime_seconds(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
