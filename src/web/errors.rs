//! # Web API Error Types
//!
//! Maps pipeline errors onto HTTP responses. Uses thiserror for the error type and axum's
//! `IntoResponse` for the conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::error::PipelineError;

/// Web API errors with HTTP status code mappings
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unknown converter '{kind}'")]
    UnknownConverter { kind: String },

    #[error("Invalid request: {message}")]
    BadRequest { message: String },

    #[error("Conversion failed: {message}")]
    Unprocessable { message: String },

    #[error("Circuit breaker is open, service temporarily unavailable: {message}")]
    CircuitBreakerOpen { message: String },

    #[error("Service temporarily unavailable, running degraded: {message}")]
    Degraded { message: String },

    #[error("Service temporarily unavailable: not ready")]
    NotReady,

    #[error("Internal server error")]
    Internal { message: String },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn unknown_converter(kind: impl Into<String>) -> Self {
        Self::UnknownConverter { kind: kind.into() }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::UnknownConverter { .. } => StatusCode::NOT_FOUND,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::CircuitBreakerOpen { .. } | ApiError::Degraded { .. } | ApiError::NotReady => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::UnknownConverter { .. } => "NOT_FOUND",
            ApiError::BadRequest { .. } => "VALIDATION_ERROR",
            ApiError::Unprocessable { .. } => "CONVERSION_ERROR",
            ApiError::CircuitBreakerOpen { .. } => "CIRCUIT_BREAKER_OPEN",
            ApiError::Degraded { .. } => "SERVICE_DEGRADED",
            ApiError::NotReady => "NOT_READY",
            ApiError::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        if let ApiError::Internal { message } = &self {
            tracing::error!(error = %message, "Internal error serving request");
        }

        // Internal details stay in the logs
        let body = json!({
            "error": self.to_string(),
            "code": self.error_code(),
        });

        (status_code, Json(body)).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(error: PipelineError) -> Self {
        match error {
            PipelineError::Validation(message) => ApiError::BadRequest { message },
            PipelineError::Conversion(message) => ApiError::Unprocessable { message },
            PipelineError::CircuitOpen(message) => ApiError::CircuitBreakerOpen { message },
            PipelineError::Timeout(message)
            | PipelineError::Overloaded(message)
            | PipelineError::Cancelled(message) => ApiError::Degraded { message },
            PipelineError::Cache(message) | PipelineError::Configuration(message) => {
                ApiError::Internal { message }
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
