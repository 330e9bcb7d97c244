//! # Pipeline Error Types
//!
//! Typed error taxonomy shared by every layer of the conversion pipeline. Errors are
//! returned as values through cache, breaker, worker pool and orchestrator; nothing is
//! thrown across a component boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors produced while processing a record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// Input failed shape validation; never retried
    #[error("Validation error: {0}")]
    Validation(String),

    /// The converter rejected or failed to convert the record
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// The dispatched task exceeded its deadline
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Admission rejected by the circuit breaker
    #[error("Circuit breaker open: {0}")]
    CircuitOpen(String),

    /// Worker pool queue is full
    #[error("Overloaded: {0}")]
    Overloaded(String),

    /// Cache failure (process-level, not expected in normal operation)
    #[error("Cache error: {0}")]
    Cache(String),

    /// Task dropped by the worker pool before it completed
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Component constructed with invalid options
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Stable classification of a [`PipelineError`], used as the metrics label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ValidationError,
    ConversionError,
    TimeoutError,
    CircuitOpenError,
    Overloaded,
    CacheError,
    Cancelled,
    ConfigurationError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "ValidationError",
            ErrorKind::ConversionError => "ConversionError",
            ErrorKind::TimeoutError => "TimeoutError",
            ErrorKind::CircuitOpenError => "CircuitOpenError",
            ErrorKind::Overloaded => "Overloaded",
            ErrorKind::CacheError => "CacheError",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::ConfigurationError => "ConfigurationError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PipelineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion(message.into())
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    pub fn circuit_open(message: impl Into<String>) -> Self {
        Self::CircuitOpen(message.into())
    }

    pub fn overloaded(message: impl Into<String>) -> Self {
        Self::Overloaded(message.into())
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Classification used for metrics and boundary mapping
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Validation(_) => ErrorKind::ValidationError,
            PipelineError::Conversion(_) => ErrorKind::ConversionError,
            PipelineError::Timeout(_) => ErrorKind::TimeoutError,
            PipelineError::CircuitOpen(_) => ErrorKind::CircuitOpenError,
            PipelineError::Overloaded(_) => ErrorKind::Overloaded,
            PipelineError::Cache(_) => ErrorKind::CacheError,
            PipelineError::Cancelled(_) => ErrorKind::Cancelled,
            PipelineError::Configuration(_) => ErrorKind::ConfigurationError,
        }
    }

    /// Detail message without the kind prefix
    pub fn message(&self) -> &str {
        match self {
            PipelineError::Validation(msg)
            | PipelineError::Conversion(msg)
            | PipelineError::Timeout(msg)
            | PipelineError::CircuitOpen(msg)
            | PipelineError::Overloaded(msg)
            | PipelineError::Cache(msg)
            | PipelineError::Cancelled(msg)
            | PipelineError::Configuration(msg) => msg,
        }
    }

    /// Whether a caller may retry after backing off
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::Timeout(_)
                | PipelineError::CircuitOpen(_)
                | PipelineError::Overloaded(_)
                | PipelineError::Cancelled(_)
        )
    }

    /// HTTP-equivalent status code for the boundary
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::Validation(_) => 400,
            PipelineError::Conversion(_) => 422,
            PipelineError::Timeout(_)
            | PipelineError::CircuitOpen(_)
            | PipelineError::Overloaded(_)
            | PipelineError::Cancelled(_) => 503,
            PipelineError::Cache(_) | PipelineError::Configuration(_) => 500,
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(error: serde_json::Error) -> Self {
        PipelineError::Validation(format!("JSON serialization error: {error}"))
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
