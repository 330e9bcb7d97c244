//! # Circuit Breaker Configuration
//!
//! Provides configuration structures and validation for circuit breaker behavior.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a single circuit breaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Failure ratio within the window that opens the circuit, in (0.0, 1.0]
    pub failure_threshold: f64,

    /// Minimum number of outcomes in the window before the ratio is evaluated
    pub min_samples: u32,

    /// Number of most recent outcomes considered
    pub window_size: u32,

    /// Time to wait in open state before admitting a probe
    pub reset_timeout: Duration,

    /// Number of concurrent probes admitted in half-open state
    pub half_open_max_probes: u32,
}

impl CircuitBreakerConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if !(self.failure_threshold > 0.0 && self.failure_threshold <= 1.0) {
            return Err(format!(
                "failure_threshold must be in (0.0, 1.0], got {}",
                self.failure_threshold
            ));
        }

        if self.min_samples == 0 {
            return Err("min_samples must be greater than 0".to_string());
        }

        if self.window_size < self.min_samples {
            return Err(format!(
                "window_size ({}) must be at least min_samples ({})",
                self.window_size, self.min_samples
            ));
        }

        if self.window_size > 10_000 {
            return Err("window_size should not exceed 10000".to_string());
        }

        if self.reset_timeout.is_zero() {
            return Err("reset_timeout must be greater than 0".to_string());
        }

        if self.reset_timeout > Duration::from_secs(3600) {
            return Err("reset_timeout should not exceed 3600 seconds".to_string());
        }

        if self.half_open_max_probes == 0 {
            return Err("half_open_max_probes must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 0.5,
            min_samples: 10,
            window_size: 20,
            reset_timeout: Duration::from_secs(30),
            half_open_max_probes: 1,
        }
    }
}
