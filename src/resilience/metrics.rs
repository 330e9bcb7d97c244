//! # Circuit Breaker Metrics
//!
//! Snapshot of a circuit breaker's counters and window, used by health checks and the
//! metrics exporter.

use crate::resilience::CircuitState;
use serde::{Deserialize, Serialize};

/// Metrics for a single circuit breaker instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    /// Total number of outcomes recorded
    pub total_calls: u64,

    /// Number of successful calls
    pub success_count: u64,

    /// Number of failed calls
    pub failure_count: u64,

    /// Number of admission checks rejected
    pub rejected_count: u64,

    /// Number of Closed/HalfOpen -> Open transitions
    pub trips: u64,

    /// Outcomes currently in the sliding window
    pub window_total: u32,

    /// Failures currently in the sliding window
    pub window_failures: u32,

    /// Current circuit breaker state
    pub current_state: CircuitState,

    /// Failure rate over the sliding window (0.0 to 1.0)
    pub failure_rate: f64,

    /// Lifetime success rate (0.0 to 1.0)
    pub success_rate: f64,
}

impl CircuitBreakerMetrics {
    /// Check if metrics indicate healthy operation
    pub fn is_healthy(&self) -> bool {
        match self.current_state {
            CircuitState::Closed => self.failure_rate < 0.1,
            CircuitState::Open => false,
            CircuitState::HalfOpen => true,
        }
    }

    /// Get human-readable state description
    pub fn state_description(&self) -> &'static str {
        match self.current_state {
            CircuitState::Closed => "Healthy - Normal operation",
            CircuitState::Open => "Failing - Rejecting all calls",
            CircuitState::HalfOpen => "Recovering - Testing system health",
        }
    }

    /// Format metrics for logging
    pub fn format_summary(&self) -> String {
        format!(
            "State: {} | Calls: {} | Success: {:.1}% | Window failures: {}/{} | Rejected: {} | Trips: {}",
            self.state_description(),
            self.total_calls,
            self.success_rate * 100.0,
            self.window_failures,
            self.window_total,
            self.rejected_count,
            self.trips
        )
    }
}
