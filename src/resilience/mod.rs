//! # Resilience Module
//!
//! Circuit breaker protecting each converter from cascading failure.
//!
//! ## Architecture
//!
//! - **Circuit Breakers**: Sliding-window failure-rate breaker with bounded half-open probing
//! - **Metrics Collection**: Outcome counters, window state and trip counts per breaker
//! - **Configuration**: Thresholds validated before a breaker is built
//!
//! ## Usage
//!
//! ```rust,no_run
//! use conversion_core::resilience::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CircuitBreakerConfig {
//!     failure_threshold: 0.5,
//!     min_samples: 10,
//!     window_size: 20,
//!     reset_timeout: Duration::from_secs(30),
//!     half_open_max_probes: 1,
//! };
//!
//! let breaker = CircuitBreaker::new("currency", config);
//!
//! let result = breaker.call(|| async {
//!     Ok::<&str, std::io::Error>("converted")
//! }).await?;
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod config;
pub mod metrics;

pub use circuit_breaker::{BreakerPermit, CircuitBreaker, CircuitBreakerError, CircuitState};
pub use config::CircuitBreakerConfig;
pub use metrics::CircuitBreakerMetrics;
