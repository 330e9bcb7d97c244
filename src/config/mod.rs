//! # Pipeline Configuration
//!
//! Flat, serde-driven configuration for the conversion core. One [`PipelineConfig`]
//! feeds every component; the component-specific views (`WorkerPoolConfig`,
//! `CircuitBreakerConfig`, `CacheConfig`) are derived from it so that each component
//! only sees the options it understands.
//!
//! ## Sources
//!
//! Values are layered by [`ConfigManager`]:
//!
//! 1. Built-in defaults ([`PipelineConfig::default`])
//! 2. Optional TOML file (`CONVERSION_CONFIG_PATH`, else `config/conversion.toml`)
//! 3. Environment variables prefixed with `CONVERSION_` (`CONVERSION_POOL_CONCURRENCY=8`)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use conversion_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let pool = manager.config().worker_pool_config();
//! println!("workers: {}", pool.concurrency);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::pool::WorkerPoolConfig;
use crate::resilience::CircuitBreakerConfig;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration for one conversion service instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of parallel workers executing converter calls
    pub pool_concurrency: usize,

    /// Maximum outstanding tasks (queued plus executing) before submissions are rejected
    pub pool_queue_capacity: usize,

    /// Grace period for in-flight tasks when the pool terminates
    pub pool_shutdown_grace_ms: u64,

    /// TTL applied to cached conversion results
    pub cache_ttl_seconds: u64,

    /// Optional bound on cached entries (least-recently-used eviction)
    pub cache_max_entries: Option<usize>,

    /// Optional interval for the background expired-entry sweep
    pub cache_sweep_interval_seconds: Option<u64>,

    /// Failure ratio within the window that trips the breaker (0.0, 1.0]
    pub breaker_failure_threshold: f64,

    /// Minimum outcomes in the window before the ratio is evaluated
    pub breaker_min_samples: u32,

    /// Number of most recent outcomes tracked by the breaker
    pub breaker_window_size: u32,

    /// Time spent open before a probe is admitted
    pub breaker_reset_timeout_ms: u64,

    /// Concurrent probes admitted while half-open
    pub breaker_half_open_max_probes: u32,

    /// Deadline for a dispatched conversion
    pub request_timeout_ms: u64,

    /// Address the HTTP boundary binds to
    pub bind_address: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pool_concurrency: 4,
            pool_queue_capacity: 64,
            pool_shutdown_grace_ms: 5_000,
            cache_ttl_seconds: 300,
            cache_max_entries: Some(10_000),
            cache_sweep_interval_seconds: Some(60),
            breaker_failure_threshold: 0.5,
            breaker_min_samples: 10,
            breaker_window_size: 20,
            breaker_reset_timeout_ms: 30_000,
            breaker_half_open_max_probes: 1,
            request_timeout_ms: 5_000,
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Validate every option, reporting the first offending field
    pub fn validate(&self) -> ConfigResult<()> {
        self.worker_pool_config()
            .validate()
            .map_err(|reason| ConfigurationError::invalid_value("pool", self.pool_concurrency, reason))?;

        self.circuit_breaker_config().validate().map_err(|reason| {
            ConfigurationError::invalid_value("breaker", self.breaker_failure_threshold, reason)
        })?;

        self.cache_config()
            .validate()
            .map_err(|reason| ConfigurationError::invalid_value("cache", self.cache_ttl_seconds, reason))?;

        if self.request_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "request_timeout_ms",
                0,
                "request timeout must be greater than 0",
            ));
        }

        if self.bind_address.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "bind_address",
                "",
                "bind address must not be empty",
            ));
        }

        Ok(())
    }

    pub fn worker_pool_config(&self) -> WorkerPoolConfig {
        WorkerPoolConfig {
            concurrency: self.pool_concurrency,
            queue_capacity: self.pool_queue_capacity,
            shutdown_grace_period: Duration::from_millis(self.pool_shutdown_grace_ms),
        }
    }

    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.breaker_failure_threshold,
            min_samples: self.breaker_min_samples,
            window_size: self.breaker_window_size,
            reset_timeout: Duration::from_millis(self.breaker_reset_timeout_ms),
            half_open_max_probes: self.breaker_half_open_max_probes,
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            default_ttl: Duration::from_secs(self.cache_ttl_seconds),
            max_entries: self.cache_max_entries,
            sweep_interval: self.cache_sweep_interval_seconds.map(Duration::from_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
