//! # Result Cache
//!
//! Bounded, TTL-based in-process cache for conversion results.
//!
//! ## Architecture
//!
//! ```text
//! CacheManager<V>
//!   ├── DashMap<String, CacheEntry<V>>   <- sharded; distinct keys never contend
//!   ├── lazy expiry on get()             <- expired entries are never returned
//!   ├── optional LRU bound               <- access tick per entry, sampled eviction
//!   └── optional sweeper task            <- periodic purge, holds a Weak ref only
//! ```
//!
//! The cache is NOT distributed. Each process keeps its own entries.

pub mod manager;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use manager::{CacheManager, CacheStats, EVICTION_SAMPLE_SIZE};

/// Cache behaviour options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL used by `set_default`
    pub default_ttl: Duration,

    /// Maximum number of entries before least-recently-used eviction.
    ///
    /// Eviction samples [`EVICTION_SAMPLE_SIZE`] entries per insert over the limit, so the
    /// cost is constant and the ordering is exact only for stores smaller than the sample.
    pub max_entries: Option<usize>,

    /// Interval of the optional background sweep
    pub sweep_interval: Option<Duration>,
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.default_ttl.is_zero() {
            return Err("cache TTL must be greater than 0".to_string());
        }

        if self.max_entries == Some(0) {
            return Err("cache max_entries must be greater than 0 when set".to_string());
        }

        if self.sweep_interval.is_some_and(|interval| interval.is_zero()) {
            return Err("cache sweep interval must be greater than 0 when set".to_string());
        }

        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(300),
            max_entries: None,
            sweep_interval: None,
        }
    }
}
