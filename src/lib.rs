#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Conversion Core
//!
//! Resilient execution core for an EU to USA record-conversion service.
//!
//! ## Overview
//!
//! The conversion rules themselves (currency, address, date) are small stateless functions.
//! This crate is the machinery around them: every request goes through a TTL cache, a
//! circuit breaker and a bounded worker pool, and leaves counters behind in a metrics
//! registry. Under overload the service answers fast with an explicit error instead of
//! queuing without bound.
//!
//! ## Architecture
//!
//! ```text
//! caller -> PipelineOrchestrator::process_record
//!             ├── Converter::validate          (invalid -> ValidationError)
//!             ├── CacheManager::get            (hit -> done)
//!             ├── CircuitBreaker::try_acquire  (open -> CircuitOpenError)
//!             ├── WorkerPool::submit           (full -> Overloaded)
//!             │     └── Converter::convert     (deadline -> TimeoutError)
//!             ├── CacheManager::set
//!             └── PerformanceMetrics::record_*
//! ```
//!
//! ## Module Organization
//!
//! - [`cache`] - TTL cache with optional LRU bound and background sweep
//! - [`pool`] - Fixed-size worker pool with bounded admission
//! - [`resilience`] - Sliding-window circuit breaker
//! - [`metrics`] - Request/cache/error counters and Prometheus export
//! - [`converters`] - Converter contract and the reference converters
//! - [`orchestration`] - Per-request pipeline
//! - [`service`] - Process-level wiring of all of the above
//! - [`web`] - axum HTTP boundary
//! - [`config`] - Layered configuration (defaults, TOML, environment)
//! - [`error`] - Typed error taxonomy
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use conversion_core::config::PipelineConfig;
//! use conversion_core::converters::{ConverterKind, Record};
//! use conversion_core::service::ConversionService;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = ConversionService::from_config(&PipelineConfig::default())?;
//!
//! let record = Record::from_value(json!({"id": "t1", "amount": 100, "from": "EUR", "to": "USD"}))?;
//! let converted = service.process(ConverterKind::Currency, record).await?;
//! assert_eq!(converted.output["formatted"], "$108.00");
//!
//! service.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests
//! cargo bench --features benchmarks
//! ```

pub mod cache;
pub mod config;
pub mod converters;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestration;
pub mod pool;
pub mod resilience;
pub mod service;
pub mod web;

pub use cache::{CacheConfig, CacheManager};
pub use config::{ConfigManager, PipelineConfig};
pub use converters::{ConvertedRecord, Converter, ConverterKind, Record};
pub use error::{ErrorKind, PipelineError, PipelineResult};
pub use metrics::PerformanceMetrics;
pub use orchestration::PipelineOrchestrator;
pub use pool::{WorkerPool, WorkerPoolConfig};
pub use resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use service::ConversionService;
