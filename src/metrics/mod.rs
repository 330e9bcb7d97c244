//! # Performance Metrics
//!
//! Process-wide request, cache and error counters for the conversion pipeline, rendered in
//! the Prometheus text exposition format.
//!
//! Instances are constructed explicitly and injected into each orchestrator; there is no
//! global registry.

pub mod performance;

pub use performance::{
    HistogramSnapshot, MetricsSnapshot, PerformanceMetrics, DURATION_BUCKETS_MS,
};
