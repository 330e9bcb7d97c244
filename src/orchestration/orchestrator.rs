//! # Pipeline Orchestrator
//!
//! Processes one record end to end:
//!
//! ```text
//! Received -> validate -> CacheCheck ─hit──────────────────────────────> Done
//!                              └─miss─> AdmissionCheck ─rejected────────> Done
//!                                           └─admitted─> Dispatched -> Executing
//!                                                 -> Succeeded | Failed | TimedOut -> Done
//! ```
//!
//! Each request moves through these steps strictly in order. No lock is held across the
//! pipeline; the cache, breaker, pool and metrics each synchronise internally.

use serde::Serialize;
use std::fmt::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::cache::{CacheConfig, CacheManager, CacheStats};
use crate::converters::{ConvertedRecord, Converter, Record};
use crate::error::{PipelineError, PipelineResult};
use crate::metrics::performance::header;
use crate::metrics::PerformanceMetrics;
use crate::pool::{PoolStats, WorkerPool, WorkerPoolConfig};
use crate::resilience::{
    BreakerPermit, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState,
};

/// Default deadline for a dispatched conversion
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Health view of one orchestrator and the components it uses
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorHealth {
    pub converter: String,
    pub healthy: bool,
    pub breaker: CircuitBreakerMetrics,
    pub pool: PoolStats,
    pub cache: CacheStats,
}

/// Composes cache, circuit breaker, worker pool and metrics around one converter
#[derive(Debug)]
pub struct PipelineOrchestrator {
    converter: Arc<dyn Converter>,
    cache: Arc<CacheManager<ConvertedRecord>>,
    pool: Arc<WorkerPool>,
    breaker: Arc<CircuitBreaker>,
    metrics: Arc<PerformanceMetrics>,
    request_timeout: Duration,
    cache_ttl: Duration,
    closed: AtomicBool,
}

impl PipelineOrchestrator {
    pub fn builder(converter: Arc<dyn Converter>) -> PipelineOrchestratorBuilder {
        PipelineOrchestratorBuilder::new(converter)
    }

    pub fn converter(&self) -> &Arc<dyn Converter> {
        &self.converter
    }

    pub fn cache(&self) -> &Arc<CacheManager<ConvertedRecord>> {
        &self.cache
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn metrics(&self) -> &Arc<PerformanceMetrics> {
        &self.metrics
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Convert one record through cache, breaker and pool, recording metrics on the way
    #[instrument(
        skip(self, record),
        fields(
            converter = %self.converter.name(),
            request_id = tracing::field::Empty,
            record_id = tracing::field::Empty,
        )
    )]
    pub async fn process_record(&self, record: Record) -> PipelineResult<ConvertedRecord> {
        // Record ids repeat across requests; the in-flight table needs one key per request
        let request_id = Uuid::new_v4().to_string();
        let span = tracing::Span::current();
        span.record("request_id", request_id.as_str());
        if let Some(record_id) = record.id() {
            span.record("record_id", record_id.as_str());
        }

        let started = Instant::now();
        self.metrics.record_request_start(&request_id);

        let result = self.run(record).await;

        let status = match &result {
            Ok(_) => 200,
            Err(error) => {
                self.metrics.record_error(error.kind(), error.message());
                debug!(error_kind = %error.kind(), error = %error, "Request failed");
                error.status_code()
            }
        };
        self.metrics.record_request_end(
            &request_id,
            status,
            started.elapsed().as_millis() as u64,
        );

        result
    }

    async fn run(&self, record: Record) -> PipelineResult<ConvertedRecord> {
        if self.is_closed() {
            return Err(PipelineError::cancelled(format!(
                "{} pipeline has been shut down",
                self.converter.name()
            )));
        }

        // Invalid input never touches cache, breaker or pool
        self.converter.validate(&record)?;

        let key = record.cache_key(self.converter.name());
        if let Some(cached) = self.cache.get(&key) {
            self.metrics.record_cache_hit();
            debug!(cache_key = %key, "Cache HIT");
            return Ok(cached);
        }
        self.metrics.record_cache_miss();

        let permit = self.breaker.try_acquire()?;
        let converted = self.dispatch(record, permit).await?;

        self.cache.set(key, converted.clone(), self.cache_ttl);
        Ok(converted)
    }

    async fn dispatch(
        &self,
        record: Record,
        permit: BreakerPermit<'_>,
    ) -> PipelineResult<ConvertedRecord> {
        let converter = Arc::clone(&self.converter);
        let handle = match self
            .pool
            .submit(move || async move { converter.convert(record).await })
        {
            Ok(handle) => handle,
            Err(error) => {
                // Overload is not the converter's fault
                permit.release();
                return Err(error);
            }
        };

        match handle.wait_timeout(self.request_timeout).await {
            Ok(converted) => {
                permit.record_success();
                Ok(converted)
            }
            Err(error) => {
                match &error {
                    PipelineError::Timeout(_) | PipelineError::Conversion(_) => {
                        permit.record_failure();
                    }
                    _ => permit.release(),
                }
                if matches!(error, PipelineError::Timeout(_)) {
                    warn!(timeout_ms = self.request_timeout.as_millis() as u64, "Conversion timed out");
                }
                Err(error)
            }
        }
    }

    pub fn health(&self) -> OrchestratorHealth {
        let breaker = self.breaker.metrics();
        let pool = self.pool.stats();

        OrchestratorHealth {
            converter: self.converter.name().to_string(),
            healthy: breaker.current_state != CircuitState::Open
                && pool.accepting
                && !self.is_closed(),
            breaker,
            pool,
            cache: self.cache.stats(),
        }
    }

    /// Request metrics plus this orchestrator's breaker, pool and cache gauges
    pub fn render_metrics(&self) -> String {
        render_pipeline_metrics(
            &self.metrics,
            &self.pool,
            &self.cache,
            [(self.converter.name(), self.breaker.metrics())],
        )
    }

    /// Terminate the worker pool and release cached entries. Safe to call more than once.
    pub async fn cleanup(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            debug!(converter = %self.converter.name(), "Cleanup already performed");
            return;
        }

        info!(converter = %self.converter.name(), "Shutting down pipeline");
        self.pool.terminate().await;
        self.cache.shutdown();
    }
}

/// Render request metrics followed by breaker, pool and cache gauges.
///
/// Breakers are labelled by converter so one exposition can cover several pipelines
/// sharing a pool and cache.
pub fn render_pipeline_metrics<'a>(
    metrics: &PerformanceMetrics,
    pool: &WorkerPool,
    cache: &CacheManager<ConvertedRecord>,
    breakers: impl IntoIterator<Item = (&'a str, CircuitBreakerMetrics)>,
) -> String {
    let mut out = metrics.export_metrics();
    let breakers: Vec<_> = breakers.into_iter().collect();

    header(
        &mut out,
        "conversion_circuit_breaker_state",
        "Breaker state (0 closed, 1 open, 2 half-open)",
        "gauge",
    );
    for (name, breaker) in &breakers {
        let _ = writeln!(
            out,
            "conversion_circuit_breaker_state{{converter=\"{name}\"}} {}",
            breaker.current_state as u8
        );
    }

    header(
        &mut out,
        "conversion_circuit_breaker_trips_total",
        "Transitions into the open state",
        "counter",
    );
    for (name, breaker) in &breakers {
        let _ = writeln!(
            out,
            "conversion_circuit_breaker_trips_total{{converter=\"{name}\"}} {}",
            breaker.trips
        );
    }

    header(
        &mut out,
        "conversion_circuit_breaker_rejected_total",
        "Admissions rejected by the breaker",
        "counter",
    );
    for (name, breaker) in &breakers {
        let _ = writeln!(
            out,
            "conversion_circuit_breaker_rejected_total{{converter=\"{name}\"}} {}",
            breaker.rejected_count
        );
    }

    let stats = pool.stats();
    let pool_name = &stats.name;
    header(&mut out, "conversion_pool_in_flight", "Tasks executing", "gauge");
    let _ = writeln!(out, "conversion_pool_in_flight{{pool=\"{pool_name}\"}} {}", stats.in_flight);
    header(&mut out, "conversion_pool_queued", "Tasks waiting for a worker", "gauge");
    let _ = writeln!(out, "conversion_pool_queued{{pool=\"{pool_name}\"}} {}", stats.queued);
    header(
        &mut out,
        "conversion_pool_rejected_total",
        "Submissions rejected as overloaded",
        "counter",
    );
    let _ = writeln!(out, "conversion_pool_rejected_total{{pool=\"{pool_name}\"}} {}", stats.rejected);

    header(&mut out, "conversion_cache_entries", "Entries held in the cache", "gauge");
    let _ = writeln!(out, "conversion_cache_entries {}", cache.len());

    out
}

/// Builder for [`PipelineOrchestrator`]; components not supplied are created from defaults
#[derive(Debug)]
pub struct PipelineOrchestratorBuilder {
    converter: Arc<dyn Converter>,
    cache: Option<Arc<CacheManager<ConvertedRecord>>>,
    pool: Option<Arc<WorkerPool>>,
    breaker: Option<Arc<CircuitBreaker>>,
    metrics: Option<Arc<PerformanceMetrics>>,
    request_timeout: Duration,
    cache_ttl: Option<Duration>,
}

impl PipelineOrchestratorBuilder {
    pub fn new(converter: Arc<dyn Converter>) -> Self {
        Self {
            converter,
            cache: None,
            pool: None,
            breaker: None,
            metrics: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            cache_ttl: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<CacheManager<ConvertedRecord>>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_pool(mut self, pool: Arc<WorkerPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn with_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<PerformanceMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// TTL for cached results; defaults to the cache's own default TTL
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Build the orchestrator. Creating a default worker pool needs a tokio runtime.
    pub fn build(self) -> PipelineResult<PipelineOrchestrator> {
        if self.request_timeout.is_zero() {
            return Err(PipelineError::configuration(
                "request timeout must be greater than 0",
            ));
        }

        let name = self.converter.name().to_string();

        let cache = match self.cache {
            Some(cache) => cache,
            None => Arc::new(CacheManager::new(CacheConfig::default())),
        };
        let pool = match self.pool {
            Some(pool) => pool,
            None => Arc::new(WorkerPool::new(name.clone(), WorkerPoolConfig::default())?),
        };
        let breaker = match self.breaker {
            Some(breaker) => breaker,
            None => Arc::new(CircuitBreaker::new(name.clone(), CircuitBreakerConfig::default())),
        };
        let metrics = self
            .metrics
            .unwrap_or_else(|| Arc::new(PerformanceMetrics::new()));
        let cache_ttl = self.cache_ttl.unwrap_or(cache.config().default_ttl);

        debug!(
            converter = %name,
            request_timeout_ms = self.request_timeout.as_millis() as u64,
            cache_ttl_seconds = cache_ttl.as_secs(),
            "Pipeline orchestrator built"
        );

        Ok(PipelineOrchestrator {
            converter: self.converter,
            cache,
            pool,
            breaker,
            metrics,
            request_timeout: self.request_timeout,
            cache_ttl,
            closed: AtomicBool::new(false),
        })
    }
}
