//! # Conversion Service
//!
//! Process-level composition: one cache, one worker pool and one metrics instance shared by
//! every converter, plus a circuit breaker and orchestrator per converter kind. A failing
//! converter trips only its own breaker.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::cache::CacheManager;
use crate::config::PipelineConfig;
use crate::converters::{ConvertedRecord, Converter, ConverterKind, Record};
use crate::error::{PipelineError, PipelineResult};
use crate::metrics::PerformanceMetrics;
use crate::orchestration::{render_pipeline_metrics, OrchestratorHealth, PipelineOrchestrator};
use crate::pool::WorkerPool;
use crate::resilience::CircuitBreaker;

/// In-flight entries older than this many request timeouts are treated as abandoned
const STALE_REQUEST_FACTOR: u32 = 10;

#[derive(Debug)]
pub struct ConversionService {
    config: PipelineConfig,
    cache: Arc<CacheManager<ConvertedRecord>>,
    pool: Arc<WorkerPool>,
    metrics: Arc<PerformanceMetrics>,
    orchestrators: HashMap<ConverterKind, Arc<PipelineOrchestrator>>,
    started_at: Instant,
    shut_down: AtomicBool,
}

impl ConversionService {
    /// Build the service with the built-in converter for every kind. Needs a tokio runtime.
    pub fn from_config(config: &PipelineConfig) -> PipelineResult<Self> {
        Self::with_converters(
            config,
            ConverterKind::ALL.into_iter().map(|kind| (kind, kind.build())),
        )
    }

    /// Build the service with caller-supplied converters
    pub fn with_converters(
        config: &PipelineConfig,
        converters: impl IntoIterator<Item = (ConverterKind, Arc<dyn Converter>)>,
    ) -> PipelineResult<Self> {
        config.validate()?;

        let cache = Arc::new(CacheManager::new(config.cache_config()));
        if let Some(interval) = cache.config().sweep_interval {
            cache.start_sweeper(interval);
        }

        let pool = Arc::new(WorkerPool::new("conversion", config.worker_pool_config())?);
        let metrics = Arc::new(PerformanceMetrics::new());

        let mut orchestrators = HashMap::new();
        for (kind, converter) in converters {
            let breaker = Arc::new(CircuitBreaker::new(
                kind.as_str(),
                config.circuit_breaker_config(),
            ));
            let orchestrator = PipelineOrchestrator::builder(converter)
                .with_cache(Arc::clone(&cache))
                .with_pool(Arc::clone(&pool))
                .with_breaker(breaker)
                .with_metrics(Arc::clone(&metrics))
                .with_request_timeout(config.request_timeout())
                .build()?;
            orchestrators.insert(kind, Arc::new(orchestrator));
        }

        info!(
            converters = orchestrators.len(),
            concurrency = config.pool_concurrency,
            queue_capacity = config.pool_queue_capacity,
            "Conversion service ready"
        );

        Ok(Self {
            config: config.clone(),
            cache,
            pool,
            metrics,
            orchestrators,
            started_at: Instant::now(),
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<PerformanceMetrics> {
        &self.metrics
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn cache(&self) -> &Arc<CacheManager<ConvertedRecord>> {
        &self.cache
    }

    pub fn orchestrator(&self, kind: ConverterKind) -> Option<&Arc<PipelineOrchestrator>> {
        self.orchestrators.get(&kind)
    }

    pub async fn process(
        &self,
        kind: ConverterKind,
        record: Record,
    ) -> PipelineResult<ConvertedRecord> {
        let orchestrator = self.orchestrator(kind).ok_or_else(|| {
            PipelineError::validation(format!("converter '{kind}' is not configured"))
        })?;
        orchestrator.process_record(record).await
    }

    /// Health of every pipeline, ordered by converter name
    pub fn health(&self) -> Vec<OrchestratorHealth> {
        let mut health: Vec<_> = self.orchestrators.values().map(|o| o.health()).collect();
        health.sort_by(|a, b| a.converter.cmp(&b.converter));
        health
    }

    /// Whether the service can take traffic
    pub fn is_ready(&self) -> bool {
        !self.shut_down.load(Ordering::Acquire) && self.pool.is_accepting()
    }

    /// True when any breaker is open
    pub fn is_degraded(&self) -> bool {
        self.health().iter().any(|h| !h.healthy)
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Prometheus exposition for the whole service, one breaker series per converter.
    ///
    /// Requests that never recorded an end are reaped here before rendering.
    pub fn export_metrics(&self) -> String {
        self.metrics
            .reap_stale(self.config.request_timeout() * STALE_REQUEST_FACTOR);

        let mut kinds: Vec<_> = self.orchestrators.keys().copied().collect();
        kinds.sort_by_key(|kind| kind.as_str());

        let breakers = kinds.iter().filter_map(|kind| {
            self.orchestrators
                .get(kind)
                .map(|o| (kind.as_str(), o.breaker().metrics()))
        });

        render_pipeline_metrics(&self.metrics, &self.pool, &self.cache, breakers)
    }

    /// Stop every pipeline. Safe to call more than once.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        warn!(uptime_secs = self.uptime().as_secs(), "Conversion service shutting down");
        for orchestrator in self.orchestrators.values() {
            orchestrator.cleanup().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::CircuitState;
    use serde_json::json;

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            pool_concurrency: 2,
            pool_queue_capacity: 8,
            cache_sweep_interval_seconds: None,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_service_routes_by_kind() {
        let service = ConversionService::from_config(&test_config()).unwrap();

        let currency = service
            .process(
                ConverterKind::Currency,
                Record::from_value(json!({"amount": 10})).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(currency.kind, "currency");

        let date = service
            .process(
                ConverterKind::Date,
                Record::from_value(json!({"date": "04/07/2024"})).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(date.output["date"], json!("07/04/2024"));

        assert_eq!(service.metrics().snapshot().requests_completed, 2);
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_breakers_are_independent() {
        let service = ConversionService::from_config(&test_config()).unwrap();
        service
            .orchestrator(ConverterKind::Address)
            .unwrap()
            .breaker()
            .force_open();

        assert!(service.is_degraded());
        let currency = service.orchestrator(ConverterKind::Currency).unwrap();
        assert_eq!(currency.breaker().state(), CircuitState::Closed);

        let text = service.export_metrics();
        assert!(text.contains("conversion_circuit_breaker_state{converter=\"address\"} 1"));
        assert!(text.contains("conversion_circuit_breaker_state{converter=\"currency\"} 0"));
        assert!(text.contains("conversion_circuit_breaker_state{converter=\"date\"} 0"));
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let service = ConversionService::from_config(&test_config()).unwrap();
        assert!(service.is_ready());

        service.shutdown().await;
        service.shutdown().await;
        assert!(!service.is_ready());

        let err = service
            .process(
                ConverterKind::Currency,
                Record::from_value(json!({"amount": 1})).unwrap(),
            )
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let config = PipelineConfig {
            pool_concurrency: 0,
            ..Default::default()
        };
        let err = ConversionService::from_config(&config).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }
}
