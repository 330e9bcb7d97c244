//! Shared helpers and instrumented converters for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use conversion_core::config::PipelineConfig;
use conversion_core::converters::{ConvertedRecord, Converter, Record};
use conversion_core::error::{PipelineError, PipelineResult};

pub fn record(value: Value) -> Record {
    Record::from_value(value).expect("test record must be an object")
}

/// Small, fast configuration for tests
pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        pool_concurrency: 2,
        pool_queue_capacity: 8,
        pool_shutdown_grace_ms: 500,
        cache_ttl_seconds: 60,
        cache_sweep_interval_seconds: None,
        breaker_failure_threshold: 0.5,
        breaker_min_samples: 4,
        breaker_window_size: 8,
        breaker_reset_timeout_ms: 1_000,
        request_timeout_ms: 1_000,
        bind_address: "127.0.0.1:0".to_string(),
        ..Default::default()
    }
}

/// Counts invocations and echoes `value` back
#[derive(Debug, Default)]
pub struct CountingConverter {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Converter for CountingConverter {
    fn name(&self) -> &str {
        "counting"
    }

    fn validate(&self, record: &Record) -> PipelineResult<()> {
        record
            .get("value")
            .map(|_| ())
            .ok_or_else(|| PipelineError::validation("missing field 'value'"))
    }

    async fn convert(&self, record: Record) -> PipelineResult<ConvertedRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ConvertedRecord::new(
            record.id(),
            "counting",
            json!({ "value": record.get("value").cloned() }),
        ))
    }
}

/// Sleeps before answering; tracks how many conversions run at once
#[derive(Debug)]
pub struct SlowConverter {
    pub delay: Duration,
    pub running: AtomicUsize,
    pub peak: AtomicUsize,
    pub calls: AtomicUsize,
}

impl SlowConverter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Converter for SlowConverter {
    fn name(&self) -> &str {
        "slow"
    }

    fn validate(&self, _record: &Record) -> PipelineResult<()> {
        Ok(())
    }

    async fn convert(&self, record: Record) -> PipelineResult<ConvertedRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(ConvertedRecord::new(record.id(), "slow", json!({"slept_ms": self.delay.as_millis() as u64})))
    }
}

/// Fails while `failing` is set, succeeds otherwise
#[derive(Debug, Default)]
pub struct FlakyConverter {
    pub failing: AtomicBool,
    pub calls: AtomicUsize,
}

impl FlakyConverter {
    pub fn failing() -> Arc<Self> {
        let converter = Self::default();
        converter.failing.store(true, Ordering::SeqCst);
        Arc::new(converter)
    }
}

#[async_trait]
impl Converter for FlakyConverter {
    fn name(&self) -> &str {
        "flaky"
    }

    fn validate(&self, _record: &Record) -> PipelineResult<()> {
        Ok(())
    }

    async fn convert(&self, record: Record) -> PipelineResult<ConvertedRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            Err(PipelineError::conversion("upstream rate table unavailable"))
        } else {
            Ok(ConvertedRecord::new(record.id(), "flaky", json!({"ok": true})))
        }
    }
}

/// Panics on every call
#[derive(Debug, Default)]
pub struct PanickingConverter;

#[async_trait]
impl Converter for PanickingConverter {
    fn name(&self) -> &str {
        "panicking"
    }

    fn validate(&self, _record: &Record) -> PipelineResult<()> {
        Ok(())
    }

    async fn convert(&self, _record: Record) -> PipelineResult<ConvertedRecord> {
        panic!("converter exploded");
    }
}
