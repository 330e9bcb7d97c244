//! Counter and histogram storage behind [`PerformanceMetrics`].

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::ErrorKind;

/// Upper bounds (inclusive) of the request duration histogram, in milliseconds
pub const DURATION_BUCKETS_MS: [u64; 11] = [5, 10, 25, 50, 100, 250, 500, 1000, 2500, 5000, 10000];

/// Fixed-bucket histogram; counts are per-bucket and made cumulative on export
#[derive(Debug)]
struct DurationHistogram {
    buckets: [AtomicU64; DURATION_BUCKETS_MS.len() + 1],
    sum_ms: AtomicU64,
    count: AtomicU64,
}

impl DurationHistogram {
    fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            sum_ms: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    fn observe(&self, duration_ms: u64) {
        let index = DURATION_BUCKETS_MS
            .iter()
            .position(|bound| duration_ms <= *bound)
            .unwrap_or(DURATION_BUCKETS_MS.len());
        self.buckets[index].fetch_add(1, Ordering::Relaxed);
        self.sum_ms.fetch_add(duration_ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> HistogramSnapshot {
        let mut cumulative = 0;
        let buckets = self
            .buckets
            .iter()
            .map(|bucket| {
                cumulative += bucket.load(Ordering::Relaxed);
                cumulative
            })
            .collect();

        HistogramSnapshot {
            buckets,
            sum_ms: self.sum_ms.load(Ordering::Relaxed),
            count: self.count.load(Ordering::Relaxed),
        }
    }
}

/// Cumulative histogram counts; the last bucket is `+Inf`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramSnapshot {
    pub buckets: Vec<u64>,
    pub sum_ms: u64,
    pub count: u64,
}

/// Point-in-time copy of every counter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub collected_at: DateTime<Utc>,
    pub uptime_seconds: f64,
    pub requests_started: u64,
    pub requests_completed: u64,
    pub requests_abandoned: u64,
    pub requests_in_flight: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub errors_by_kind: BTreeMap<String, u64>,
    pub last_error_by_kind: BTreeMap<String, String>,
    pub responses_by_status: BTreeMap<u16, u64>,
    pub request_duration: HistogramSnapshot,
}

impl MetricsSnapshot {
    pub fn errors_of(&self, kind: ErrorKind) -> u64 {
        self.errors_by_kind.get(kind.as_str()).copied().unwrap_or(0)
    }

    /// Share of lookups served from cache (0.0 when nothing was looked up)
    pub fn cache_hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            0.0
        } else {
            self.cache_hits as f64 / lookups as f64
        }
    }
}

/// Request, cache and error counters shared by all requests in a process.
///
/// Counters only ever increase. The in-flight table is the one piece of state that
/// shrinks: entries leave it when their request ends or when [`reap_stale`] drops them.
///
/// [`reap_stale`]: PerformanceMetrics::reap_stale
#[derive(Debug)]
pub struct PerformanceMetrics {
    started_at: Instant,
    requests_started: AtomicU64,
    requests_completed: AtomicU64,
    requests_abandoned: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    in_flight: DashMap<String, Instant>,
    errors_by_kind: DashMap<ErrorKind, u64>,
    last_error_by_kind: DashMap<ErrorKind, String>,
    responses_by_status: DashMap<u16, u64>,
    request_duration: DurationHistogram,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            requests_started: AtomicU64::new(0),
            requests_completed: AtomicU64::new(0),
            requests_abandoned: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            in_flight: DashMap::new(),
            errors_by_kind: DashMap::new(),
            last_error_by_kind: DashMap::new(),
            responses_by_status: DashMap::new(),
            request_duration: DurationHistogram::new(),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn record_request_start(&self, request_id: &str) {
        self.requests_started.fetch_add(1, Ordering::Relaxed);
        if self
            .in_flight
            .insert(request_id.to_string(), Instant::now())
            .is_some()
        {
            debug!(request_id = %request_id, "Request id reused while still in flight");
        }
    }

    /// Close a request opened by [`record_request_start`](Self::record_request_start).
    ///
    /// An end without a matching start is still counted.
    pub fn record_request_end(&self, request_id: &str, status_code: u16, duration_ms: u64) {
        if self.in_flight.remove(request_id).is_none() {
            debug!(request_id = %request_id, "Request end without a recorded start");
        }
        self.requests_completed.fetch_add(1, Ordering::Relaxed);
        *self.responses_by_status.entry(status_code).or_insert(0) += 1;
        self.request_duration.observe(duration_ms);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, kind: ErrorKind, message: &str) {
        *self.errors_by_kind.entry(kind).or_insert(0) += 1;
        self.last_error_by_kind.insert(kind, message.to_string());
    }

    /// Drop in-flight entries older than `max_age`; returns how many were dropped
    pub fn reap_stale(&self, max_age: Duration) -> usize {
        let before = self.in_flight.len();
        self.in_flight
            .retain(|_, started_at| started_at.elapsed() <= max_age);
        let reaped = before.saturating_sub(self.in_flight.len());

        if reaped > 0 {
            self.requests_abandoned
                .fetch_add(reaped as u64, Ordering::Relaxed);
            warn!(reaped, max_age_ms = max_age.as_millis() as u64, "Reaped stale in-flight requests");
        }
        reaped
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            collected_at: Utc::now(),
            uptime_seconds: self.uptime().as_secs_f64(),
            requests_started: self.requests_started.load(Ordering::Relaxed),
            requests_completed: self.requests_completed.load(Ordering::Relaxed),
            requests_abandoned: self.requests_abandoned.load(Ordering::Relaxed),
            requests_in_flight: self.in_flight.len(),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            errors_by_kind: self
                .errors_by_kind
                .iter()
                .map(|entry| (entry.key().as_str().to_string(), *entry.value()))
                .collect(),
            last_error_by_kind: self
                .last_error_by_kind
                .iter()
                .map(|entry| (entry.key().as_str().to_string(), entry.value().clone()))
                .collect(),
            responses_by_status: self
                .responses_by_status
                .iter()
                .map(|entry| (*entry.key(), *entry.value()))
                .collect(),
            request_duration: self.request_duration.snapshot(),
        }
    }

    /// Render all counters in the Prometheus text exposition format (0.0.4)
    pub fn export_metrics(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = String::with_capacity(2048);

        counter(
            &mut out,
            "conversion_requests_started_total",
            "Requests received by the pipeline",
            snapshot.requests_started,
        );
        counter(
            &mut out,
            "conversion_requests_completed_total",
            "Requests that finished with a response",
            snapshot.requests_completed,
        );
        counter(
            &mut out,
            "conversion_requests_abandoned_total",
            "Requests reaped without a recorded end",
            snapshot.requests_abandoned,
        );
        gauge(
            &mut out,
            "conversion_requests_in_flight",
            "Requests currently being processed",
            snapshot.requests_in_flight as f64,
        );
        counter(
            &mut out,
            "conversion_cache_hits_total",
            "Conversion cache hits",
            snapshot.cache_hits,
        );
        counter(
            &mut out,
            "conversion_cache_misses_total",
            "Conversion cache misses",
            snapshot.cache_misses,
        );

        header(&mut out, "conversion_errors_total", "Errors by kind", "counter");
        for (kind, count) in &snapshot.errors_by_kind {
            let _ = writeln!(out, "conversion_errors_total{{kind=\"{kind}\"}} {count}");
        }

        header(
            &mut out,
            "conversion_responses_total",
            "Responses by status code",
            "counter",
        );
        for (status, count) in &snapshot.responses_by_status {
            let _ = writeln!(out, "conversion_responses_total{{status=\"{status}\"}} {count}");
        }

        header(
            &mut out,
            "conversion_request_duration_ms",
            "Request duration in milliseconds",
            "histogram",
        );
        let histogram = &snapshot.request_duration;
        for (bound, count) in DURATION_BUCKETS_MS.iter().zip(&histogram.buckets) {
            let _ = writeln!(
                out,
                "conversion_request_duration_ms_bucket{{le=\"{bound}\"}} {count}"
            );
        }
        let _ = writeln!(
            out,
            "conversion_request_duration_ms_bucket{{le=\"+Inf\"}} {}",
            histogram.count
        );
        let _ = writeln!(out, "conversion_request_duration_ms_sum {}", histogram.sum_ms);
        let _ = writeln!(out, "conversion_request_duration_ms_count {}", histogram.count);

        gauge(
            &mut out,
            "conversion_uptime_seconds",
            "Seconds since the metrics were created",
            snapshot.uptime_seconds,
        );

        out
    }
}

pub(crate) fn header(out: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {kind}");
}

pub(crate) fn counter(out: &mut String, name: &str, help: &str, value: u64) {
    header(out, name, help, "counter");
    let _ = writeln!(out, "{name} {value}");
}

pub(crate) fn gauge(out: &mut String, name: &str, help: &str, value: f64) {
    header(out, name, help, "gauge");
    let _ = writeln!(out, "{name} {value}");
}
