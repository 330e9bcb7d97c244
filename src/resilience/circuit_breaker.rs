//! # Circuit Breaker Implementation
//!
//! Failure-rate circuit breaker with three states: Closed (normal operation), Open
//! (failing fast) and Half-Open (admitting a bounded number of probes).
//!
//! Admission and outcome reporting are split: [`CircuitBreaker::try_acquire`] hands out a
//! [`BreakerPermit`], and the permit reports the outcome. All state changes happen under a
//! single lock, so two callers can never both take the last probe slot.

use crate::error::PipelineError;
use crate::resilience::{CircuitBreakerConfig, CircuitBreakerMetrics};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed = 0,
    /// Failure mode - all calls fail fast without executing
    Open = 1,
    /// Testing recovery - limited calls allowed to test system health
    HalfOpen = 2,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Open, // Default to safest state
        }
    }
}

/// Errors that can occur during circuit breaker operation
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, rejecting all calls
    #[error("Circuit breaker is open for {component}")]
    CircuitOpen { component: String },

    /// Operation failed and was recorded
    #[error("Operation failed: {0}")]
    OperationFailed(E),
}

impl From<CircuitBreakerError<PipelineError>> for PipelineError {
    fn from(error: CircuitBreakerError<PipelineError>) -> Self {
        match error {
            CircuitBreakerError::CircuitOpen { component } => {
                PipelineError::circuit_open(format!("Circuit breaker is open for {component}"))
            }
            CircuitBreakerError::OperationFailed(inner) => inner,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PermitKind {
    Normal,
    Probe,
}

/// State guarded by the breaker lock
#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    /// Most recent outcomes, `true` = failure
    window: VecDeque<bool>,
    window_failures: u32,
    opened_at: Option<Instant>,
    probes_in_flight: u32,
    /// Bumped on every transition; outcomes admitted under an older generation do not
    /// move the state machine
    generation: u64,
}

#[derive(Debug, Default)]
struct BreakerCounters {
    total_calls: AtomicU64,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    rejected_count: AtomicU64,
    trips: AtomicU64,
}

/// Core circuit breaker implementation
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Component name for logging and metrics
    name: String,

    /// Mirror of the locked state for lock-free reads
    state: AtomicU8,

    config: CircuitBreakerConfig,

    inner: Mutex<BreakerInner>,

    counters: BreakerCounters,
}

/// Admission granted by [`CircuitBreaker::try_acquire`].
///
/// Report the outcome with `record_success` or `record_failure`. Dropping the permit
/// without an outcome frees its probe slot (if it holds one) and changes nothing else.
#[must_use = "report the outcome with record_success or record_failure"]
#[derive(Debug)]
pub struct BreakerPermit<'a> {
    breaker: &'a CircuitBreaker,
    kind: PermitKind,
    generation: u64,
    settled: bool,
}

impl BreakerPermit<'_> {
    /// Whether this permit is a half-open probe
    pub fn is_probe(&self) -> bool {
        self.kind == PermitKind::Probe
    }

    pub fn record_success(mut self) {
        self.settled = true;
        self.breaker.on_success(self.kind, self.generation);
    }

    pub fn record_failure(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.kind, self.generation);
    }

    /// Give the permit back without reporting an outcome
    pub fn release(self) {}
}

impl Drop for BreakerPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.kind == PermitKind::Probe {
            self.breaker.release_probe(self.generation);
        }
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given name and configuration
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        info!(
            component = %name,
            failure_threshold = config.failure_threshold,
            min_samples = config.min_samples,
            window_size = config.window_size,
            reset_timeout_ms = config.reset_timeout.as_millis() as u64,
            "Circuit breaker initialized"
        );

        Self {
            name,
            state: AtomicU8::new(CircuitState::Closed as u8),
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                window: VecDeque::with_capacity(config.window_size as usize),
                window_failures: 0,
                opened_at: None,
                probes_in_flight: 0,
                generation: 0,
            }),
            config,
            counters: BreakerCounters::default(),
        }
    }

    /// Get current circuit state
    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    /// Get component name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Admission check. Fails with `CircuitOpen` while open (before the reset timeout)
    /// or while every half-open probe slot is taken.
    pub fn try_acquire(&self) -> Result<BreakerPermit<'_>, PipelineError> {
        let mut inner = self.inner.lock();

        match inner.state {
            CircuitState::Closed => Ok(self.permit(PermitKind::Normal, inner.generation)),
            CircuitState::Open => {
                let elapsed = match inner.opened_at {
                    Some(opened_at) => opened_at.elapsed(),
                    None => {
                        warn!(component = %self.name, "Circuit open but no timestamp recorded");
                        self.config.reset_timeout
                    }
                };

                if elapsed >= self.config.reset_timeout {
                    self.transition_to_half_open(&mut inner);
                    inner.probes_in_flight = 1;
                    debug!(component = %self.name, "Probe admitted");
                    Ok(self.permit(PermitKind::Probe, inner.generation))
                } else {
                    let retry_in = self.config.reset_timeout - elapsed;
                    Err(self.reject(format!(
                        "Circuit breaker '{}' is open; retry in {}ms",
                        self.name,
                        retry_in.as_millis()
                    )))
                }
            }
            CircuitState::HalfOpen => {
                if inner.probes_in_flight < self.config.half_open_max_probes {
                    inner.probes_in_flight += 1;
                    debug!(component = %self.name, "Probe admitted");
                    Ok(self.permit(PermitKind::Probe, inner.generation))
                } else {
                    Err(self.reject(format!(
                        "Circuit breaker '{}' is half-open; probe already in progress",
                        self.name
                    )))
                }
            }
        }
    }

    /// Execute an operation with circuit breaker protection
    pub async fn call<F, T, E, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self
            .try_acquire()
            .map_err(|_| CircuitBreakerError::CircuitOpen {
                component: self.name.clone(),
            })?;

        let result = operation().await;

        match &result {
            Ok(_) => permit.record_success(),
            Err(_) => permit.record_failure(),
        }

        result.map_err(CircuitBreakerError::OperationFailed)
    }

    /// Force circuit to open state (for emergency situations)
    pub fn force_open(&self) {
        warn!(component = %self.name, "Circuit breaker forced open");
        let mut inner = self.inner.lock();
        self.transition_to_open(&mut inner);
    }

    /// Force circuit to closed state (for emergency recovery)
    pub fn force_closed(&self) {
        warn!(component = %self.name, "Circuit breaker forced closed");
        let mut inner = self.inner.lock();
        self.transition_to_closed(&mut inner);
    }

    /// Get current metrics snapshot
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let inner = self.inner.lock();
        self.metrics_locked(&inner)
    }

    fn metrics_locked(&self, inner: &BreakerInner) -> CircuitBreakerMetrics {
        let total_calls = self.counters.total_calls.load(Ordering::Relaxed);
        let success_count = self.counters.success_count.load(Ordering::Relaxed);
        let window_total = inner.window.len() as u32;

        let failure_rate = if window_total > 0 {
            inner.window_failures as f64 / window_total as f64
        } else {
            0.0
        };
        let success_rate = if total_calls > 0 {
            success_count as f64 / total_calls as f64
        } else {
            0.0
        };

        CircuitBreakerMetrics {
            total_calls,
            success_count,
            failure_count: self.counters.failure_count.load(Ordering::Relaxed),
            rejected_count: self.counters.rejected_count.load(Ordering::Relaxed),
            trips: self.counters.trips.load(Ordering::Relaxed),
            window_total,
            window_failures: inner.window_failures,
            current_state: inner.state,
            failure_rate,
            success_rate,
        }
    }

    /// Check if circuit is healthy (closed state with low failure rate)
    pub fn is_healthy(&self) -> bool {
        self.metrics().is_healthy()
    }

    fn permit(&self, kind: PermitKind, generation: u64) -> BreakerPermit<'_> {
        BreakerPermit {
            breaker: self,
            kind,
            generation,
            settled: false,
        }
    }

    fn reject(&self, message: String) -> PipelineError {
        self.counters.rejected_count.fetch_add(1, Ordering::Relaxed);
        debug!(component = %self.name, "Admission rejected");
        PipelineError::circuit_open(message)
    }

    fn on_success(&self, kind: PermitKind, generation: u64) {
        self.counters.total_calls.fetch_add(1, Ordering::Relaxed);
        self.counters.success_count.fetch_add(1, Ordering::Relaxed);

        let mut inner = self.inner.lock();
        if inner.generation != generation {
            debug!(component = %self.name, "Ignoring outcome from a previous breaker state");
            return;
        }

        match (inner.state, kind) {
            (CircuitState::Closed, _) => Self::push_outcome(&mut inner, false, self.config.window_size),
            (CircuitState::HalfOpen, PermitKind::Probe) => {
                inner.probes_in_flight = inner.probes_in_flight.saturating_sub(1);
                self.transition_to_closed(&mut inner);
            }
            (state, _) => {
                debug!(component = %self.name, state = state.as_str(), "Success recorded outside closed state");
            }
        }
    }

    fn on_failure(&self, kind: PermitKind, generation: u64) {
        self.counters.total_calls.fetch_add(1, Ordering::Relaxed);
        self.counters.failure_count.fetch_add(1, Ordering::Relaxed);

        let mut inner = self.inner.lock();
        if inner.generation != generation {
            debug!(component = %self.name, "Ignoring outcome from a previous breaker state");
            return;
        }

        match (inner.state, kind) {
            (CircuitState::Closed, _) => {
                Self::push_outcome(&mut inner, true, self.config.window_size);
                if self.should_trip(&inner) {
                    self.transition_to_open(&mut inner);
                }
            }
            (CircuitState::HalfOpen, PermitKind::Probe) => {
                // Any probe failure reopens the circuit
                self.transition_to_open(&mut inner);
            }
            (state, _) => {
                debug!(component = %self.name, state = state.as_str(), "Failure recorded outside closed state");
            }
        }
    }

    fn release_probe(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen && inner.generation == generation {
            inner.probes_in_flight = inner.probes_in_flight.saturating_sub(1);
            debug!(component = %self.name, "Probe released without outcome");
        }
    }

    fn push_outcome(inner: &mut BreakerInner, failed: bool, window_size: u32) {
        inner.window.push_back(failed);
        if failed {
            inner.window_failures += 1;
        }
        while inner.window.len() > window_size as usize {
            if inner.window.pop_front() == Some(true) {
                inner.window_failures -= 1;
            }
        }
    }

    fn should_trip(&self, inner: &BreakerInner) -> bool {
        let total = inner.window.len() as u32;
        if total < self.config.min_samples {
            return false;
        }
        inner.window_failures as f64 / total as f64 >= self.config.failure_threshold
    }

    fn set_state(&self, inner: &mut BreakerInner, state: CircuitState) {
        inner.state = state;
        inner.generation += 1;
        self.state.store(state as u8, Ordering::Release);
    }

    /// Transition to closed state (normal operation)
    fn transition_to_closed(&self, inner: &mut BreakerInner) {
        self.set_state(inner, CircuitState::Closed);
        inner.window.clear();
        inner.window_failures = 0;
        inner.opened_at = None;
        inner.probes_in_flight = 0;

        info!(
            component = %self.name,
            summary = %self.metrics_locked(inner).format_summary(),
            "Circuit breaker closed (recovered)"
        );
    }

    /// Transition to open state (failing fast)
    fn transition_to_open(&self, inner: &mut BreakerInner) {
        let window_failures = inner.window_failures;
        let window_total = inner.window.len();

        self.set_state(inner, CircuitState::Open);
        inner.opened_at = Some(Instant::now());
        inner.probes_in_flight = 0;
        self.counters.trips.fetch_add(1, Ordering::Relaxed);

        error!(
            component = %self.name,
            window_failures,
            window_total,
            failure_threshold = self.config.failure_threshold,
            reset_timeout_ms = self.config.reset_timeout.as_millis() as u64,
            summary = %self.metrics_locked(inner).format_summary(),
            "Circuit breaker opened (failing fast)"
        );
    }

    /// Transition to half-open state (testing recovery)
    fn transition_to_half_open(&self, inner: &mut BreakerInner) {
        self.set_state(inner, CircuitState::HalfOpen);
        inner.probes_in_flight = 0;

        info!(
            component = %self.name,
            max_probes = self.config.half_open_max_probes,
            summary = %self.metrics_locked(inner).format_summary(),
            "Circuit breaker half-open (testing recovery)"
        );
    }
}
