//! Bounded worker pool implementation.

use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Semaphore, TryAcquireError};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::task::{Job, TaskHandle};
use super::WorkerPoolConfig;
use crate::error::{PipelineError, PipelineResult};

/// Lock-free counters shared between the pool and its workers
#[derive(Debug, Default)]
struct PoolCounters {
    submitted: AtomicU64,
    completed: AtomicU64,
    rejected: AtomicU64,
    panicked: AtomicU64,
    cancelled: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Marks a job as executing for as long as it lives; counts it as cancelled if the
/// worker is aborted before the job finished.
struct InFlightGuard<'a> {
    counters: &'a PoolCounters,
    finished: bool,
}

impl<'a> InFlightGuard<'a> {
    fn enter(counters: &'a PoolCounters) -> Self {
        let now = counters.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        counters.peak_in_flight.fetch_max(now, Ordering::AcqRel);
        Self {
            counters,
            finished: false,
        }
    }

    fn finish(mut self) {
        self.finished = true;
        self.counters.completed.fetch_add(1, Ordering::Relaxed);
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::AcqRel);
        if !self.finished {
            self.counters.cancelled.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Point-in-time view of the pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub name: String,
    pub concurrency: usize,
    pub queue_capacity: usize,
    pub submitted: u64,
    pub completed: u64,
    pub rejected: u64,
    pub panicked: u64,
    pub cancelled: u64,
    pub in_flight: usize,
    pub peak_in_flight: usize,
    pub queued: usize,
    pub accepting: bool,
}

/// Fixed-size pool of tokio worker tasks fed by a bounded queue
#[derive(Debug)]
pub struct WorkerPool {
    name: String,
    config: WorkerPoolConfig,
    admission: Arc<Semaphore>,
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<PoolCounters>,
    accepting: AtomicBool,
}

impl WorkerPool {
    /// Create the pool and spawn its workers on the current tokio runtime
    pub fn new(name: impl Into<String>, config: WorkerPoolConfig) -> PipelineResult<Self> {
        let name = name.into();
        config.validate().map_err(PipelineError::Configuration)?;

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            PipelineError::configuration(format!(
                "worker pool '{name}' requires a tokio runtime: {e}"
            ))
        })?;

        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let counters = Arc::new(PoolCounters::default());

        let workers = (0..config.concurrency)
            .map(|worker_id| {
                runtime.spawn(worker_loop(
                    worker_id,
                    name.clone(),
                    Arc::clone(&receiver),
                    Arc::clone(&counters),
                ))
            })
            .collect();

        info!(
            pool = %name,
            concurrency = config.concurrency,
            queue_capacity = config.queue_capacity,
            "Worker pool started"
        );

        Ok(Self {
            admission: Arc::new(Semaphore::new(config.queue_capacity)),
            name,
            config,
            sender: Mutex::new(Some(sender)),
            receiver,
            workers: Mutex::new(workers),
            counters,
            accepting: AtomicBool::new(true),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// Enqueue work without waiting for it.
    ///
    /// Fails immediately with `Overloaded` when `queue_capacity` tasks are already
    /// outstanding, and with `Cancelled` once the pool has been terminated.
    pub fn submit<T, F, Fut>(&self, work: F) -> PipelineResult<TaskHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = PipelineResult<T>> + Send + 'static,
    {
        if !self.is_accepting() {
            return Err(self.shut_down_error());
        }

        let permit = match Arc::clone(&self.admission).try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(
                    pool = %self.name,
                    queue_capacity = self.config.queue_capacity,
                    "Worker pool saturated, rejecting task"
                );
                return Err(PipelineError::overloaded(format!(
                    "worker pool '{}' is at capacity ({} outstanding tasks)",
                    self.name, self.config.queue_capacity
                )));
            }
            Err(TryAcquireError::Closed) => return Err(self.shut_down_error()),
        };

        let id = Uuid::new_v4();
        let submitted_at = Instant::now();
        let (result_tx, result_rx) = oneshot::channel();
        let counters = Arc::clone(&self.counters);
        let pool_name = self.name.clone();

        let run = async move {
            let outcome = AssertUnwindSafe(async move { work().await })
                .catch_unwind()
                .await;

            let result = match outcome {
                Ok(result) => result,
                Err(payload) => {
                    counters.panicked.fetch_add(1, Ordering::Relaxed);
                    let message = panic_message(&*payload);
                    error!(pool = %pool_name, task_id = %id, panic = %message, "Task panicked");
                    Err(PipelineError::conversion(format!("task panicked: {message}")))
                }
            };

            // The waiter may have timed out and gone away
            let _ = result_tx.send(result);
        }
        .boxed();

        let job = Job {
            id,
            submitted_at,
            run,
            permit,
        };

        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            return Err(self.shut_down_error());
        };

        match sender.try_send(job) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                debug!(pool = %self.name, task_id = %id, "Task queued");
                Ok(TaskHandle::new(id, submitted_at, result_rx))
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                Err(PipelineError::overloaded(format!(
                    "worker pool '{}' queue is full",
                    self.name
                )))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(self.shut_down_error()),
        }
    }

    /// Enqueue work and wait for its result
    pub async fn execute<T, F, Fut>(&self, work: F) -> PipelineResult<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = PipelineResult<T>> + Send + 'static,
    {
        self.submit(work)?.wait().await
    }

    /// Stop accepting work, drain within the configured grace period, cancel the rest
    pub async fn terminate(&self) {
        self.terminate_with_grace(self.config.shutdown_grace_period)
            .await;
    }

    /// Stop accepting work, drain within `grace`, cancel the rest. Idempotent.
    pub async fn terminate_with_grace(&self, grace: Duration) {
        if !self.accepting.swap(false, Ordering::AcqRel) {
            debug!(pool = %self.name, "Worker pool already terminated");
            return;
        }

        info!(pool = %self.name, grace_ms = grace.as_millis() as u64, "Terminating worker pool");

        self.admission.close();
        // Closing the queue lets workers finish what is already queued, then exit
        drop(self.sender.lock().take());

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        let abort_handles: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();

        if tokio::time::timeout(grace, futures::future::join_all(handles))
            .await
            .is_err()
        {
            warn!(
                pool = %self.name,
                in_flight = self.counters.in_flight.load(Ordering::Acquire),
                "Grace period elapsed, cancelling remaining tasks"
            );

            for handle in abort_handles {
                handle.abort();
            }

            let mut receiver = self.receiver.lock().await;
            receiver.close();
            while let Ok(job) = receiver.try_recv() {
                self.counters.cancelled.fetch_add(1, Ordering::Relaxed);
                debug!(pool = %self.name, task_id = %job.id, "Queued task cancelled");
            }
        }

        let stats = self.stats();
        info!(
            pool = %self.name,
            completed = stats.completed,
            cancelled = stats.cancelled,
            "Worker pool terminated"
        );
    }

    pub fn stats(&self) -> PoolStats {
        let in_flight = self.counters.in_flight.load(Ordering::Acquire);
        let outstanding = self
            .config
            .queue_capacity
            .saturating_sub(self.admission.available_permits());

        PoolStats {
            name: self.name.clone(),
            concurrency: self.config.concurrency,
            queue_capacity: self.config.queue_capacity,
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            panicked: self.counters.panicked.load(Ordering::Relaxed),
            cancelled: self.counters.cancelled.load(Ordering::Relaxed),
            in_flight,
            peak_in_flight: self.counters.peak_in_flight.load(Ordering::Acquire),
            queued: outstanding.saturating_sub(in_flight),
            accepting: self.is_accepting(),
        }
    }

    fn shut_down_error(&self) -> PipelineError {
        PipelineError::cancelled(format!("worker pool '{}' is shut down", self.name))
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for handle in self.workers.get_mut().drain(..) {
            handle.abort();
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    pool_name: String,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
    counters: Arc<PoolCounters>,
) {
    debug!(pool = %pool_name, worker_id, "Worker started");

    loop {
        let job = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };

        let Some(Job {
            id,
            submitted_at,
            run,
            permit,
        }) = job
        else {
            break;
        };

        debug!(
            pool = %pool_name,
            worker_id,
            task_id = %id,
            queue_wait_ms = submitted_at.elapsed().as_millis() as u64,
            "Task started"
        );

        let guard = InFlightGuard::enter(&counters);
        run.await;
        guard.finish();
        drop(permit);
    }

    debug!(pool = %pool_name, worker_id, "Worker stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
