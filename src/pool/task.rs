//! Task handles returned by [`WorkerPool::submit`](super::WorkerPool::submit).

use futures::future::BoxFuture;
use std::time::Duration;
use tokio::sync::{oneshot, OwnedSemaphorePermit};
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};

/// Unit of work queued for a worker.
///
/// The admission permit travels with the job and is released when the job is dropped,
/// whether it ran to completion or was cancelled.
pub(crate) struct Job {
    pub(crate) id: Uuid,
    pub(crate) submitted_at: Instant,
    pub(crate) run: BoxFuture<'static, ()>,
    pub(crate) permit: OwnedSemaphorePermit,
}

/// Caller-side view of a submitted task. Resolves exactly once.
#[derive(Debug)]
pub struct TaskHandle<T> {
    id: Uuid,
    submitted_at: Instant,
    receiver: oneshot::Receiver<PipelineResult<T>>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(
        id: Uuid,
        submitted_at: Instant,
        receiver: oneshot::Receiver<PipelineResult<T>>,
    ) -> Self {
        Self {
            id,
            submitted_at,
            receiver,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn submitted_at(&self) -> Instant {
        self.submitted_at
    }

    /// Wait for the task to finish
    pub async fn wait(self) -> PipelineResult<T> {
        let id = self.id;
        match self.receiver.await {
            Ok(result) => result,
            // Sender dropped without a result: the pool discarded the task
            Err(_) => Err(PipelineError::cancelled(format!(
                "task {id} was cancelled before completion"
            ))),
        }
    }

    /// Wait for the task, giving up after `timeout`.
    ///
    /// On expiry the worker may keep running the task; its result is discarded.
    pub async fn wait_timeout(self, timeout: Duration) -> PipelineResult<T> {
        let id = self.id;
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::timeout(format!(
                "task {id} exceeded its {}ms deadline",
                timeout.as_millis()
            ))),
        }
    }
}
