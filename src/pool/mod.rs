//! # Worker Pool
//!
//! Fixed-size executor that bounds how many converter calls run in parallel and how
//! many may be outstanding at once.
//!
//! ## Architecture
//!
//! ```text
//! submit() ──try_acquire──> admission semaphore (queue_capacity permits)
//!    │                         └── no permit -> Overloaded (never blocks)
//!    └──try_send──> bounded mpsc queue ──recv──> N worker tasks
//!                                                  └── catch_unwind(work) -> oneshot
//! ```
//!
//! A permit is held from submission until the task finishes, so `queue_capacity`
//! counts queued plus executing tasks. Every submission resolves exactly once through
//! its [`TaskHandle`]: with the task's result, a caught panic, a timeout observed by the
//! waiter, or `Cancelled` when the pool drops it during termination.
//!
//! ## Usage
//!
//! ```rust
//! use conversion_core::pool::{WorkerPool, WorkerPoolConfig};
//! use conversion_core::PipelineError;
//!
//! # tokio_test::block_on(async {
//! let pool = WorkerPool::new("docs", WorkerPoolConfig::default()).unwrap();
//! let doubled = pool.execute(|| async { Ok::<_, PipelineError>(21 * 2) }).await.unwrap();
//! assert_eq!(doubled, 42);
//! pool.terminate().await;
//! # });
//! ```

pub mod task;
pub mod worker_pool;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use task::TaskHandle;
pub use worker_pool::{PoolStats, WorkerPool};

/// Worker pool sizing and shutdown behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    /// Number of worker tasks executing work in parallel
    pub concurrency: usize,

    /// Maximum outstanding tasks (queued plus executing)
    pub queue_capacity: usize,

    /// How long `terminate` waits for in-flight work before cancelling it
    pub shutdown_grace_period: Duration,
}

impl WorkerPoolConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency == 0 {
            return Err("pool concurrency must be greater than 0".to_string());
        }

        if self.concurrency > 1024 {
            return Err("pool concurrency should not exceed 1024".to_string());
        }

        if self.queue_capacity < self.concurrency {
            return Err(format!(
                "pool queue capacity ({}) must be at least the concurrency ({})",
                self.queue_capacity, self.concurrency
            ));
        }

        Ok(())
    }
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            queue_capacity: 64,
            shutdown_grace_period: Duration::from_secs(5),
        }
    }
}
