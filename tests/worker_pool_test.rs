//! Worker pool concurrency bound, backpressure and termination.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use conversion_core::error::{ErrorKind, PipelineError};
use conversion_core::pool::{WorkerPool, WorkerPoolConfig};

fn pool_config(concurrency: usize, queue_capacity: usize) -> WorkerPoolConfig {
    WorkerPoolConfig {
        concurrency,
        queue_capacity,
        shutdown_grace_period: Duration::from_millis(100),
    }
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_bound_runs_in_batches() {
    const CONCURRENCY: usize = 3;
    let task_duration = Duration::from_millis(100);

    let pool = WorkerPool::new("batches", pool_config(CONCURRENCY, CONCURRENCY * 3)).unwrap();
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let started = Instant::now();
    let handles: Vec<_> = (0..CONCURRENCY * 3)
        .map(|i| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            pool.submit(move || async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(task_duration).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, PipelineError>(i)
            })
            .unwrap()
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.wait().await.unwrap());
    }
    let elapsed = started.elapsed();

    results.sort_unstable();
    assert_eq!(results, (0..CONCURRENCY * 3).collect::<Vec<_>>());
    assert!(peak.load(Ordering::SeqCst) <= CONCURRENCY);
    assert_eq!(pool.stats().peak_in_flight, CONCURRENCY);
    assert!(
        elapsed >= task_duration * 3,
        "expected at least three batches, took {elapsed:?}"
    );

    pool.terminate().await;
}

#[tokio::test]
async fn test_submission_past_capacity_fails_immediately() {
    const QUEUE_CAPACITY: usize = 4;
    let pool = WorkerPool::new("backpressure", pool_config(2, QUEUE_CAPACITY)).unwrap();
    let (release_tx, release_rx) = tokio::sync::watch::channel(false);

    let handles: Vec<_> = (0..QUEUE_CAPACITY)
        .map(|_| {
            let mut release = release_rx.clone();
            pool.submit(move || async move {
                let _ = release.wait_for(|go| *go).await;
                Ok::<_, PipelineError>(())
            })
            .unwrap()
        })
        .collect();

    let started = std::time::Instant::now();
    let rejected = pool.submit(|| async { Ok::<_, PipelineError>(()) });
    assert!(started.elapsed() < Duration::from_millis(50));

    let err = rejected.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Overloaded);
    assert!(err.is_retryable());
    assert_eq!(pool.stats().rejected, 1);

    release_tx.send(true).unwrap();
    for handle in handles {
        handle.wait().await.unwrap();
    }

    // Capacity is released as tasks finish
    assert!(pool
        .execute(|| async { Ok::<_, PipelineError>(()) })
        .await
        .is_ok());

    pool.terminate().await;
}

#[tokio::test(start_paused = true)]
async fn test_terminate_cancels_work_past_grace_period() {
    let pool = WorkerPool::new("shutdown", pool_config(1, 3)).unwrap();

    let handles: Vec<_> = (0..3)
        .map(|_| {
            pool.submit(|| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, PipelineError>(())
            })
            .unwrap()
        })
        .collect();

    // Let the single worker pick up the first task
    tokio::task::yield_now().await;

    pool.terminate().await;
    assert!(!pool.is_accepting());

    for handle in handles {
        let err = handle.wait().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }
    assert_eq!(pool.stats().cancelled, 3);

    let err = pool
        .submit(|| async { Ok::<_, PipelineError>(()) })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[tokio::test]
async fn test_terminate_drains_in_flight_work() {
    let pool = WorkerPool::new("drain", pool_config(2, 4)).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            pool.submit(move || async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok::<_, PipelineError>(i * 10)
            })
            .unwrap()
        })
        .collect();

    pool.terminate_with_grace(Duration::from_secs(5)).await;
    pool.terminate().await;

    let mut total = 0;
    for handle in handles {
        total += handle.wait().await.unwrap();
    }
    assert_eq!(total, 60);
    assert_eq!(pool.stats().completed, 4);
    assert_eq!(pool.stats().cancelled, 0);
}
