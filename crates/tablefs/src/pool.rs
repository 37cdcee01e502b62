//! Bounded worker pool for chunk commit and fetch tasks.
//!
//! The pool is a semaphore shared by every handle of one [`FileStore`].
//! Each write or read owns a [`TaskGroup`]: jobs are dispatched onto
//! blocking threads once a worker slot is free, and the group is always
//! joined before the operation returns.
//!
//! [`FileStore`]: crate::FileStore

use std::sync::Arc;

use tablefs_common::{Error, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Fixed number of concurrent execution slots
#[derive(Clone, Debug)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Create a pool with `size` slots
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::invalid_argument("worker pool size must be positive"));
        }
        Ok(Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        })
    }

    /// Number of slots
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Slots not currently held by a running task
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Start a task group owned by one operation
    pub fn group<T: Send + 'static>(&self, label: &'static str) -> TaskGroup<T> {
        TaskGroup {
            pool: self.clone(),
            label,
            tasks: JoinSet::new(),
            results: Vec::new(),
            first_error: None,
            dispatched: 0,
        }
    }
}

/// Tasks dispatched by a single write or read
///
/// Results come back in completion order. Once a task fails the group
/// reports [`TaskGroup::has_failed`] so the caller stops dispatching;
/// [`TaskGroup::join`] still waits for every dispatched task.
pub struct TaskGroup<T> {
    pool: WorkerPool,
    label: &'static str,
    tasks: JoinSet<Result<T>>,
    results: Vec<T>,
    first_error: Option<Error>,
    dispatched: usize,
}

impl<T: Send + 'static> TaskGroup<T> {
    /// Run `job` on a blocking thread, waiting for a free slot first
    pub async fn spawn<F>(&mut self, job: F) -> Result<()>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let permit = Arc::clone(&self.pool.permits)
            .acquire_owned()
            .await
            .map_err(|e| Error::TaskFailed(e.to_string()))?;
        self.tasks.spawn_blocking(move || {
            let _permit = permit;
            job()
        });
        self.dispatched += 1;
        self.reap();
        Ok(())
    }

    /// Whether any finished task has failed so far
    pub fn has_failed(&mut self) -> bool {
        self.reap();
        self.first_error.is_some()
    }

    /// Number of tasks dispatched so far
    #[must_use]
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    /// Wait for every dispatched task; return all results or the first error
    pub async fn join(self) -> Result<Vec<T>> {
        let (results, error) = self.settle().await;
        error.map_or(Ok(results), Err)
    }

    /// Wait for every dispatched task
    ///
    /// Returns the results of the tasks that succeeded together with the
    /// first error, so callers can undo work that did complete.
    pub async fn settle(mut self) -> (Vec<T>, Option<Error>) {
        while let Some(joined) = self.tasks.join_next().await {
            self.record(joined);
        }
        debug!(
            "{} group joined: {} tasks, {} ok",
            self.label,
            self.dispatched,
            self.results.len()
        );
        (self.results, self.first_error)
    }

    fn reap(&mut self) {
        while let Some(joined) = self.tasks.try_join_next() {
            self.record(joined);
        }
    }

    fn record(&mut self, joined: std::result::Result<Result<T>, tokio::task::JoinError>) {
        let outcome = joined.unwrap_or_else(|e| Err(Error::TaskFailed(e.to_string())));
        match outcome {
            Ok(value) => self.results.push(value),
            Err(e) => {
                warn!("{} task failed: {}", self.label, e);
                if self.first_error.is_none() {
                    self.first_error = Some(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_group_collects_all_results() {
        let pool = WorkerPool::new(4).unwrap();
        let mut group = pool.group("test");
        for i in 0..20u64 {
            group.spawn(move || Ok(i * 2)).await.unwrap();
        }
        assert_eq!(group.dispatched(), 20);
        let mut results = group.join().await.unwrap();
        results.sort_unstable();
        assert_eq!(results, (0..20).map(|i| i * 2).collect::<Vec<_>>());
        assert_eq!(pool.available(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_group_respects_pool_size() {
        let pool = WorkerPool::new(2).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut group = pool.group("bounded");
        for _ in 0..8 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            group
                .spawn(move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(10));
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
                .unwrap();
        }
        group.join().await.unwrap();
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_group_drains_after_failure() {
        let pool = WorkerPool::new(4).unwrap();
        let finished = Arc::new(AtomicUsize::new(0));
        let mut group = pool.group("failing");
        for i in 0..6 {
            let finished = Arc::clone(&finished);
            group
                .spawn(move || {
                    std::thread::sleep(Duration::from_millis(5));
                    finished.fetch_add(1, Ordering::SeqCst);
                    if i == 2 {
                        Err(Error::storage("batch 2 failed"))
                    } else {
                        Ok(i)
                    }
                })
                .await
                .unwrap();
        }
        let err = group.join().await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        // Every dispatched task ran to completion before join returned
        assert_eq!(finished.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_group_reports_panics() {
        let pool = WorkerPool::new(1).unwrap();
        let mut group = pool.group::<()>("panicking");
        group.spawn(|| panic!("worker exploded")).await.unwrap();
        let err = group.join().await.unwrap_err();
        assert!(matches!(err, Error::TaskFailed(_)));
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_has_failed_after_completion() {
        let pool = WorkerPool::new(1).unwrap();
        let mut group = pool.group::<()>("early");
        group.spawn(|| Err(Error::storage("nope"))).await.unwrap();
        let mut failed = group.has_failed();
        for _ in 0..200 {
            if failed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
            failed = group.has_failed();
        }
        assert!(failed);
        assert!(group.join().await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_settle_keeps_successes() {
        let pool = WorkerPool::new(3).unwrap();
        let mut group = pool.group("settle");
        for i in 0..5u64 {
            group
                .spawn(move || {
                    if i == 3 {
                        Err(Error::storage("batch 3 failed"))
                    } else {
                        Ok(i)
                    }
                })
                .await
                .unwrap();
        }
        let (mut done, error) = group.settle().await;
        done.sort_unstable();
        assert_eq!(done, [0, 1, 2, 4]);
        assert!(matches!(error, Some(Error::Storage(_))));
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(matches!(
            WorkerPool::new(0),
            Err(Error::InvalidArgument(_))
        ));
    }
}
