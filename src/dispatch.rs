//! Task dispatch: offloads analytics jobs to the blocking pool with a
//! timeout, falling back to inline execution when the pool is
//! unavailable or too slow.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Ceiling on how long a pooled job may run before the caller gives up
/// and recomputes inline.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
enum Strategy {
    /// Run jobs on the tokio blocking pool, bounded by a timeout.
    Pool { timeout: Duration },
    /// Run jobs on the caller's thread at submit time.
    Inline,
}

/// Lifetime counters shared by every clone of a dispatcher.
#[derive(Debug, Default)]
pub struct DispatcherStats {
    submitted: AtomicU64,
    completed_on_pool: AtomicU64,
    fallbacks: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub completed_on_pool: u64,
    pub fallbacks: u64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed_on_pool: self.completed_on_pool.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
        }
    }
}

/// Hands analytics jobs to a worker pool, or runs them inline when no
/// runtime is available. Jobs must be pure: the fallback path re-runs
/// the same closure, so side effects would double up.
#[derive(Clone)]
pub struct Dispatcher {
    strategy: Strategy,
    stats: Arc<DispatcherStats>,
}

impl Dispatcher {
    pub fn pool(timeout: Duration) -> Self {
        Self {
            strategy: Strategy::Pool { timeout },
            stats: Arc::new(DispatcherStats::default()),
        }
    }

    pub fn inline() -> Self {
        Self {
            strategy: Strategy::Inline,
            stats: Arc::new(DispatcherStats::default()),
        }
    }

    /// Pool-backed when called inside a tokio runtime, inline otherwise.
    pub fn from_runtime() -> Self {
        Self::from_runtime_with(DEFAULT_TASK_TIMEOUT)
    }

    pub fn from_runtime_with(timeout: Duration) -> Self {
        if tokio::runtime::Handle::try_current().is_ok() {
            Self::pool(timeout)
        } else {
            warn!("no tokio runtime detected, analytics tasks will run inline");
            Self::inline()
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self.strategy, Strategy::Inline)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Submit one job. The closure is cloned so the handle keeps a
    /// private copy for the fallback path.
    pub fn submit<F, R>(&self, label: &str, job: F) -> TaskHandle<R>
    where
        F: FnOnce() -> R + Clone + Send + 'static,
        R: Send + 'static,
    {
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);

        match self.strategy {
            Strategy::Inline => TaskHandle {
                label: label.to_string(),
                state: TaskState::Ready(job()),
            },
            Strategy::Pool { timeout } => {
                let (tx, rx) = oneshot::channel();
                let pooled = job.clone();
                tokio::task::spawn_blocking(move || {
                    // The receiver may have timed out and gone away.
                    let _ = tx.send(pooled());
                });
                debug!(label, "task queued on blocking pool");
                TaskHandle {
                    label: label.to_string(),
                    state: TaskState::Pending {
                        rx,
                        fallback: Box::new(job),
                        timeout,
                        stats: Arc::clone(&self.stats),
                    },
                }
            }
        }
    }

    /// Submit several labeled jobs at once, preserving order.
    pub fn submit_batch<F, R>(&self, jobs: Vec<(String, F)>) -> Vec<(String, TaskHandle<R>)>
    where
        F: FnOnce() -> R + Clone + Send + 'static,
        R: Send + 'static,
    {
        jobs.into_iter()
            .map(|(label, job)| {
                let handle = self.submit(&label, job);
                (label, handle)
            })
            .collect()
    }
}

enum TaskState<R> {
    Ready(R),
    Pending {
        rx: oneshot::Receiver<R>,
        fallback: Box<dyn FnOnce() -> R + Send>,
        timeout: Duration,
        stats: Arc<DispatcherStats>,
    },
}

/// Handle to a submitted job. `join` always produces a value: if the
/// pool misses the deadline or drops the channel, the job runs again on
/// the calling task.
pub struct TaskHandle<R> {
    label: String,
    state: TaskState<R>,
}

impl<R> TaskHandle<R> {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub async fn join(self) -> R {
        match self.state {
            TaskState::Ready(value) => value,
            TaskState::Pending {
                rx,
                fallback,
                timeout,
                stats,
            } => match tokio::time::timeout(timeout, rx).await {
                Ok(Ok(value)) => {
                    stats.completed_on_pool.fetch_add(1, Ordering::Relaxed);
                    value
                }
                Ok(Err(_)) => {
                    warn!(
                        label = %self.label,
                        "worker dropped the result channel, recomputing inline"
                    );
                    stats.fallbacks.fetch_add(1, Ordering::Relaxed);
                    fallback()
                }
                Err(_) => {
                    warn!(
                        label = %self.label,
                        timeout_ms = timeout.as_millis() as u64,
                        "task deadline elapsed, recomputing inline"
                    );
                    stats.fallbacks.fetch_add(1, Ordering::Relaxed);
                    fallback()
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pool_completes_fast_job() {
        let dispatcher = Dispatcher::pool(Duration::from_secs(5));
        let handle = dispatcher.submit("sum", || (1..=100).sum::<i64>());
        assert_eq!(handle.join().await, 5050);

        let stats = dispatcher.stats();
        assert_eq!(stats.submitted, 1);
        assert_eq!(stats.completed_on_pool, 1);
        assert_eq!(stats.fallbacks, 0);
    }

    #[tokio::test]
    async fn test_inline_matches_pool_result() {
        let job = || {
            let values: Vec<f64> = (0..500).map(|i| i as f64 * 0.5).collect();
            values.iter().sum::<f64>()
        };

        let pool = Dispatcher::pool(Duration::from_secs(5));
        let inline = Dispatcher::inline();
        let from_pool = pool.submit("sum", job).join().await;
        let from_inline = inline.submit("sum", job).join().await;
        assert_eq!(from_pool, from_inline);
    }

    #[tokio::test]
    async fn test_timeout_falls_back_inline() {
        let dispatcher = Dispatcher::pool(Duration::from_millis(1));
        let handle = dispatcher.submit("slow", || {
            std::thread::sleep(Duration::from_millis(50));
            42
        });

        // The deadline elapses, then the fallback copy runs inline.
        assert_eq!(handle.join().await, 42);
        let stats = dispatcher.stats();
        assert_eq!(stats.fallbacks, 1);
        assert_eq!(stats.completed_on_pool, 0);
    }

    #[tokio::test]
    async fn test_from_runtime_picks_pool_inside_tokio() {
        let dispatcher = Dispatcher::from_runtime();
        assert!(!dispatcher.is_inline());
    }

    #[test]
    fn test_from_runtime_falls_back_without_tokio() {
        let dispatcher = Dispatcher::from_runtime();
        assert!(dispatcher.is_inline());
    }

    #[tokio::test]
    async fn test_inline_dispatcher_counts_submissions() {
        let dispatcher = Dispatcher::inline();
        let handle = dispatcher.submit("noop", || 7);
        assert_eq!(handle.join().await, 7);

        let stats = dispatcher.stats();
        assert_eq!(stats.submitted, 1);
        // Inline work never touches the pool counters
        assert_eq!(stats.completed_on_pool, 0);
        assert_eq!(stats.fallbacks, 0);
    }

    #[tokio::test]
    async fn test_batch_preserves_labels_and_order() {
        let dispatcher = Dispatcher::pool(Duration::from_secs(5));
        let jobs: Vec<(String, _)> = (0..4)
            .map(|i: u64| (format!("job_{i}"), move || i * 10))
            .collect();

        let handles = dispatcher.submit_batch(jobs);
        assert_eq!(handles.len(), 4);
        for (i, (label, handle)) in handles.into_iter().enumerate() {
            assert_eq!(label, format!("job_{i}"));
            assert_eq!(handle.label(), label);
            assert_eq!(handle.join().await, i as u64 * 10);
        }
    }
}
