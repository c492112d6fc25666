//! Serial background execution context
//!
//! All reconciliation work runs on one `SerialQueue`. Jobs run one at a time,
//! in submission order, each to completion before the next starts. Jobs may
//! block (OS enumeration does), so each one runs on tokio's blocking pool while
//! the single worker task waits for it.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Cloneable handle to a single-worker FIFO queue
#[derive(Clone)]
pub struct SerialQueue {
    label: Arc<str>,
    tx: mpsc::UnboundedSender<Job>,
}

impl SerialQueue {
    /// Spawn the worker on the current tokio runtime
    ///
    /// The worker exits once every handle has been dropped and the backlog is
    /// drained.
    pub fn spawn(label: impl Into<String>) -> Self {
        let label: Arc<str> = Arc::from(label.into());
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        let worker_label = label.clone();
        tokio::spawn(async move {
            debug!(queue = %worker_label, "Serial queue started");
            while let Some(job) = rx.recv().await {
                if let Err(e) = tokio::task::spawn_blocking(job).await {
                    error!(queue = %worker_label, error = %e, "Queued job panicked");
                }
            }
            debug!(queue = %worker_label, "Serial queue stopped");
        });

        Self { label, tx }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Enqueue a job; callable from any thread, never blocks
    ///
    /// Returns `false` when the worker is gone and the job was dropped.
    pub fn dispatch<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx.send(Box::new(job)).is_ok()
    }

    /// Wait until every job enqueued before this call has finished
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        let enqueued = self.dispatch(move || {
            let _ = done_tx.send(());
        });
        if enqueued {
            let _ = done_rx.await;
        }
    }
}

impl std::fmt::Debug for SerialQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialQueue")
            .field("label", &self.label)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_jobs_run_in_submission_order() {
        let queue = SerialQueue::spawn("test");
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..20 {
            let order = order.clone();
            queue.dispatch(move || {
                // Earlier jobs sleep longer; order must still hold.
                std::thread::sleep(Duration::from_millis((20 - i) as u64 / 4));
                order.lock().unwrap().push(i);
            });
        }
        queue.flush().await;

        assert_eq!(*order.lock().unwrap(), (0..20).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_jobs_never_overlap() {
        let queue = SerialQueue::spawn("test");
        let running = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let running = running.clone();
            let max_seen = max_seen.clone();
            queue.dispatch(move || {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(2));
                running.fetch_sub(1, Ordering::SeqCst);
            });
        }
        queue.flush().await;

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dispatch_from_foreign_thread() {
        let queue = SerialQueue::spawn("test");
        let hits = Arc::new(AtomicUsize::new(0));

        let handle = {
            let queue = queue.clone();
            let hits = hits.clone();
            std::thread::spawn(move || {
                queue.dispatch(move || {
                    hits.fetch_add(1, Ordering::SeqCst);
                })
            })
        };
        assert!(handle.join().unwrap());
        queue.flush().await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_stop_queue() {
        let queue = SerialQueue::spawn("test");
        let hits = Arc::new(AtomicUsize::new(0));

        queue.dispatch(|| panic!("boom"));
        let after = hits.clone();
        queue.dispatch(move || {
            after.fetch_add(1, Ordering::SeqCst);
        });
        queue.flush().await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
