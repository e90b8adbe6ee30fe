//! Outstanding-job accounting for masters.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::Notify;

/// Counts jobs that were created but have not finished yet.
///
/// Each job holds a [`CompletionGuard`]; dropping the guard decrements the
/// outstanding count and broadcasts to anyone waiting in
/// [`notified`](CompletionTracker::notified). Because the decrement lives in
/// `Drop`, it happens exactly once per job whether the job succeeded,
/// failed, panicked, or was discarded without running.
#[derive(Debug, Default)]
pub struct CompletionTracker {
    outstanding: AtomicUsize,
    finished: AtomicU64,
    notify: Notify,
}

impl CompletionTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a new job and return its guard.
    pub fn track(self: &Arc<Self>) -> CompletionGuard {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        CompletionGuard {
            tracker: Arc::clone(self),
        }
    }

    /// Jobs created but not yet finished.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Jobs finished so far, in any outcome.
    pub fn finished(&self) -> u64 {
        self.finished.load(Ordering::Relaxed)
    }

    /// Resolves on the next job completion.
    ///
    /// Best-effort: a completion that lands before this future is first
    /// polled is not observed. Callers pair it with interval polling.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

/// Completion signal owned by one job.
#[derive(Debug)]
pub struct CompletionGuard {
    tracker: Arc<CompletionTracker>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.tracker.outstanding.fetch_sub(1, Ordering::AcqRel);
        self.tracker.finished.fetch_add(1, Ordering::Relaxed);
        self.tracker.notify.notify_waiters();
    }
}
