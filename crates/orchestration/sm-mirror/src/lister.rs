//! Key producer: lists a bucket and feeds jobs to the pool.

use futures::StreamExt;
use parking_lot::Mutex;
use sm_error::MirrorError;
use sm_traits::ObjectStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::completion::CompletionTracker;
use crate::context::MirrorContext;
use crate::job::{DeleteTarget, Job};
use crate::pool::WorkerPool;

/// Progress of one lister, shared with its master.
#[derive(Debug, Default)]
pub struct ListerState {
    finished: AtomicBool,
    listed: AtomicU64,
    error: Mutex<Option<MirrorError>>,
}

impl ListerState {
    /// True once the lister produced its last job, failed, or was
    /// interrupted.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Keys listed so far.
    pub fn listed(&self) -> u64 {
        self.listed.load(Ordering::Relaxed)
    }

    pub fn has_failed(&self) -> bool {
        self.error.lock().is_some()
    }

    /// Take the fatal listing error, if any.
    pub fn take_error(&self) -> Option<MirrorError> {
        self.error.lock().take()
    }

    fn finish(&self) {
        self.finished.store(true, Ordering::Release);
    }

    fn fail(&self, error: MirrorError) {
        *self.error.lock() = Some(error);
        self.finish();
    }
}

/// Lists one bucket prefix and turns each key into a job.
pub struct KeyLister {
    ctx: Arc<MirrorContext>,
    store: Arc<dyn ObjectStore>,
    pool: Arc<WorkerPool>,
    tracker: Arc<CompletionTracker>,
    bucket: String,
    prefix: Option<String>,
    delete_target: Option<DeleteTarget>,
    state: Arc<ListerState>,
}

impl KeyLister {
    pub fn new(
        ctx: Arc<MirrorContext>,
        store: Arc<dyn ObjectStore>,
        pool: Arc<WorkerPool>,
        tracker: Arc<CompletionTracker>,
        bucket: impl Into<String>,
        prefix: Option<String>,
        delete_target: Option<DeleteTarget>,
    ) -> Self {
        Self {
            ctx,
            store,
            pool,
            tracker,
            bucket: bucket.into(),
            prefix,
            delete_target,
            state: Arc::new(ListerState::default()),
        }
    }

    pub fn state(&self) -> Arc<ListerState> {
        self.state.clone()
    }

    /// Run the lister on its own task.
    pub fn spawn(self) -> (Arc<ListerState>, JoinHandle<()>) {
        let state = self.state();
        let handle = tokio::spawn(self.run());
        (state, handle)
    }

    /// List every key and submit one job per key.
    ///
    /// Stops at the first listing error, which is recorded as fatal.
    pub async fn run(self) {
        let cancel = self.ctx.cancel_token().clone();

        info!(bucket = %self.bucket, prefix = ?self.prefix, "Listing keys");

        let mut stream = self.store.list_keys(&self.bucket, self.prefix.as_deref());

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(bucket = %self.bucket, "Listing interrupted");
                    break;
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(summary)) => {
                    self.ctx.stats().record_key_listed();
                    self.state.listed.fetch_add(1, Ordering::Relaxed);

                    let job = Job::for_key(
                        self.ctx.clone(),
                        self.store.clone(),
                        summary,
                        self.delete_target,
                        self.tracker.track(),
                    );
                    self.pool.submit(job);
                }
                Some(Err(e)) => {
                    error!(bucket = %self.bucket, prefix = ?self.prefix, error = %e, "Listing failed");
                    drop(stream);
                    self.state.fail(MirrorError::Listing {
                        bucket: self.bucket.clone(),
                        prefix: self.prefix.clone(),
                        source: e,
                    });
                    return;
                }
                None => break,
            }
        }

        debug!(
            bucket = %self.bucket,
            listed = self.state.listed(),
            "Listing finished"
        );
        self.state.finish();
    }
}
