//! Fixed-size worker pool draining the work queue.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::context::MirrorContext;
use crate::job::Job;
use crate::queue::{PushError, WorkQueue};

/// A fixed set of worker tasks sharing one [`WorkQueue`].
///
/// Each worker takes one job, runs it to completion, then takes the next.
/// Submission never blocks; a full queue drops the job.
#[derive(Debug)]
pub struct WorkerPool {
    ctx: Arc<MirrorContext>,
    queue: Arc<WorkQueue>,
    stop: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
    shutdown_timeout: Duration,
}

impl WorkerPool {
    /// Spawn `threads` workers over a queue of `capacity` slots.
    pub fn start(ctx: Arc<MirrorContext>, threads: usize, capacity: usize) -> Self {
        let queue = Arc::new(WorkQueue::new(capacity));
        let stop = CancellationToken::new();

        let handles = (0..threads.max(1))
            .map(|id| {
                let queue = queue.clone();
                let stop = stop.clone();
                tokio::spawn(async move {
                    worker_loop(id as u32, queue, stop).await;
                })
            })
            .collect();

        info!(threads, capacity = queue.capacity(), "Worker pool started");

        Self {
            shutdown_timeout: ctx.options().shutdown_timeout,
            ctx,
            queue,
            stop,
            handles: Mutex::new(handles),
        }
    }

    /// Offer a job to the queue. Returns `false` if it was dropped.
    pub fn submit(&self, job: Job) -> bool {
        match self.queue.try_push(job) {
            Ok(()) => true,
            Err(PushError::Full(job)) => {
                error!(
                    key = job.key(),
                    capacity = self.queue.capacity(),
                    "Error submitting job, possible queue overflow"
                );
                self.ctx.stats().record_rejected();
                false
            }
            Err(PushError::Closed(job)) => {
                debug!(key = job.key(), "Pool is shut down, dropping job");
                self.ctx.stats().record_rejected();
                false
            }
        }
    }

    /// Jobs waiting in the queue.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Stop the pool.
    ///
    /// New submissions are refused, workers finish the job they hold and
    /// exit, and jobs still queued are discarded. Waits at most the
    /// configured shutdown timeout for workers; stragglers are aborted.
    pub async fn shutdown(&self) {
        self.queue.close();
        self.stop.cancel();

        let handles = std::mem::take(&mut *self.handles.lock());
        if handles.is_empty() {
            return;
        }
        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();

        let shutdown_result =
            tokio::time::timeout(self.shutdown_timeout, futures::future::join_all(handles)).await;

        match shutdown_result {
            Ok(results) => {
                for (i, result) in results.into_iter().enumerate() {
                    if let Err(e) = result {
                        error!(thread = i, error = %e, "Worker thread panicked");
                    }
                }
            }
            Err(_) => {
                warn!("Shutdown timeout exceeded, aborting remaining workers");
                for abort in aborts {
                    abort.abort();
                }
            }
        }

        let discarded = self.queue.close_and_drain().await;
        if discarded > 0 {
            warn!(discarded, "Discarded queued jobs at shutdown");
        }
        debug!("Worker pool stopped");
    }
}

async fn worker_loop(thread_id: u32, queue: Arc<WorkQueue>, stop: CancellationToken) {
    debug!(thread = thread_id, "Worker thread started");

    loop {
        let job = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            job = queue.pop() => match job {
                Some(job) => job,
                None => break,
            },
        };

        job.run().await;
    }

    debug!(thread = thread_id, "Worker thread stopped");
}
