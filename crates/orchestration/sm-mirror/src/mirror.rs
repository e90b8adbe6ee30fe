//! Top-level mirror run.

use serde::{Deserialize, Serialize};
use sm_error::{MirrorError, Result};
use sm_traits::ObjectStore;
use sm_types::MirrorOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::context::MirrorContext;
use crate::master::{KeyMaster, MasterRole, WaitOutcome};
use crate::pool::WorkerPool;
use crate::queue::{available_memory, queue_capacity};
use crate::stats::StatsSnapshot;

/// Outcome of a mirror run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorReport {
    pub stats: StatsSnapshot,
    /// The run was cancelled before every master finished
    pub interrupted: bool,
}

/// Runs a complete mirror: a primary master, plus a prune master when
/// extraneous destination keys are deleted, over one shared worker pool.
pub struct MirrorMaster {
    ctx: Arc<MirrorContext>,
    store: Arc<dyn ObjectStore>,
}

impl MirrorMaster {
    pub fn new(options: MirrorOptions, store: Arc<dyn ObjectStore>) -> Self {
        Self::with_cancellation(options, store, CancellationToken::new())
    }

    /// Create a run that stops waiting when `cancel` fires.
    pub fn with_cancellation(
        options: MirrorOptions,
        store: Arc<dyn ObjectStore>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            ctx: Arc::new(MirrorContext::with_cancellation(options, cancel)),
            store,
        }
    }

    /// Shared run context; its stats can be read while the run is active.
    pub fn context(&self) -> &Arc<MirrorContext> {
        &self.ctx
    }

    /// Run to completion.
    ///
    /// Per-key failures only show up in the stats. A listing failure is
    /// returned as [`MirrorError::Listing`] after the pool has stopped.
    pub async fn mirror(&self) -> Result<MirrorReport> {
        let options = self.ctx.options();
        options.validate().map_err(MirrorError::Config)?;

        info!(
            source = %format!("s3://{}/{}", options.source_bucket, options.source_prefix()),
            destination = %format!("s3://{}/{}", options.dest_bucket, options.effective_dest_prefix()),
            mode = mode_name(options),
            dry_run = options.dry_run,
            "Starting mirror"
        );
        if let Some(filter) = &options.age_filter {
            info!("Only acting on objects {}", filter.description());
        }

        let threads = options.max_threads;
        let capacity = match options.queue_capacity {
            Some(capacity) => capacity,
            None => queue_capacity(threads, available_memory()),
        };
        let pool = Arc::new(WorkerPool::start(self.ctx.clone(), threads, capacity));

        let mut primary = KeyMaster::new(
            MasterRole::Primary,
            self.ctx.clone(),
            self.store.clone(),
            pool.clone(),
        );
        primary.start();

        let mut prune = options.prunes_destination().then(|| {
            let mut master = KeyMaster::new(
                MasterRole::Prune,
                self.ctx.clone(),
                self.store.clone(),
                pool.clone(),
            );
            master.start();
            master
        });

        let mut interrupted = primary.wait().await == WaitOutcome::Interrupted;
        if !interrupted {
            if let Some(master) = &prune {
                interrupted = master.wait().await == WaitOutcome::Interrupted;
            }
        }

        primary.stop();
        if let Some(master) = prune.as_mut() {
            master.stop();
        }
        pool.shutdown().await;

        let stats = self.ctx.stats();
        stats.complete();
        let snapshot = stats.snapshot();

        let listing_error = primary
            .take_error()
            .or_else(|| prune.as_ref().and_then(|m| m.take_error()));
        if let Some(e) = listing_error {
            error!(error = %e, "Mirror aborted");
            return Err(e);
        }

        info!(
            copied = snapshot.objects_copied,
            deleted = snapshot.objects_deleted,
            copy_errors = snapshot.copy_errors,
            delete_errors = snapshot.delete_errors,
            bytes = snapshot.bytes_copied,
            interrupted,
            "Mirror completed"
        );

        Ok(MirrorReport {
            stats: snapshot,
            interrupted,
        })
    }
}

fn mode_name(options: &MirrorOptions) -> &'static str {
    match (options.delete_source, options.move_objects, options.delete_removed) {
        (true, _, _) => "delete",
        (false, true, _) => "move",
        (false, false, true) => "copy+prune",
        (false, false, false) => "copy",
    }
}
