//! Masters: one lister bound to the shared pool, with completion tracking.

use sm_error::MirrorError;
use sm_traits::ObjectStore;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::completion::CompletionTracker;
use crate::context::MirrorContext;
use crate::job::DeleteTarget;
use crate::lister::{KeyLister, ListerState};
use crate::pool::WorkerPool;

/// What a master lists and what its jobs do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterRole {
    /// Lists the source; copies, moves, or (pure-delete mode) deletes.
    Primary,
    /// Lists the destination; deletes keys missing from the source.
    Prune,
}

impl fmt::Display for MasterRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MasterRole::Primary => f.write_str("primary"),
            MasterRole::Prune => f.write_str("prune"),
        }
    }
}

/// How waiting on a master ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The lister finished and every job it produced has finished
    Done,
    /// The run was cancelled first
    Interrupted,
}

/// Drives one lister against the shared worker pool.
pub struct KeyMaster {
    role: MasterRole,
    ctx: Arc<MirrorContext>,
    store: Arc<dyn ObjectStore>,
    pool: Arc<WorkerPool>,
    tracker: Arc<CompletionTracker>,
    lister: Option<(Arc<ListerState>, JoinHandle<()>)>,
}

impl KeyMaster {
    pub fn new(
        role: MasterRole,
        ctx: Arc<MirrorContext>,
        store: Arc<dyn ObjectStore>,
        pool: Arc<WorkerPool>,
    ) -> Self {
        Self {
            role,
            ctx,
            store,
            pool,
            tracker: CompletionTracker::new(),
            lister: None,
        }
    }

    pub fn role(&self) -> MasterRole {
        self.role
    }

    /// Bucket and prefix this master lists.
    pub fn listing_location(&self) -> (String, Option<String>) {
        let options = self.ctx.options();
        match self.role {
            MasterRole::Primary => (options.source_bucket.clone(), options.source_prefix.clone()),
            MasterRole::Prune => {
                let prefix = options.effective_dest_prefix();
                let prefix = (!prefix.is_empty()).then(|| prefix.to_string());
                (options.dest_bucket.clone(), prefix)
            }
        }
    }

    /// Delete target for this master's jobs, or `None` for copy/move jobs.
    pub fn delete_target(&self) -> Option<DeleteTarget> {
        match self.role {
            MasterRole::Primary if self.ctx.options().delete_source => Some(DeleteTarget::Source),
            MasterRole::Primary => None,
            MasterRole::Prune => Some(DeleteTarget::Destination),
        }
    }

    /// Start the lister. Calling this twice has no effect.
    pub fn start(&mut self) {
        if self.lister.is_some() {
            return;
        }

        let (bucket, prefix) = self.listing_location();
        info!(role = %self.role, bucket = %bucket, prefix = ?prefix, "Starting master");

        let lister = KeyLister::new(
            self.ctx.clone(),
            self.store.clone(),
            self.pool.clone(),
            self.tracker.clone(),
            bucket,
            prefix,
            self.delete_target(),
        );
        self.lister = Some(lister.spawn());
    }

    /// True when the lister has finished producing and no job is outstanding.
    pub fn is_done(&self) -> bool {
        match &self.lister {
            Some((state, _)) => state.is_finished() && self.tracker.outstanding() == 0,
            None => false,
        }
    }

    /// Jobs created by this master that have not finished.
    pub fn outstanding(&self) -> usize {
        self.tracker.outstanding()
    }

    /// Keys listed so far.
    pub fn listed(&self) -> u64 {
        self.lister.as_ref().map(|(state, _)| state.listed()).unwrap_or(0)
    }

    /// Poll until done or cancelled.
    ///
    /// Checks every `poll_interval`; a job completion wakes the loop early.
    pub async fn wait(&self) -> WaitOutcome {
        let cancel = self.ctx.cancel_token();
        let interval = self.ctx.options().poll_interval;

        loop {
            if self.is_done() {
                debug!(role = %self.role, finished = self.tracker.finished(), "Master done");
                return WaitOutcome::Done;
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(role = %self.role, "Master interrupted");
                    return WaitOutcome::Interrupted;
                }
                _ = tokio::time::sleep(interval) => {}
                _ = self.tracker.notified() => {}
            }
        }
    }

    /// Stop the lister if it is still running.
    pub fn stop(&mut self) {
        if let Some((state, handle)) = &self.lister {
            if !state.is_finished() {
                debug!(role = %self.role, "Aborting lister");
                handle.abort();
            }
        }
    }

    /// The fatal listing error, if the lister failed.
    pub fn take_error(&self) -> Option<MirrorError> {
        self.lister.as_ref().and_then(|(state, _)| state.take_error())
    }
}
