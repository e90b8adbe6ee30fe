//! Per-key jobs.
//!
//! Every listed key becomes exactly one [`Job`]. A job runs in three
//! phases on a single worker:
//!
//! 1. **Key mapping** - the counterpart key is computed at construction
//!    ([`dest_key_for`] / [`source_key_for`]).
//! 2. **Decision** - [`KeyJob::should_act`] checks the age filter and looks
//!    up the counterpart object.
//! 3. **Execution** - [`KeyJob::execute`] performs the mutating call(s)
//!    under the retry policy and updates stats.
//!
//! The job carries a [`CompletionGuard`], so finalization happens when the
//! job is dropped: after it runs, or when it is discarded unrun.

mod copy;
mod decision;
mod delete;
pub mod retry;

pub use copy::CopyJob;
pub use delete::{DeleteJob, DeleteTarget};
pub use retry::{RetryOutcome, RetryPolicy, with_retry};

use async_trait::async_trait;
use sm_traits::ObjectStore;
use sm_types::{KeySummary, MirrorOptions};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::completion::CompletionGuard;
use crate::context::MirrorContext;

/// The closed set of job variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Copy,
    Move,
    MultipartCopy,
    MultipartMove,
    Delete,
}

impl JobKind {
    /// Pick the job kind for a listed key.
    ///
    /// `deleting` is true for masters that only ever delete (prune pass or
    /// pure-delete mode).
    pub fn for_key(options: &MirrorOptions, summary: &KeySummary, deleting: bool) -> Self {
        if deleting {
            return JobKind::Delete;
        }

        let multipart = summary.size > options.multipart_threshold;
        match (multipart, options.move_objects) {
            (true, true) => JobKind::MultipartMove,
            (true, false) => JobKind::MultipartCopy,
            (false, true) => JobKind::Move,
            (false, false) => JobKind::Copy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Copy => "copy",
            JobKind::Move => "move",
            JobKind::MultipartCopy => "multipart-copy",
            JobKind::MultipartMove => "multipart-move",
            JobKind::Delete => "delete",
        }
    }

    pub fn is_move(&self) -> bool {
        matches!(self, JobKind::Move | JobKind::MultipartMove)
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self, JobKind::MultipartCopy | JobKind::MultipartMove)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination key for a source key: the source prefix is replaced by the
/// destination prefix.
///
/// Keys that do not start with the source prefix are passed through.
pub fn dest_key_for(options: &MirrorOptions, source_key: &str) -> String {
    remap(source_key, options.source_prefix(), options.effective_dest_prefix())
}

/// Source key for a destination key; the inverse of [`dest_key_for`].
pub fn source_key_for(options: &MirrorOptions, dest_key: &str) -> String {
    remap(dest_key, options.effective_dest_prefix(), options.source_prefix())
}

fn remap(key: &str, from: &str, to: &str) -> String {
    match key.strip_prefix(from) {
        Some(rest) => format!("{to}{rest}"),
        None => key.to_string(),
    }
}

/// Behavior shared by every job variant.
#[async_trait]
pub trait KeyJob: Send + Sync {
    fn kind(&self) -> JobKind;

    /// The listed key this job was built from.
    fn summary(&self) -> &KeySummary;

    /// The counterpart key in the opposite bucket.
    fn counterpart_key(&self) -> &str;

    /// Human-readable description of the mutating action, used for dry runs.
    fn describe(&self) -> String;

    /// Decide whether the key needs action.
    async fn should_act(&self) -> bool;

    /// Perform the action under the retry policy and update stats.
    async fn execute(&self);
}

/// The concrete job body.
#[derive(Debug)]
pub enum JobTask {
    Copy(CopyJob),
    Delete(DeleteJob),
}

#[async_trait]
impl KeyJob for JobTask {
    fn kind(&self) -> JobKind {
        match self {
            JobTask::Copy(job) => job.kind(),
            JobTask::Delete(job) => job.kind(),
        }
    }

    fn summary(&self) -> &KeySummary {
        match self {
            JobTask::Copy(job) => job.summary(),
            JobTask::Delete(job) => job.summary(),
        }
    }

    fn counterpart_key(&self) -> &str {
        match self {
            JobTask::Copy(job) => job.counterpart_key(),
            JobTask::Delete(job) => job.counterpart_key(),
        }
    }

    fn describe(&self) -> String {
        match self {
            JobTask::Copy(job) => job.describe(),
            JobTask::Delete(job) => job.describe(),
        }
    }

    async fn should_act(&self) -> bool {
        match self {
            JobTask::Copy(job) => job.should_act().await,
            JobTask::Delete(job) => job.should_act().await,
        }
    }

    async fn execute(&self) {
        match self {
            JobTask::Copy(job) => job.execute().await,
            JobTask::Delete(job) => job.execute().await,
        }
    }
}

/// A queued unit of work bound to one listed key.
pub struct Job {
    task: JobTask,
    ctx: Arc<MirrorContext>,
    _guard: CompletionGuard,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("kind", &self.task.kind())
            .field("key", &self.task.summary().key)
            .finish()
    }
}

impl Job {
    /// Build the job for `summary` according to the dispatch rule.
    pub fn for_key(
        ctx: Arc<MirrorContext>,
        store: Arc<dyn ObjectStore>,
        summary: KeySummary,
        delete_target: Option<DeleteTarget>,
        guard: CompletionGuard,
    ) -> Self {
        let kind = JobKind::for_key(ctx.options(), &summary, delete_target.is_some());

        let task = match delete_target {
            Some(target) => JobTask::Delete(DeleteJob::new(ctx.clone(), store, summary, target)),
            None => JobTask::Copy(CopyJob::new(ctx.clone(), store, summary, kind)),
        };

        Self {
            task,
            ctx,
            _guard: guard,
        }
    }

    pub fn kind(&self) -> JobKind {
        self.task.kind()
    }

    pub fn key(&self) -> &str {
        &self.task.summary().key
    }

    pub fn counterpart_key(&self) -> &str {
        self.task.counterpart_key()
    }

    /// Run the job to completion. Consumes the job, which fires its
    /// completion guard whatever the outcome.
    pub async fn run(self) {
        let key = self.key();

        if self.ctx.is_cancelled() {
            debug!(key, "Run cancelled, skipping");
            return;
        }

        if !self.task.should_act().await {
            debug!(key, kind = %self.kind(), "No action needed");
            return;
        }

        if self.ctx.options().dry_run {
            info!("Dry run: would {}", self.task.describe());
            return;
        }

        self.task.execute().await;
        debug!(key, "Done");
    }
}
