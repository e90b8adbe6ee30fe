//! Delete jobs for prune and pure-delete runs.

use async_trait::async_trait;
use sm_traits::ObjectStore;
use sm_types::KeySummary;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::decision::passes_age_filter;
use super::retry::{RetryOutcome, RetryPolicy, with_retry};
use super::{JobKind, KeyJob, source_key_for};
use crate::context::MirrorContext;

/// Which bucket a delete job removes keys from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteTarget {
    /// Pure-delete mode: listed source keys are deleted from the source.
    Source,
    /// Prune mode: listed destination keys missing from the source are
    /// deleted from the destination.
    Destination,
}

/// Deletes one listed key.
pub struct DeleteJob {
    ctx: Arc<MirrorContext>,
    store: Arc<dyn ObjectStore>,
    summary: KeySummary,
    source_key: String,
    target: DeleteTarget,
}

impl fmt::Debug for DeleteJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeleteJob")
            .field("target", &self.target)
            .field("key", &self.summary.key)
            .field("source_key", &self.source_key)
            .finish()
    }
}

impl DeleteJob {
    pub fn new(
        ctx: Arc<MirrorContext>,
        store: Arc<dyn ObjectStore>,
        summary: KeySummary,
        target: DeleteTarget,
    ) -> Self {
        let source_key = match target {
            DeleteTarget::Source => summary.key.clone(),
            DeleteTarget::Destination => source_key_for(ctx.options(), &summary.key),
        };

        Self {
            ctx,
            store,
            summary,
            source_key,
            target,
        }
    }

    /// Bucket the listed key lives in and will be deleted from.
    fn bucket(&self) -> &str {
        let options = self.ctx.options();
        match self.target {
            DeleteTarget::Source => &options.source_bucket,
            DeleteTarget::Destination => &options.dest_bucket,
        }
    }
}

#[async_trait]
impl KeyJob for DeleteJob {
    fn kind(&self) -> JobKind {
        JobKind::Delete
    }

    fn summary(&self) -> &KeySummary {
        &self.summary
    }

    /// The key checked in the source bucket.
    fn counterpart_key(&self) -> &str {
        &self.source_key
    }

    fn describe(&self) -> String {
        match self.target {
            DeleteTarget::Source => format!("delete s3://{}/{}", self.bucket(), self.summary.key),
            DeleteTarget::Destination => format!(
                "delete s3://{}/{} because {} does not exist in source",
                self.bucket(),
                self.summary.key,
                self.source_key
            ),
        }
    }

    async fn should_act(&self) -> bool {
        let options = self.ctx.options();

        if self.target == DeleteTarget::Source && !passes_age_filter(options, &self.summary) {
            return false;
        }

        match self
            .store
            .head_object(&options.source_bucket, &self.source_key)
            .await
        {
            // Still in the source: pure delete removes it, prune keeps the copy
            Ok(_) => self.target == DeleteTarget::Source,
            Err(e) if e.is_not_found() => {
                debug!(source_key = %self.source_key, "Not in source, will delete");
                true
            }
            Err(e) => {
                warn!(
                    bucket = %options.source_bucket,
                    source_key = %self.source_key,
                    error = %e,
                    "Source lookup failed, not deleting"
                );
                false
            }
        }
    }

    async fn execute(&self) {
        let stats = self.ctx.stats();
        let bucket = self.bucket();
        let key = self.summary.key.as_str();

        let policy = RetryPolicy::from_options(self.ctx.options());
        let outcome = with_retry(&policy, self.ctx.cancel_token(), "delete", key, |_| {
            stats.record_delete_call();
            self.store.delete_object(bucket, key)
        })
        .await;

        match outcome {
            RetryOutcome::Succeeded { attempts, .. } => {
                stats.record_deleted();
                debug!(bucket, key, attempts, "Deleted");
            }
            RetryOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                error!(bucket, key, attempts, error = %last_error, "Giving up on delete");
                stats.record_delete_error();
            }
            RetryOutcome::Interrupted { .. } => {
                stats.record_delete_error();
            }
        }
    }
}
