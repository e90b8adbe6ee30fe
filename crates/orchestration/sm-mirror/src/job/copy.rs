//! Copy and move jobs.

use async_trait::async_trait;
use sm_error::StoreResult;
use sm_traits::ObjectStore;
use sm_types::{AclPolicy, CopyRequest, KeySummary};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::decision::{differs, passes_age_filter};
use super::retry::{RetryOutcome, RetryPolicy, with_retry};
use super::{JobKind, KeyJob, dest_key_for};
use crate::context::MirrorContext;

/// Copies one source key to the destination bucket, optionally deleting the
/// source afterwards (move).
pub struct CopyJob {
    ctx: Arc<MirrorContext>,
    store: Arc<dyn ObjectStore>,
    summary: KeySummary,
    dest_key: String,
    kind: JobKind,
}

impl fmt::Debug for CopyJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CopyJob")
            .field("kind", &self.kind)
            .field("key", &self.summary.key)
            .field("dest_key", &self.dest_key)
            .finish()
    }
}

impl CopyJob {
    pub fn new(
        ctx: Arc<MirrorContext>,
        store: Arc<dyn ObjectStore>,
        summary: KeySummary,
        kind: JobKind,
    ) -> Self {
        let dest_key = dest_key_for(ctx.options(), &summary.key);
        Self {
            ctx,
            store,
            summary,
            dest_key,
            kind,
        }
    }

    pub fn dest_key(&self) -> &str {
        &self.dest_key
    }

    /// Build the copy request. Reads the source ACL unless the copy is
    /// cross-account.
    async fn prepare(&self) -> StoreResult<CopyRequest> {
        let options = self.ctx.options();

        let acl = if options.cross_account_copy {
            AclPolicy::BucketOwnerFullControl
        } else {
            let acl = self
                .store
                .get_object_acl(&options.source_bucket, &self.summary.key)
                .await?;
            AclPolicy::Mirror(acl)
        };

        Ok(CopyRequest {
            source_bucket: options.source_bucket.clone(),
            source_key: self.summary.key.clone(),
            dest_bucket: options.dest_bucket.clone(),
            dest_key: self.dest_key.clone(),
            storage_class: options.storage_class,
            encrypt: options.encrypt,
            acl,
        })
    }

    /// One attempt: the copy, then for moves the source delete.
    async fn attempt(&self, request: &CopyRequest, size: u64) -> StoreResult<()> {
        let options = self.ctx.options();
        let stats = self.ctx.stats();

        stats.record_copy_call();
        if self.kind.is_multipart() {
            self.store
                .multipart_copy(request, size, options.multipart_part_size)
                .await?;
        } else {
            self.store.copy_object(request).await?;
        }

        if self.kind.is_move() {
            stats.record_delete_call();
            self.store
                .delete_object(&request.source_bucket, &request.source_key)
                .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl KeyJob for CopyJob {
    fn kind(&self) -> JobKind {
        self.kind
    }

    fn summary(&self) -> &KeySummary {
        &self.summary
    }

    fn counterpart_key(&self) -> &str {
        &self.dest_key
    }

    fn describe(&self) -> String {
        let options = self.ctx.options();
        format!(
            "{} s3://{}/{} to s3://{}/{}",
            self.kind, options.source_bucket, self.summary.key, options.dest_bucket, self.dest_key
        )
    }

    async fn should_act(&self) -> bool {
        let options = self.ctx.options();

        if !passes_age_filter(options, &self.summary) {
            return false;
        }

        match self
            .store
            .head_object(&options.dest_bucket, &self.dest_key)
            .await
        {
            Ok(existing) => {
                let changed = differs(options, &self.summary, &existing);
                if !changed {
                    debug!(key = %self.summary.key, "Destination is up to date");
                }
                changed
            }
            Err(e) if e.is_not_found() => {
                debug!(dest_key = %self.dest_key, "Not in destination, will copy");
                true
            }
            Err(e) => {
                warn!(
                    bucket = %options.dest_bucket,
                    dest_key = %self.dest_key,
                    error = %e,
                    "Destination lookup failed, not copying"
                );
                false
            }
        }
    }

    async fn execute(&self) {
        let options = self.ctx.options();
        let stats = self.ctx.stats();
        let key = self.summary.key.as_str();

        let source = match self.store.head_object(&options.source_bucket, key).await {
            Ok(metadata) => metadata,
            Err(e) => {
                error!(key, error = %e, "Failed to read source metadata");
                stats.record_copy_error();
                return;
            }
        };

        let request = match self.prepare().await {
            Ok(request) => request,
            Err(e) => {
                error!(key, error = %e, "Failed to read source ACL");
                stats.record_copy_error();
                return;
            }
        };

        let policy = RetryPolicy::from_options(options);
        let outcome = with_retry(
            &policy,
            self.ctx.cancel_token(),
            self.kind.as_str(),
            key,
            |_| self.attempt(&request, source.content_length),
        )
        .await;

        match outcome {
            RetryOutcome::Succeeded { attempts, .. } => {
                if self.kind.is_move() {
                    stats.record_move_call();
                }
                stats.record_copied(source.content_length);
                debug!(key, dest_key = %self.dest_key, attempts, "Copied");
            }
            RetryOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                error!(
                    key,
                    dest_key = %self.dest_key,
                    attempts,
                    error = %last_error,
                    "Giving up on {}", self.kind
                );
                stats.record_copy_error();
            }
            RetryOutcome::Interrupted { .. } => {
                stats.record_copy_error();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryStore, Operation};
    use sm_error::StoreError;
    use sm_types::{MirrorOptions, StorageClass};
    use std::time::Duration;

    fn context(options: MirrorOptions) -> Arc<MirrorContext> {
        Arc::new(MirrorContext::new(
            options.with_retry_backoff(Duration::from_millis(1)),
        ))
    }

    fn job(ctx: &Arc<MirrorContext>, store: &Arc<MemoryStore>, summary: KeySummary) -> CopyJob {
        let kind = JobKind::for_key(ctx.options(), &summary, false);
        CopyJob::new(ctx.clone(), store.clone(), summary, kind)
    }

    #[tokio::test]
    async fn test_should_act_when_destination_missing() {
        let store = Arc::new(MemoryStore::new());
        let summary = store.put("src", KeySummary::new("a/b.txt", 10).with_etag("X"));
        let ctx = context(MirrorOptions::new("src", "dst"));

        assert!(job(&ctx, &store, summary).should_act().await);
    }

    #[tokio::test]
    async fn test_should_not_act_when_fingerprints_match() {
        let store = Arc::new(MemoryStore::new());
        let summary = store.put("src", KeySummary::new("k", 10).with_etag("X"));
        store.put("dst", KeySummary::new("k", 10).with_etag("X"));
        let ctx = context(MirrorOptions::new("src", "dst"));

        assert!(!job(&ctx, &store, summary).should_act().await);
    }

    #[tokio::test]
    async fn test_hash_change_flips_decision_unless_size_only() {
        let store = Arc::new(MemoryStore::new());
        let summary = store.put("src", KeySummary::new("k", 10).with_etag("X"));
        store.put("dst", KeySummary::new("k", 10).with_etag("Y"));

        let ctx = context(MirrorOptions::new("src", "dst"));
        assert!(job(&ctx, &store, summary.clone()).should_act().await);

        let ctx = context(MirrorOptions::new("src", "dst").with_size_only(true));
        assert!(!job(&ctx, &store, summary).should_act().await);
    }

    #[tokio::test]
    async fn test_lookup_error_skips_key() {
        let store = Arc::new(MemoryStore::new());
        let summary = store.put("src", KeySummary::new("k", 10));
        store.inject(
            Operation::Head,
            "k",
            StoreError::AccessDenied("denied".to_string()),
            None,
        );
        let ctx = context(MirrorOptions::new("src", "dst"));

        assert!(!job(&ctx, &store, summary).should_act().await);
        assert_eq!(ctx.stats().snapshot().error_count(), 0);
    }

    #[tokio::test]
    async fn test_execute_copies_with_request_options() {
        let store = Arc::new(MemoryStore::new());
        let summary = store.put("src", KeySummary::new("logs/a.gz", 10).with_etag("X"));
        let ctx = context(
            MirrorOptions::new("src", "dst")
                .with_source_prefix("logs/")
                .with_dest_prefix("archive/")
                .with_encrypt(true)
                .with_storage_class(StorageClass::StandardIa),
        );

        job(&ctx, &store, summary).execute().await;

        let copied = store.object("dst", "archive/a.gz").expect("copied object");
        assert_eq!(copied.size, 10);
        let request = copied.copied_from.expect("copy request recorded");
        assert!(request.encrypt);
        assert_eq!(request.storage_class, StorageClass::StandardIa);
        assert!(matches!(request.acl, AclPolicy::Mirror(_)));

        let stats = ctx.stats().snapshot();
        assert_eq!(stats.objects_copied, 1);
        assert_eq!(stats.bytes_copied, 10);
        assert_eq!(stats.copy_calls, 1);
    }

    #[tokio::test]
    async fn test_cross_account_uses_canned_policy() {
        let store = Arc::new(MemoryStore::new());
        let summary = store.put("src", KeySummary::new("k", 3));
        let ctx = context(MirrorOptions::new("src", "dst").with_cross_account_copy(true));

        job(&ctx, &store, summary).execute().await;

        let request = store.object("dst", "k").unwrap().copied_from.unwrap();
        assert_eq!(request.acl, AclPolicy::BucketOwnerFullControl);
        assert_eq!(store.calls().acl, 0);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let store = Arc::new(MemoryStore::new());
        let summary = store.put("src", KeySummary::new("k", 4));
        store.inject(
            Operation::Copy,
            "k",
            StoreError::Transient("reset".to_string()),
            Some(2),
        );
        let ctx = context(MirrorOptions::new("src", "dst"));

        job(&ctx, &store, summary).execute().await;

        let stats = ctx.stats().snapshot();
        assert_eq!(stats.objects_copied, 1);
        assert_eq!(stats.copy_calls, 3);
        assert_eq!(stats.copy_errors, 0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_count_one_error() {
        let store = Arc::new(MemoryStore::new());
        let summary = store.put("src", KeySummary::new("k", 4));
        store.inject(
            Operation::Copy,
            "k",
            StoreError::Transient("reset".to_string()),
            None,
        );
        let ctx = context(MirrorOptions::new("src", "dst").with_max_retries(3));

        job(&ctx, &store, summary).execute().await;

        let stats = ctx.stats().snapshot();
        assert_eq!(stats.objects_copied, 0);
        assert_eq!(stats.copy_errors, 1);
        assert_eq!(stats.copy_calls, 3);
        assert!(!store.contains("dst", "k"));
    }

    #[tokio::test]
    async fn test_access_denied_copy_spends_every_attempt() {
        let store = Arc::new(MemoryStore::new());
        let summary = store.put("src", KeySummary::new("k", 4));
        store.inject(
            Operation::Copy,
            "k",
            StoreError::AccessDenied("denied".to_string()),
            None,
        );
        let ctx = context(MirrorOptions::new("src", "dst").with_max_retries(5));

        job(&ctx, &store, summary).execute().await;

        let stats = ctx.stats().snapshot();
        assert_eq!(stats.copy_calls, 5);
        assert_eq!(stats.copy_errors, 1);
        assert_eq!(store.calls().copy, 5);
    }

    #[tokio::test]
    async fn test_move_deletes_source() {
        let store = Arc::new(MemoryStore::new());
        let summary = store.put("src", KeySummary::new("k", 7));
        let ctx = context(MirrorOptions::new("src", "dst").with_move(true));

        job(&ctx, &store, summary).execute().await;

        assert!(store.contains("dst", "k"));
        assert!(!store.contains("src", "k"));
        let stats = ctx.stats().snapshot();
        assert_eq!(stats.move_calls, 1);
        assert_eq!(stats.objects_copied, 1);
        assert_eq!(stats.bytes_copied, 7);
    }

    #[tokio::test]
    async fn test_move_recopies_when_delete_fails() {
        let store = Arc::new(MemoryStore::new());
        let summary = store.put("src", KeySummary::new("k", 7));
        store.inject(
            Operation::Delete,
            "k",
            StoreError::Transient("reset".to_string()),
            Some(1),
        );
        let ctx = context(MirrorOptions::new("src", "dst").with_move(true));

        job(&ctx, &store, summary).execute().await;

        assert_eq!(store.calls().copy, 2);
        assert!(!store.contains("src", "k"));
        assert_eq!(ctx.stats().objects_copied(), 1);
    }

    #[tokio::test]
    async fn test_large_object_uses_multipart() {
        let store = Arc::new(MemoryStore::new());
        let summary = store.put("src", KeySummary::new("big", 100));
        let ctx = context(
            MirrorOptions::new("src", "dst")
                .with_multipart_threshold(50)
                .with_multipart_part_size(6 * sm_types::MB),
        );

        let job = job(&ctx, &store, summary);
        assert_eq!(job.kind(), JobKind::MultipartCopy);
        job.execute().await;

        let calls = store.calls();
        assert_eq!(calls.multipart, 1);
        assert_eq!(calls.copy, 0);
        assert_eq!(store.object("dst", "big").unwrap().size, 100);
    }

    #[tokio::test]
    async fn test_missing_source_is_a_copy_error() {
        let store = Arc::new(MemoryStore::new());
        let ctx = context(MirrorOptions::new("src", "dst"));

        job(&ctx, &store, KeySummary::new("vanished", 1)).execute().await;

        assert_eq!(ctx.stats().copy_errors(), 1);
        assert_eq!(store.calls().copy, 0);
    }
}
