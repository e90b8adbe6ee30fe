//! In-memory object store for tests and local experiments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sm_error::{StoreError, StoreResult};
use sm_traits::{KeyStream, ObjectStore, part_ranges};
use sm_types::{
    AclPolicy, CopyRequest, Grant, Grantee, KeySummary, ObjectAcl, ObjectMetadata, Permission,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Semaphore;

const OWNER_ID: &str = "memory-owner";

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Metadata lookup of a key, in either bucket
    Head,
    /// ACL lookup of a source key
    Acl,
    /// Single or multipart copy, keyed by the source key
    Copy,
    /// Delete of a key, in either bucket
    Delete,
}

/// One stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub size: u64,
    pub etag: Option<String>,
    pub last_modified: DateTime<Utc>,
    pub acl: ObjectAcl,
    /// The request that produced this object, if it was copied
    pub copied_from: Option<CopyRequest>,
}

/// Snapshot of calls made against the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list: u64,
    pub head: u64,
    pub acl: u64,
    pub copy: u64,
    pub multipart: u64,
    pub delete: u64,
}

impl CallCounts {
    /// Calls that change bucket contents.
    pub fn mutating(&self) -> u64 {
        self.copy + self.multipart + self.delete
    }
}

#[derive(Debug, Default)]
struct Counters {
    list: AtomicU64,
    head: AtomicU64,
    acl: AtomicU64,
    copy: AtomicU64,
    multipart: AtomicU64,
    delete: AtomicU64,
}

#[derive(Debug)]
struct Failure {
    error: StoreError,
    /// `None` fails forever
    remaining: Option<usize>,
}

#[derive(Debug, Default)]
struct State {
    buckets: HashMap<String, BTreeMap<String, StoredObject>>,
    failures: HashMap<(Operation, String), Failure>,
    listing_failures: HashMap<String, StoreError>,
}

impl State {
    fn take_failure(&mut self, op: Operation, key: &str) -> Option<StoreError> {
        let slot = (op, key.to_string());
        let failure = self.failures.get_mut(&slot)?;
        let error = failure.error.clone();

        match failure.remaining.as_mut() {
            None => {}
            Some(1) => {
                self.failures.remove(&slot);
            }
            Some(n) => *n -= 1,
        }

        Some(error)
    }
}

/// An [`ObjectStore`] holding buckets in memory.
///
/// Supports seeding objects, injecting failures per operation and key,
/// failing listings, counting calls, and an optional gate that holds every
/// metadata lookup until permits are released.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    counters: Counters,
    gate: Option<Arc<Semaphore>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every `head_object` call until `gate` has a permit available.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Seed an object and return the summary a listing would report for it.
    pub fn put(&self, bucket: &str, summary: KeySummary) -> KeySummary {
        let last_modified = summary.last_modified.unwrap_or_else(Utc::now);
        let object = StoredObject {
            size: summary.size,
            etag: summary.etag.clone(),
            last_modified,
            acl: default_acl(),
            copied_from: None,
        };

        self.state
            .lock()
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(summary.key.clone(), object);

        KeySummary {
            last_modified: Some(last_modified),
            ..summary
        }
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.object(bucket, key).is_some()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.state
            .lock()
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .cloned()
    }

    /// Keys in `bucket`, sorted.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.state
            .lock()
            .buckets
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Fail `op` on `key` with `error`, `times` times or forever.
    pub fn inject(&self, op: Operation, key: &str, error: StoreError, times: Option<usize>) {
        self.state.lock().failures.insert(
            (op, key.to_string()),
            Failure {
                error,
                remaining: times,
            },
        );
    }

    /// Make listings of `bucket` fail after yielding its first key.
    pub fn fail_listing(&self, bucket: &str, error: StoreError) {
        self.state
            .lock()
            .listing_failures
            .insert(bucket.to_string(), error);
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            list: self.counters.list.load(Ordering::Relaxed),
            head: self.counters.head.load(Ordering::Relaxed),
            acl: self.counters.acl.load(Ordering::Relaxed),
            copy: self.counters.copy.load(Ordering::Relaxed),
            multipart: self.counters.multipart.load(Ordering::Relaxed),
            delete: self.counters.delete.load(Ordering::Relaxed),
        }
    }

    fn lookup(&self, bucket: &str, key: &str) -> StoreResult<StoredObject> {
        self.object(bucket, key)
            .ok_or_else(|| StoreError::not_found(bucket, key))
    }

    fn write_copy(&self, request: &CopyRequest, etag: Option<String>) -> StoreResult<()> {
        let mut state = self.state.lock();
        if let Some(error) = state.take_failure(Operation::Copy, &request.source_key) {
            return Err(error);
        }

        let source = state
            .buckets
            .get(&request.source_bucket)
            .and_then(|objects| objects.get(&request.source_key))
            .cloned()
            .ok_or_else(|| StoreError::not_found(&request.source_bucket, &request.source_key))?;

        let acl = match &request.acl {
            AclPolicy::Mirror(acl) => acl.clone(),
            AclPolicy::BucketOwnerFullControl => default_acl(),
        };

        let copied = StoredObject {
            size: source.size,
            etag: etag.or(source.etag),
            last_modified: Utc::now(),
            acl,
            copied_from: Some(request.clone()),
        };

        state
            .buckets
            .entry(request.dest_bucket.clone())
            .or_default()
            .insert(request.dest_key.clone(), copied);

        Ok(())
    }
}

fn default_acl() -> ObjectAcl {
    ObjectAcl {
        owner: Some(OWNER_ID.to_string()),
        grants: vec![Grant {
            grantee: Grantee::CanonicalUser(OWNER_ID.to_string()),
            permission: Permission::FullControl,
        }],
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn list_keys<'a>(&'a self, bucket: &'a str, prefix: Option<&'a str>) -> KeyStream<'a> {
        self.counters.list.fetch_add(1, Ordering::Relaxed);

        let (summaries, failure) = {
            let state = self.state.lock();
            let summaries: Vec<KeySummary> = state
                .buckets
                .get(bucket)
                .map(|objects| {
                    objects
                        .iter()
                        .filter(|(key, _)| prefix.is_none_or(|p| key.starts_with(p)))
                        .map(|(key, object)| KeySummary {
                            key: key.clone(),
                            size: object.size,
                            last_modified: Some(object.last_modified),
                            etag: object.etag.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default();
            (summaries, state.listing_failures.get(bucket).cloned())
        };

        let mut items: Vec<StoreResult<KeySummary>> = summaries.into_iter().map(Ok).collect();
        if let Some(error) = failure {
            items.truncate(1);
            items.push(Err(error));
        }

        Box::pin(futures::stream::iter(items))
    }

    async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectMetadata> {
        self.counters.head.fetch_add(1, Ordering::Relaxed);

        if let Some(gate) = &self.gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|_| StoreError::Transient("gate closed".to_string()))?;
        }

        if let Some(error) = self.state.lock().take_failure(Operation::Head, key) {
            return Err(error);
        }

        let object = self.lookup(bucket, key)?;
        Ok(ObjectMetadata {
            content_length: object.size,
            etag: object.etag,
            last_modified: Some(object.last_modified),
            content_type: None,
        })
    }

    async fn get_object_acl(&self, bucket: &str, key: &str) -> StoreResult<ObjectAcl> {
        self.counters.acl.fetch_add(1, Ordering::Relaxed);

        if let Some(error) = self.state.lock().take_failure(Operation::Acl, key) {
            return Err(error);
        }

        Ok(self.lookup(bucket, key)?.acl)
    }

    async fn copy_object(&self, request: &CopyRequest) -> StoreResult<()> {
        self.counters.copy.fetch_add(1, Ordering::Relaxed);
        self.write_copy(request, None)
    }

    async fn multipart_copy(
        &self,
        request: &CopyRequest,
        size: u64,
        part_size: u64,
    ) -> StoreResult<()> {
        self.counters.multipart.fetch_add(1, Ordering::Relaxed);

        let parts = part_ranges(size, part_size).len();
        let etag = self
            .object(&request.source_bucket, &request.source_key)
            .and_then(|o| o.etag)
            .map(|etag| format!("{etag}-{parts}"));

        self.write_copy(request, etag)
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.counters.delete.fetch_add(1, Ordering::Relaxed);

        let mut state = self.state.lock();
        if let Some(error) = state.take_failure(Operation::Delete, key) {
            return Err(error);
        }

        if let Some(objects) = state.buckets.get_mut(bucket) {
            objects.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_list_keys_filters_by_prefix() {
        let store = MemoryStore::new();
        store.put("b", KeySummary::new("logs/a", 1));
        store.put("b", KeySummary::new("logs/b", 2));
        store.put("b", KeySummary::new("other", 3));

        let keys: Vec<String> = store
            .list_keys("b", Some("logs/"))
            .map(|r| r.unwrap().key)
            .collect()
            .await;

        assert_eq!(keys, vec!["logs/a", "logs/b"]);
        assert_eq!(store.calls().list, 1);
    }

    #[tokio::test]
    async fn test_list_unknown_bucket_is_empty() {
        let store = MemoryStore::new();
        let items: Vec<_> = store.list_keys("nope", None).collect().await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_listing_failure_after_first_key() {
        let store = MemoryStore::new();
        store.put("b", KeySummary::new("a", 1));
        store.put("b", KeySummary::new("b", 1));
        store.fail_listing("b", StoreError::AccessDenied("denied".to_string()));

        let items: Vec<_> = store.list_keys("b", None).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }

    #[tokio::test]
    async fn test_head_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store.head_object("b", "k").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_injected_failure_runs_out() {
        let store = MemoryStore::new();
        store.put("b", KeySummary::new("k", 1));
        store.inject(
            Operation::Delete,
            "k",
            StoreError::Transient("x".to_string()),
            Some(1),
        );

        assert!(store.delete_object("b", "k").await.is_err());
        assert!(store.delete_object("b", "k").await.is_ok());
        assert!(!store.contains("b", "k"));
        assert_eq!(store.calls().delete, 2);
    }

    #[tokio::test]
    async fn test_multipart_copy_marks_etag() {
        let store = MemoryStore::new();
        store.put("src", KeySummary::new("big", 10).with_etag("abc"));
        let request = CopyRequest {
            source_bucket: "src".to_string(),
            source_key: "big".to_string(),
            dest_bucket: "dst".to_string(),
            dest_key: "big".to_string(),
            storage_class: Default::default(),
            encrypt: false,
            acl: AclPolicy::BucketOwnerFullControl,
        };

        store.multipart_copy(&request, 10, 4).await.unwrap();
        assert_eq!(
            store.object("dst", "big").unwrap().etag.as_deref(),
            Some("abc-3")
        );
    }
}
