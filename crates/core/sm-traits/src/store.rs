//! Object store trait and related types.

use async_trait::async_trait;
use futures::Stream;
use sm_error::StoreResult;
use sm_types::{CopyRequest, KeySummary, ObjectAcl, ObjectMetadata};
use std::pin::Pin;

/// A stream of listed keys.
///
/// An `Err` item is fatal for the listing; consumers stop at the first one.
pub type KeyStream<'a> = Pin<Box<dyn Stream<Item = StoreResult<KeySummary>> + Send + 'a>>;

/// Trait for object store backends.
///
/// This is the capability the mirror engine drives. Implementations include:
/// - S3 via `aws-sdk-s3` (production, LocalStack)
/// - An in-memory store (testing/development)
///
/// # Error Contract
///
/// - [`head_object`](ObjectStore::head_object) must report an absent object as
///   [`StoreError::NotFound`](sm_error::StoreError::NotFound); the engine
///   treats that as a decision signal rather than a failure.
/// - Every other failure is classified through
///   [`StoreError::category`](sm_error::StoreError::category).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Lists every key under `prefix`, paginating internally.
    fn list_keys<'a>(&'a self, bucket: &'a str, prefix: Option<&'a str>) -> KeyStream<'a>;

    /// Fetches metadata for a single object.
    async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectMetadata>;

    /// Fetches the access control list of a single object.
    async fn get_object_acl(&self, bucket: &str, key: &str) -> StoreResult<ObjectAcl>;

    /// Copies one object server-side in a single request.
    async fn copy_object(&self, request: &CopyRequest) -> StoreResult<()>;

    /// Copies one large object in ranged parts of `part_size` bytes.
    ///
    /// `size` is the source object's length. Partial uploads must be cleaned
    /// up by the implementation when a part fails.
    async fn multipart_copy(&self, request: &CopyRequest, size: u64, part_size: u64)
    -> StoreResult<()>;

    /// Deletes one object. Deleting an absent key is not an error.
    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()>;
}

/// Split `size` bytes into inclusive `(start, end)` ranges of at most `part_size`.
///
/// A zero-length object yields no parts.
pub fn part_ranges(size: u64, part_size: u64) -> Vec<(u64, u64)> {
    let part_size = part_size.max(1);
    let mut ranges = Vec::new();
    let mut start = 0;

    while start < size {
        let end = (start + part_size).min(size) - 1;
        ranges.push((start, end));
        start = end + 1;
    }

    ranges
}
