//! `S3Store` integration tests using LocalStack.
//!
//! These tests exercise each `ObjectStore` operation against a real S3 API.

use crate::common::{LocalStackTestContext, test_data};
use futures::TryStreamExt;
use sm_traits::ObjectStore;
use sm_types::{AclPolicy, CopyRequest, MB, StorageClass};

fn copy_request(source: &str, dest: &str, key: &str, dest_key: &str, acl: AclPolicy) -> CopyRequest {
    CopyRequest {
        source_bucket: source.to_string(),
        source_key: key.to_string(),
        dest_bucket: dest.to_string(),
        dest_key: dest_key.to_string(),
        storage_class: StorageClass::Standard,
        encrypt: false,
        acl,
    }
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_list_keys_under_prefix() {
    let ctx = LocalStackTestContext::new().await;

    if !ctx.is_available().await {
        eprintln!("LocalStack not available, skipping test");
        return;
    }

    let bucket = "sm-store-list";
    ctx.fresh_bucket(bucket).await.unwrap();
    ctx.put(bucket, "data/a.bin", test_data(10, 1)).await.unwrap();
    ctx.put(bucket, "data/b.bin", test_data(20, 2)).await.unwrap();
    ctx.put(bucket, "other/c.bin", test_data(30, 3)).await.unwrap();

    let store = ctx.store().await;
    let mut summaries: Vec<_> = store
        .list_keys(bucket, Some("data/"))
        .try_collect()
        .await
        .unwrap();
    summaries.sort_by(|a, b| a.key.cmp(&b.key));

    let keys: Vec<_> = summaries.iter().map(|s| s.key.as_str()).collect();
    assert_eq!(keys, vec!["data/a.bin", "data/b.bin"]);
    assert_eq!(summaries[1].size, 20);
    assert!(summaries[0].last_modified.is_some());
    assert!(!summaries[0].etag.as_deref().unwrap_or("\"").contains('"'));
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_head_missing_object_is_not_found() {
    let ctx = LocalStackTestContext::new().await;

    if !ctx.is_available().await {
        eprintln!("LocalStack not available, skipping test");
        return;
    }

    let bucket = "sm-store-head";
    ctx.fresh_bucket(bucket).await.unwrap();

    let store = ctx.store().await;
    let err = store.head_object(bucket, "missing.bin").await.unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_copy_object_with_mirrored_acl() {
    let ctx = LocalStackTestContext::new().await;

    if !ctx.is_available().await {
        eprintln!("LocalStack not available, skipping test");
        return;
    }

    let (source, dest) = ("sm-store-copy-src", "sm-store-copy-dst");
    ctx.fresh_bucket(source).await.unwrap();
    ctx.fresh_bucket(dest).await.unwrap();

    let key = "dir/a file+1.txt";
    ctx.put(source, key, test_data(1000, 7)).await.unwrap();

    let store = ctx.store().await;
    let acl = store.get_object_acl(source, key).await.unwrap();
    store
        .copy_object(&copy_request(source, dest, key, key, AclPolicy::Mirror(acl)))
        .await
        .unwrap();

    let copied = store.head_object(dest, key).await.unwrap();
    let original = store.head_object(source, key).await.unwrap();
    assert_eq!(copied.content_length, 1000);
    assert_eq!(copied.fingerprint(false), original.fingerprint(false));
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_copy_object_cross_account_and_encrypted() {
    let ctx = LocalStackTestContext::new().await;

    if !ctx.is_available().await {
        eprintln!("LocalStack not available, skipping test");
        return;
    }

    let (source, dest) = ("sm-store-xacct-src", "sm-store-xacct-dst");
    ctx.fresh_bucket(source).await.unwrap();
    ctx.fresh_bucket(dest).await.unwrap();
    ctx.put(source, "a.bin", test_data(64, 1)).await.unwrap();

    let store = ctx.store().await;
    let mut request = copy_request(source, dest, "a.bin", "copy/a.bin", AclPolicy::BucketOwnerFullControl);
    request.encrypt = true;
    store.copy_object(&request).await.unwrap();

    assert_eq!(ctx.list_keys(dest, None).await.unwrap(), vec!["copy/a.bin"]);
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_multipart_copy() {
    let ctx = LocalStackTestContext::new().await;

    if !ctx.is_available().await {
        eprintln!("LocalStack not available, skipping test");
        return;
    }

    let (source, dest) = ("sm-store-mpu-src", "sm-store-mpu-dst");
    ctx.fresh_bucket(source).await.unwrap();
    ctx.fresh_bucket(dest).await.unwrap();

    let size = 6 * MB as usize + 17;
    ctx.put(source, "big.bin", test_data(size, 5)).await.unwrap();

    let store = ctx.store().await;
    let acl = store.get_object_acl(source, "big.bin").await.unwrap();
    store
        .multipart_copy(
            &copy_request(source, dest, "big.bin", "big.bin", AclPolicy::Mirror(acl)),
            size as u64,
            5 * MB,
        )
        .await
        .unwrap();

    let (copied_size, etag) = ctx.head(dest, "big.bin").await.unwrap();
    assert_eq!(copied_size, size as u64);
    assert!(etag.ends_with("-2"), "expected a two-part ETag, got {etag}");
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_delete_object() {
    let ctx = LocalStackTestContext::new().await;

    if !ctx.is_available().await {
        eprintln!("LocalStack not available, skipping test");
        return;
    }

    let bucket = "sm-store-delete";
    ctx.fresh_bucket(bucket).await.unwrap();
    ctx.put(bucket, "gone.bin", test_data(8, 0)).await.unwrap();

    let store = ctx.store().await;
    store.delete_object(bucket, "gone.bin").await.unwrap();

    assert!(ctx.list_keys(bucket, None).await.unwrap().is_empty());
}
