//! End-to-end mirror runs against LocalStack.

use crate::common::{LocalStackTestContext, test_data};
use sm_mirror::MirrorMaster;
use sm_types::MirrorOptions;
use std::sync::Arc;

async fn run(ctx: &LocalStackTestContext, options: MirrorOptions) -> sm_mirror::MirrorReport {
    let store = Arc::new(ctx.store().await);
    MirrorMaster::new(options.with_max_threads(4), store)
        .mirror()
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_mirror_copies_new_and_changed_keys() {
    let ctx = LocalStackTestContext::new().await;

    if !ctx.is_available().await {
        eprintln!("LocalStack not available, skipping test");
        return;
    }

    let (source, dest) = ("sm-mirror-basic-src", "sm-mirror-basic-dst");
    ctx.fresh_bucket(source).await.unwrap();
    ctx.fresh_bucket(dest).await.unwrap();

    ctx.put(source, "new.bin", test_data(100, 1)).await.unwrap();
    ctx.put(source, "same.bin", test_data(100, 2)).await.unwrap();
    ctx.put(source, "changed.bin", test_data(100, 3)).await.unwrap();
    ctx.put(dest, "same.bin", test_data(100, 2)).await.unwrap();
    ctx.put(dest, "changed.bin", test_data(100, 4)).await.unwrap();

    let report = run(&ctx, MirrorOptions::new(source, dest)).await;

    assert!(!report.interrupted);
    assert_eq!(report.stats.keys_listed, 3);
    assert_eq!(report.stats.objects_copied, 2);
    assert_eq!(report.stats.bytes_copied, 200);
    assert_eq!(report.stats.error_count(), 0);
    let copied = ctx.head(dest, "changed.bin").await.unwrap();
    let original = ctx.head(source, "changed.bin").await.unwrap();
    assert_eq!(copied, original);

    // A second run finds nothing to do
    let report = run(&ctx, MirrorOptions::new(source, dest)).await;
    assert_eq!(report.stats.objects_copied, 0);
    assert_eq!(report.stats.copy_calls, 0);
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_mirror_remaps_prefix_and_prunes() {
    let ctx = LocalStackTestContext::new().await;

    if !ctx.is_available().await {
        eprintln!("LocalStack not available, skipping test");
        return;
    }

    let (source, dest) = ("sm-mirror-prune-src", "sm-mirror-prune-dst");
    ctx.fresh_bucket(source).await.unwrap();
    ctx.fresh_bucket(dest).await.unwrap();

    ctx.put(source, "logs/a.gz", test_data(10, 1)).await.unwrap();
    ctx.put(source, "logs/b.gz", test_data(20, 2)).await.unwrap();
    ctx.put(source, "other/c.gz", test_data(30, 3)).await.unwrap();
    ctx.put(dest, "archive/stale.gz", test_data(5, 9)).await.unwrap();
    ctx.put(dest, "keep/untouched.gz", test_data(5, 9)).await.unwrap();

    let options = MirrorOptions::new(source, dest)
        .with_source_prefix("logs/")
        .with_dest_prefix("archive/")
        .with_delete_removed(true);
    let report = run(&ctx, options).await;

    assert_eq!(report.stats.objects_copied, 2);
    assert_eq!(report.stats.objects_deleted, 1);
    assert_eq!(
        ctx.list_keys(dest, None).await.unwrap(),
        vec!["archive/a.gz", "archive/b.gz", "keep/untouched.gz"]
    );
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_mirror_move() {
    let ctx = LocalStackTestContext::new().await;

    if !ctx.is_available().await {
        eprintln!("LocalStack not available, skipping test");
        return;
    }

    let (source, dest) = ("sm-mirror-move-src", "sm-mirror-move-dst");
    ctx.fresh_bucket(source).await.unwrap();
    ctx.fresh_bucket(dest).await.unwrap();

    ctx.put(source, "a.bin", test_data(10, 1)).await.unwrap();
    ctx.put(source, "b.bin", test_data(10, 2)).await.unwrap();

    let report = run(&ctx, MirrorOptions::new(source, dest).with_move(true)).await;

    assert_eq!(report.stats.move_calls, 2);
    assert!(ctx.list_keys(source, None).await.unwrap().is_empty());
    assert_eq!(ctx.list_keys(dest, None).await.unwrap(), vec!["a.bin", "b.bin"]);
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_mirror_dry_run_changes_nothing() {
    let ctx = LocalStackTestContext::new().await;

    if !ctx.is_available().await {
        eprintln!("LocalStack not available, skipping test");
        return;
    }

    let (source, dest) = ("sm-mirror-dry-src", "sm-mirror-dry-dst");
    ctx.fresh_bucket(source).await.unwrap();
    ctx.fresh_bucket(dest).await.unwrap();

    ctx.put(source, "a.bin", test_data(10, 1)).await.unwrap();
    ctx.put(dest, "stale.bin", test_data(10, 2)).await.unwrap();

    let options = MirrorOptions::new(source, dest)
        .with_delete_removed(true)
        .with_dry_run(true);
    let report = run(&ctx, options).await;

    assert_eq!(report.stats.copy_calls, 0);
    assert_eq!(report.stats.delete_calls, 0);
    assert_eq!(ctx.list_keys(dest, None).await.unwrap(), vec!["stale.bin"]);
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_mirror_pure_delete() {
    let ctx = LocalStackTestContext::new().await;

    if !ctx.is_available().await {
        eprintln!("LocalStack not available, skipping test");
        return;
    }

    let bucket = "sm-mirror-delete";
    ctx.fresh_bucket(bucket).await.unwrap();

    ctx.put(bucket, "tmp/a.bin", test_data(10, 1)).await.unwrap();
    ctx.put(bucket, "tmp/b.bin", test_data(10, 2)).await.unwrap();
    ctx.put(bucket, "keep/c.bin", test_data(10, 3)).await.unwrap();

    let options = MirrorOptions::new(bucket, "")
        .with_source_prefix("tmp/")
        .with_delete_source(true);
    let report = run(&ctx, options).await;

    assert_eq!(report.stats.objects_deleted, 2);
    assert_eq!(ctx.list_keys(bucket, None).await.unwrap(), vec!["keep/c.bin"]);
}
