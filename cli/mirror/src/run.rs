//! Main execution logic for the s3-mirror CLI.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use sm_mirror::{MirrorMaster, MirrorReport, S3Config, S3Store, create_s3_client};
use sm_types::{AgeDirection, AgeFilter, MirrorOptions, parse_age};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::args::Cli;
use crate::progress::ProgressReporter;

/// Execute a mirror run with the provided arguments.
pub async fn execute(args: Cli) -> Result<MirrorReport> {
    let options = build_options(&args, Utc::now())?;
    options
        .validate()
        .map_err(|e| anyhow!("Invalid options: {e}"))?;

    let client = create_s3_client(&build_s3_config(&args))
        .await
        .context("Failed to create S3 client")?;

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let master = MirrorMaster::with_cancellation(options, Arc::new(S3Store::new(client)), cancel);

    let mut progress = ProgressReporter::new(args.progress, args.progress_interval);
    progress.start(Arc::clone(master.context()));

    let result = master.mirror().await;
    progress.stop(master.context().stats()).await;

    Ok(result?)
}

/// Translate CLI arguments into run options.
pub fn build_options(args: &Cli, now: DateTime<Utc>) -> Result<MirrorOptions> {
    let dest_bucket = args
        .destination
        .as_ref()
        .map(|d| d.bucket.clone())
        .unwrap_or_default();

    let mut options = MirrorOptions::new(&args.source.bucket, dest_bucket)
        .with_dry_run(args.dry_run)
        .with_move(args.move_objects)
        .with_delete_removed(args.delete_removed)
        .with_delete_source(args.delete)
        .with_size_only(args.size_only)
        .with_encrypt(args.server_side_encryption)
        .with_cross_account_copy(args.cross_account_copy)
        .with_storage_class(args.storage_class)
        .with_max_threads(args.max_threads)
        .with_max_retries(args.max_retries)
        .with_multipart_threshold(args.multipart_threshold)
        .with_multipart_part_size(args.part_size);

    if let Some(prefix) = args.source_prefix()? {
        options = options.with_source_prefix(prefix);
    }

    if let Some(prefix) = args.dest_prefix()? {
        options = options.with_dest_prefix(prefix);
    }

    if let Some(capacity) = args.queue_capacity {
        options = options.with_queue_capacity(capacity);
    }

    if let Some(ctime) = &args.ctime {
        let cutoff = parse_age(ctime, now).map_err(|e| anyhow!("Invalid --ctime: {e}"))?;
        let direction = if args.older_than {
            AgeDirection::OlderThan
        } else {
            AgeDirection::YoungerThan
        };
        options = options.with_age_filter(AgeFilter::new(cutoff, direction));
    }

    Ok(options)
}

fn build_s3_config(args: &Cli) -> S3Config {
    let mut config = S3Config::new()
        .with_region(&args.region)
        .with_timeout(args.timeout);

    if let Some(endpoint) = &args.endpoint {
        config = config.with_endpoint(endpoint);
    }

    if let (Some(access_key), Some(secret_key)) = (&args.access_key, &args.secret_key) {
        config = config.with_credentials(access_key, secret_key);
    }

    if let Some(profile) = &args.profile {
        config = config.with_profile(profile);
    }

    config
}

/// Cancel the run on the first Ctrl-C.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => {
                    warn!("Interrupted, stopping after in-flight jobs");
                    cancel.cancel();
                }
                Err(e) => info!(error = %e, "Ctrl-C handler unavailable"),
            },
        }
    });
}
