//! sm-mirror - Concurrent bucket-to-bucket mirroring engine for s3-mirror.
//!
//! This crate lists keys in a source bucket, decides per key whether the
//! destination needs a copy, and runs the copies on a fixed pool of worker
//! tasks. It supports:
//!
//! - Copy, move (copy then delete source) and pure-delete modes
//! - Pruning destination keys that no longer exist in the source
//! - Fingerprint comparison by size and ETag, or size only
//! - Last-modified age filters in either direction
//! - Multipart server-side copies for objects above the single-copy limit
//! - A bounded, lossy work queue: overflow is dropped and counted, never blocks
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sm_mirror::{MirrorMaster, S3Config, S3Store, create_s3_client};
//! use sm_types::MirrorOptions;
//!
//! let client = create_s3_client(&S3Config::new().with_region("us-east-1")).await?;
//! let options = MirrorOptions::new("source-bucket", "backup-bucket")
//!     .with_source_prefix("logs/")
//!     .with_delete_removed(true);
//!
//! let master = MirrorMaster::new(options, Arc::new(S3Store::new(client)));
//! let report = master.mirror().await?;
//!
//! eprintln!("Copied {} objects", report.stats.objects_copied);
//! ```

pub mod completion;
pub mod context;
pub mod job;
pub mod lister;
pub mod master;
pub mod memory;
pub mod mirror;
pub mod pool;
pub mod queue;
pub mod s3;
pub mod stats;

pub use completion::{CompletionGuard, CompletionTracker};
pub use context::MirrorContext;
pub use job::{
    CopyJob, DeleteJob, DeleteTarget, Job, JobKind, KeyJob, RetryOutcome, RetryPolicy,
    dest_key_for, source_key_for,
};
pub use lister::{KeyLister, ListerState};
pub use master::{KeyMaster, MasterRole, WaitOutcome};
pub use memory::{CallCounts, MemoryStore, Operation};
pub use mirror::{MirrorMaster, MirrorReport};
pub use pool::WorkerPool;
pub use queue::{PushError, WorkQueue, available_memory, queue_capacity};
pub use s3::{S3Config, S3Store, create_s3_client};
pub use stats::{MirrorStats, StatsSnapshot};
