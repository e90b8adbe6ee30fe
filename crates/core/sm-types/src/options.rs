//! Run configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::age::AgeFilter;
use crate::units::{GB, MB};

/// Objects above this size cannot be copied with a single request.
pub const DEFAULT_MULTIPART_THRESHOLD: u64 = 5 * GB;

/// Default part size for multipart copies.
pub const DEFAULT_PART_SIZE: u64 = 4 * GB;

/// Smallest part S3 accepts (except for the last part).
pub const MIN_PART_SIZE: u64 = 5 * MB;

/// S3 storage class for copied objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageClass {
    #[default]
    Standard,
    ReducedRedundancy,
    StandardIa,
    OnezoneIa,
    IntelligentTiering,
    Glacier,
    GlacierIr,
    DeepArchive,
}

impl StorageClass {
    /// The name S3 uses on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageClass::Standard => "STANDARD",
            StorageClass::ReducedRedundancy => "REDUCED_REDUNDANCY",
            StorageClass::StandardIa => "STANDARD_IA",
            StorageClass::OnezoneIa => "ONEZONE_IA",
            StorageClass::IntelligentTiering => "INTELLIGENT_TIERING",
            StorageClass::Glacier => "GLACIER",
            StorageClass::GlacierIr => "GLACIER_IR",
            StorageClass::DeepArchive => "DEEP_ARCHIVE",
        }
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "STANDARD" => Ok(StorageClass::Standard),
            "REDUCED_REDUNDANCY" => Ok(StorageClass::ReducedRedundancy),
            "STANDARD_IA" => Ok(StorageClass::StandardIa),
            "ONEZONE_IA" => Ok(StorageClass::OnezoneIa),
            "INTELLIGENT_TIERING" => Ok(StorageClass::IntelligentTiering),
            "GLACIER" => Ok(StorageClass::Glacier),
            "GLACIER_IR" => Ok(StorageClass::GlacierIr),
            "DEEP_ARCHIVE" => Ok(StorageClass::DeepArchive),
            other => Err(format!("Unknown storage class: {other}")),
        }
    }
}

/// Configuration for one mirror run.
///
/// Built once, validated, then shared read-only by every job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorOptions {
    /// Bucket to read from
    pub source_bucket: String,

    /// Only keys under this prefix are mirrored
    pub source_prefix: Option<String>,

    /// Bucket to write to
    pub dest_bucket: String,

    /// Replaces `source_prefix` on destination keys
    pub dest_prefix: Option<String>,

    /// Delete each source object after it is copied
    pub move_objects: bool,

    /// Delete destination objects that no longer exist in the source
    pub delete_removed: bool,

    /// Delete source objects instead of copying them
    pub delete_source: bool,

    /// Log intended actions without issuing mutating calls
    pub dry_run: bool,

    /// Compare objects by size alone
    pub size_only: bool,

    /// Request AES256 server-side encryption on copies
    pub encrypt: bool,

    /// Grant the destination bucket owner full control instead of mirroring ACLs
    pub cross_account_copy: bool,

    /// Storage class for copied objects
    pub storage_class: StorageClass,

    /// Optional last-modified cutoff
    pub age_filter: Option<AgeFilter>,

    /// Attempts per mutating operation
    pub max_retries: u32,

    /// Number of concurrent workers
    pub max_threads: usize,

    /// Objects larger than this use multipart copy and size-only comparison
    pub multipart_threshold: u64,

    /// Part size for multipart copies
    pub multipart_part_size: u64,

    /// Work queue capacity; computed from available memory when unset
    pub queue_capacity: Option<usize>,

    /// Interval at which masters check for completion
    #[serde(with = "duration_millis")]
    pub poll_interval: Duration,

    /// Pause between attempts of a failed operation
    #[serde(with = "duration_millis")]
    pub retry_backoff: Duration,

    /// Upper bound on waiting for workers at shutdown
    #[serde(with = "duration_millis")]
    pub shutdown_timeout: Duration,
}

impl Default for MirrorOptions {
    fn default() -> Self {
        Self {
            source_bucket: String::new(),
            source_prefix: None,
            dest_bucket: String::new(),
            dest_prefix: None,
            move_objects: false,
            delete_removed: false,
            delete_source: false,
            dry_run: false,
            size_only: false,
            encrypt: false,
            cross_account_copy: false,
            storage_class: StorageClass::Standard,
            age_filter: None,
            max_retries: 5,
            max_threads: 100,
            multipart_threshold: DEFAULT_MULTIPART_THRESHOLD,
            multipart_part_size: DEFAULT_PART_SIZE,
            queue_capacity: None,
            poll_interval: Duration::from_millis(100),
            retry_backoff: Duration::from_millis(10),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl MirrorOptions {
    /// Create options for mirroring `source_bucket` into `dest_bucket`.
    pub fn new(source_bucket: impl Into<String>, dest_bucket: impl Into<String>) -> Self {
        Self {
            source_bucket: source_bucket.into(),
            dest_bucket: dest_bucket.into(),
            ..Default::default()
        }
    }

    /// Set the source prefix.
    pub fn with_source_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.source_prefix = Some(prefix.into());
        self
    }

    /// Set the destination prefix.
    pub fn with_dest_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.dest_prefix = Some(prefix.into());
        self
    }

    /// Delete sources after copying.
    pub fn with_move(mut self, enabled: bool) -> Self {
        self.move_objects = enabled;
        self
    }

    /// Prune destination keys that are absent from the source.
    pub fn with_delete_removed(mut self, enabled: bool) -> Self {
        self.delete_removed = enabled;
        self
    }

    /// Delete source keys instead of copying.
    pub fn with_delete_source(mut self, enabled: bool) -> Self {
        self.delete_source = enabled;
        self
    }

    pub fn with_dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    pub fn with_size_only(mut self, enabled: bool) -> Self {
        self.size_only = enabled;
        self
    }

    pub fn with_encrypt(mut self, enabled: bool) -> Self {
        self.encrypt = enabled;
        self
    }

    pub fn with_cross_account_copy(mut self, enabled: bool) -> Self {
        self.cross_account_copy = enabled;
        self
    }

    pub fn with_storage_class(mut self, storage_class: StorageClass) -> Self {
        self.storage_class = storage_class;
        self
    }

    pub fn with_age_filter(mut self, filter: AgeFilter) -> Self {
        self.age_filter = Some(filter);
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_max_threads(mut self, threads: usize) -> Self {
        self.max_threads = threads;
        self
    }

    pub fn with_multipart_threshold(mut self, bytes: u64) -> Self {
        self.multipart_threshold = bytes;
        self
    }

    pub fn with_multipart_part_size(mut self, bytes: u64) -> Self {
        self.multipart_part_size = bytes;
        self
    }

    /// Fix the work queue capacity instead of deriving it from memory.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Source prefix, or `""`.
    pub fn source_prefix(&self) -> &str {
        self.source_prefix.as_deref().unwrap_or("")
    }

    /// Destination prefix; falls back to the source prefix when unset so
    /// keys keep their names.
    pub fn effective_dest_prefix(&self) -> &str {
        self.dest_prefix
            .as_deref()
            .unwrap_or_else(|| self.source_prefix())
    }

    /// Whether a prune pass over the destination runs next to the primary pass.
    pub fn prunes_destination(&self) -> bool {
        self.delete_removed && !self.delete_source
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.source_bucket.is_empty() {
            return Err("source bucket must not be empty".to_string());
        }
        if self.dest_bucket.is_empty() && !self.delete_source {
            return Err("destination bucket must not be empty".to_string());
        }
        if self.max_threads == 0 {
            return Err("max_threads must be at least 1".to_string());
        }
        if self.max_retries == 0 {
            return Err("max_retries must be at least 1".to_string());
        }
        if self.multipart_part_size < MIN_PART_SIZE {
            return Err(format!(
                "multipart_part_size must be at least {MIN_PART_SIZE} bytes"
            ));
        }
        if self.queue_capacity == Some(0) {
            return Err("queue_capacity must be at least 1".to_string());
        }
        if self.move_objects && self.delete_source {
            return Err("move and delete cannot be combined".to_string());
        }
        if self.move_objects && self.delete_removed {
            return Err("move and delete-removed cannot be combined".to_string());
        }
        if !self.delete_source
            && self.source_bucket == self.dest_bucket
            && self.source_prefix() == self.effective_dest_prefix()
        {
            return Err("source and destination are the same location".to_string());
        }
        Ok(())
    }
}

/// Serde helper for Duration serialization as milliseconds.
mod duration_millis {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
