//! Statistics for mirror runs.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache line size on most modern CPUs (64 bytes).
const CACHE_LINE_SIZE: usize = 64;

/// A cache-line-padded atomic counter to prevent false sharing.
///
/// Every worker bumps these counters concurrently; keeping each on its own
/// cache line stops unrelated counters from contending.
#[repr(C, align(64))]
#[derive(Debug)]
struct PaddedAtomicU64 {
    value: AtomicU64,
    _padding: [u8; CACHE_LINE_SIZE - std::mem::size_of::<AtomicU64>()],
}

impl Default for PaddedAtomicU64 {
    fn default() -> Self {
        Self {
            value: AtomicU64::new(0),
            _padding: [0; CACHE_LINE_SIZE - std::mem::size_of::<AtomicU64>()],
        }
    }
}

impl PaddedAtomicU64 {
    #[inline]
    fn load(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    #[inline]
    fn add(&self, val: u64) {
        self.value.fetch_add(val, Ordering::Relaxed);
    }
}

/// Counters for one mirror run.
///
/// Counters only ever increase. No ordering is implied between distinct
/// counters, so all updates are `Relaxed`.
#[derive(Debug)]
pub struct MirrorStats {
    started_at: DateTime<Utc>,
    completed_at: Mutex<Option<DateTime<Utc>>>,

    objects_copied: PaddedAtomicU64,
    objects_deleted: PaddedAtomicU64,
    copy_errors: PaddedAtomicU64,
    delete_errors: PaddedAtomicU64,
    bytes_copied: PaddedAtomicU64,

    // Raw API calls issued
    copy_calls: PaddedAtomicU64,
    delete_calls: PaddedAtomicU64,
    move_calls: PaddedAtomicU64,

    // Bookkeeping, never read by decisions
    keys_listed: PaddedAtomicU64,
    jobs_rejected: PaddedAtomicU64,
}

impl Default for MirrorStats {
    fn default() -> Self {
        Self::new()
    }
}

impl MirrorStats {
    /// Create a new stats tracker with the current time as start time.
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            completed_at: Mutex::new(None),
            objects_copied: PaddedAtomicU64::default(),
            objects_deleted: PaddedAtomicU64::default(),
            copy_errors: PaddedAtomicU64::default(),
            delete_errors: PaddedAtomicU64::default(),
            bytes_copied: PaddedAtomicU64::default(),
            copy_calls: PaddedAtomicU64::default(),
            delete_calls: PaddedAtomicU64::default(),
            move_calls: PaddedAtomicU64::default(),
            keys_listed: PaddedAtomicU64::default(),
            jobs_rejected: PaddedAtomicU64::default(),
        }
    }

    /// Mark the run as complete. Only the first call has an effect.
    pub fn complete(&self) {
        let mut completed = self.completed_at.lock();
        if completed.is_none() {
            *completed = Some(Utc::now());
        }
    }

    /// Record a finished copy (or move) of `bytes` bytes.
    pub fn record_copied(&self, bytes: u64) {
        self.objects_copied.add(1);
        self.bytes_copied.add(bytes);
    }

    pub fn record_deleted(&self) {
        self.objects_deleted.add(1);
    }

    pub fn record_copy_error(&self) {
        self.copy_errors.add(1);
    }

    pub fn record_delete_error(&self) {
        self.delete_errors.add(1);
    }

    pub fn record_copy_call(&self) {
        self.copy_calls.add(1);
    }

    pub fn record_delete_call(&self) {
        self.delete_calls.add(1);
    }

    pub fn record_move_call(&self) {
        self.move_calls.add(1);
    }

    pub fn record_key_listed(&self) {
        self.keys_listed.add(1);
    }

    /// Record a job dropped because the work queue was full.
    pub fn record_rejected(&self) {
        self.jobs_rejected.add(1);
    }

    pub fn objects_copied(&self) -> u64 {
        self.objects_copied.load()
    }

    pub fn objects_deleted(&self) -> u64 {
        self.objects_deleted.load()
    }

    pub fn copy_errors(&self) -> u64 {
        self.copy_errors.load()
    }

    pub fn delete_errors(&self) -> u64 {
        self.delete_errors.load()
    }

    pub fn bytes_copied(&self) -> u64 {
        self.bytes_copied.load()
    }

    pub fn copy_calls(&self) -> u64 {
        self.copy_calls.load()
    }

    pub fn delete_calls(&self) -> u64 {
        self.delete_calls.load()
    }

    pub fn move_calls(&self) -> u64 {
        self.move_calls.load()
    }

    pub fn keys_listed(&self) -> u64 {
        self.keys_listed.load()
    }

    pub fn jobs_rejected(&self) -> u64 {
        self.jobs_rejected.load()
    }

    /// Elapsed time so far, or total run time once complete.
    pub fn duration(&self) -> Duration {
        let end = (*self.completed_at.lock()).unwrap_or_else(Utc::now);
        end - self.started_at
    }

    /// Create a snapshot of the current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            started_at: self.started_at,
            completed_at: *self.completed_at.lock(),
            objects_copied: self.objects_copied(),
            objects_deleted: self.objects_deleted(),
            copy_errors: self.copy_errors(),
            delete_errors: self.delete_errors(),
            bytes_copied: self.bytes_copied(),
            copy_calls: self.copy_calls(),
            delete_calls: self.delete_calls(),
            move_calls: self.move_calls(),
            keys_listed: self.keys_listed(),
            jobs_rejected: self.jobs_rejected(),
        }
    }
}

/// A serializable snapshot of mirror statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub objects_copied: u64,
    pub objects_deleted: u64,
    pub copy_errors: u64,
    pub delete_errors: u64,
    pub bytes_copied: u64,
    pub copy_calls: u64,
    pub delete_calls: u64,
    pub move_calls: u64,
    pub keys_listed: u64,
    pub jobs_rejected: u64,
}

impl StatsSnapshot {
    /// Total run duration, if the run completed.
    pub fn duration(&self) -> Option<Duration> {
        self.completed_at.map(|end| end - self.started_at)
    }

    /// Copy and delete failures combined.
    pub fn error_count(&self) -> u64 {
        self.copy_errors + self.delete_errors
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Copy throughput in MB per second.
    pub fn copy_throughput_mbps(&self) -> Option<f64> {
        self.duration().map(|d| {
            let secs = d.num_milliseconds() as f64 / 1000.0;
            if secs > 0.0 {
                (self.bytes_copied as f64 / 1_000_000.0) / secs
            } else {
                0.0
            }
        })
    }

    /// Objects copied or deleted per second.
    pub fn objects_per_second(&self) -> Option<f64> {
        self.duration().map(|d| {
            let secs = d.num_milliseconds() as f64 / 1000.0;
            if secs > 0.0 {
                (self.objects_copied + self.objects_deleted) as f64 / secs
            } else {
                0.0
            }
        })
    }
}
