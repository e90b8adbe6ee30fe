//! Bounded, lossy work queue.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info};

use crate::job::Job;

/// Lower bound on queue slots per worker.
const SLOTS_PER_WORKER: usize = 10;

/// Share of available memory the queue may use.
const MEMORY_SHARE: f64 = 0.40;

/// Assumed bytes per queued job in the heuristic.
const BYTES_PER_SLOT: f64 = 20.0;

/// Why a push was refused. The job is handed back to the caller.
#[derive(Debug)]
pub enum PushError {
    /// The queue is at capacity
    Full(Job),
    /// The queue no longer accepts work
    Closed(Job),
}

impl PushError {
    pub fn into_job(self) -> Job {
        match self {
            PushError::Full(job) | PushError::Closed(job) => job,
        }
    }
}

/// Bounded FIFO of pending jobs shared by all workers.
///
/// Pushing never blocks: a full queue refuses the job. Popping waits until
/// a job is available or the queue is closed and empty.
#[derive(Debug)]
pub struct WorkQueue {
    sender: mpsc::Sender<Job>,
    receiver: Mutex<mpsc::Receiver<Job>>,
    closed: AtomicBool,
}

impl WorkQueue {
    /// Create a queue holding at most `capacity` jobs.
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            sender,
            receiver: Mutex::new(receiver),
            closed: AtomicBool::new(false),
        }
    }

    /// Enqueue without waiting.
    pub fn try_push(&self, job: Job) -> Result<(), PushError> {
        if self.is_closed() {
            return Err(PushError::Closed(job));
        }

        self.sender.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(job) => PushError::Full(job),
            mpsc::error::TrySendError::Closed(job) => PushError::Closed(job),
        })
    }

    /// Wait for the next job. Returns `None` once drained after
    /// [`close_and_drain`](Self::close_and_drain).
    pub async fn pop(&self) -> Option<Job> {
        let mut receiver = self.receiver.lock().await;
        receiver.recv().await
    }

    /// Stop accepting new jobs. Queued jobs stay until drained.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Close and discard everything still queued. Returns how many jobs
    /// were discarded.
    ///
    /// Waits for any in-progress [`pop`](Self::pop) to give up the receiver,
    /// so workers must be stopped first.
    pub async fn close_and_drain(&self) -> usize {
        self.closed.store(true, Ordering::Release);

        let mut receiver = self.receiver.lock().await;
        receiver.close();

        let mut dropped = 0;
        while let Ok(job) = receiver.try_recv() {
            debug!(key = job.key(), "Discarding queued job");
            dropped += 1;
        }
        dropped
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Jobs currently queued.
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }
}

/// Queue capacity for `threads` workers given `available_memory` bytes.
///
/// `max(10 * threads, 0.40 * available_memory / 20)`; without a memory
/// figure the per-worker floor is used.
pub fn queue_capacity(threads: usize, available_memory: Option<u64>) -> usize {
    let floor = SLOTS_PER_WORKER * threads.max(1);

    let by_memory = available_memory
        .map(|bytes| (bytes as f64 * MEMORY_SHARE / BYTES_PER_SLOT) as usize)
        .unwrap_or(0);

    let capacity = floor.max(by_memory);
    info!(
        threads,
        available_memory = available_memory.unwrap_or(0),
        capacity,
        "Computed work queue capacity"
    );
    capacity
}

/// Available memory in bytes, from `/proc/meminfo`.
pub fn available_memory() -> Option<u64> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    parse_mem_available(&meminfo)
}

fn parse_mem_available(meminfo: &str) -> Option<u64> {
    meminfo
        .lines()
        .find_map(|line| line.strip_prefix("MemAvailable:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb * 1024)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionTracker;
    use crate::context::MirrorContext;
    use crate::memory::MemoryStore;
    use sm_types::{KeySummary, MirrorOptions};
    use std::sync::Arc;

    fn job(tracker: &Arc<CompletionTracker>, key: &str) -> Job {
        let ctx = Arc::new(MirrorContext::new(MirrorOptions::new("src", "dst")));
        Job::for_key(
            ctx,
            Arc::new(MemoryStore::new()),
            KeySummary::new(key, 1),
            None,
            tracker.track(),
        )
    }

    #[test]
    fn test_capacity_floor_is_ten_per_thread() {
        assert_eq!(queue_capacity(8, None), 80);
        assert_eq!(queue_capacity(8, Some(1000)), 80);
    }

    #[test]
    fn test_capacity_scales_with_memory() {
        // 0.40 * 1_000_000 / 20
        assert_eq!(queue_capacity(1, Some(1_000_000)), 20_000);
    }

    #[test]
    fn test_parse_mem_available() {
        let meminfo = "MemTotal:       16000000 kB\nMemFree:         1000 kB\nMemAvailable:    2048 kB\n";
        assert_eq!(parse_mem_available(meminfo), Some(2048 * 1024));
        assert_eq!(parse_mem_available("MemTotal: 1 kB\n"), None);
    }

    #[tokio::test]
    async fn test_full_queue_rejects_without_blocking() {
        let tracker = CompletionTracker::new();
        let queue = WorkQueue::new(2);

        assert!(queue.try_push(job(&tracker, "a")).is_ok());
        assert!(queue.try_push(job(&tracker, "b")).is_ok());
        assert_eq!(queue.len(), 2);

        let rejected = queue.try_push(job(&tracker, "c")).unwrap_err();
        assert!(matches!(rejected, PushError::Full(_)));
        assert_eq!(tracker.outstanding(), 3);

        drop(rejected);
        assert_eq!(tracker.outstanding(), 2);
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn test_pop_is_fifo() {
        let tracker = CompletionTracker::new();
        let queue = WorkQueue::new(4);
        queue.try_push(job(&tracker, "first")).unwrap();
        queue.try_push(job(&tracker, "second")).unwrap();

        assert_eq!(queue.pop().await.unwrap().key(), "first");
        assert_eq!(queue.pop().await.unwrap().key(), "second");
    }

    #[tokio::test]
    async fn test_closed_queue_refuses_and_drains() {
        let tracker = CompletionTracker::new();
        let queue = WorkQueue::new(4);
        queue.try_push(job(&tracker, "a")).unwrap();
        queue.try_push(job(&tracker, "b")).unwrap();

        assert_eq!(queue.close_and_drain().await, 2);
        assert_eq!(tracker.outstanding(), 0);
        assert!(matches!(
            queue.try_push(job(&tracker, "c")),
            Err(PushError::Closed(_))
        ));
        assert!(queue.pop().await.is_none());
    }
}
