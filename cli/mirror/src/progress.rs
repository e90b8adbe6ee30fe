//! Progress reporting for s3-mirror.

use sm_cli_common::{format_bytes, format_number};
use sm_mirror::{MirrorContext, MirrorStats};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Periodic progress line on stderr while a mirror runs.
pub struct ProgressReporter {
    enabled: bool,
    interval: Duration,
    stop: CancellationToken,
    handle: Option<JoinHandle<()>>,
    start_time: Instant,
}

impl ProgressReporter {
    pub fn new(enabled: bool, interval_secs: u64) -> Self {
        Self {
            enabled,
            interval: Duration::from_secs(interval_secs),
            stop: CancellationToken::new(),
            handle: None,
            start_time: Instant::now(),
        }
    }

    /// Start the background progress reporter.
    pub fn start(&mut self, ctx: Arc<MirrorContext>) {
        if !self.enabled {
            return;
        }

        let stop = self.stop.clone();
        let interval = self.interval;
        let start_time = self.start_time;

        let handle = tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.tick().await; // Skip first immediate tick

            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = timer.tick() => {
                        report(ctx.stats(), "", start_time.elapsed());
                    }
                }
            }
        });

        self.handle = Some(handle);
    }

    /// Stop the reporter and print a final line.
    pub async fn stop(mut self, stats: &MirrorStats) {
        if !self.enabled {
            return;
        }

        self.stop.cancel();

        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }

        report(stats, "Complete: ", self.start_time.elapsed());
    }
}

fn report(stats: &MirrorStats, label: &str, elapsed: Duration) {
    let _ = writeln!(
        io::stderr(),
        "[Progress] {}{} listed, {} copied, {} deleted, {} errors, {} copied ({:.1}s elapsed)",
        label,
        format_number(stats.keys_listed()),
        format_number(stats.objects_copied()),
        format_number(stats.objects_deleted()),
        format_number(stats.copy_errors() + stats.delete_errors()),
        format_bytes(stats.bytes_copied()),
        elapsed.as_secs_f64()
    );
}
