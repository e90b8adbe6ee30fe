//! Shared per-run context.

use sm_types::MirrorOptions;
use tokio_util::sync::CancellationToken;

use crate::stats::MirrorStats;

/// Everything a job needs that is shared across the whole run.
///
/// Constructed once per run and handed around as `Arc<MirrorContext>`.
/// The options are never mutated after construction.
#[derive(Debug)]
pub struct MirrorContext {
    options: MirrorOptions,
    stats: MirrorStats,
    cancel: CancellationToken,
}

impl MirrorContext {
    pub fn new(options: MirrorOptions) -> Self {
        Self::with_cancellation(options, CancellationToken::new())
    }

    /// Create a context whose run is cancelled through `cancel`.
    pub fn with_cancellation(options: MirrorOptions, cancel: CancellationToken) -> Self {
        Self {
            options,
            stats: MirrorStats::new(),
            cancel,
        }
    }

    pub fn options(&self) -> &MirrorOptions {
        &self.options
    }

    pub fn stats(&self) -> &MirrorStats {
        &self.stats
    }

    /// Token that fires on external cancellation.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
