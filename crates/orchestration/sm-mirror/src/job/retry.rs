//! Retry loop for mutating object store calls.

use sm_error::{StoreError, StoreResult};
use sm_types::MirrorOptions;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_millis(10),
        }
    }
}

impl RetryPolicy {
    /// Policy taken from the run options.
    pub fn from_options(options: &MirrorOptions) -> Self {
        Self {
            max_attempts: options.max_retries,
            backoff: options.retry_backoff,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

}

/// How a retried operation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    /// An attempt succeeded; no further attempts were made.
    Succeeded { value: T, attempts: u32 },
    /// Every allowed attempt failed.
    Exhausted { attempts: u32, last_error: StoreError },
    /// Cancellation arrived during a backoff pause.
    Interrupted { attempts: u32 },
}

impl<T> RetryOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Succeeded { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Succeeded { attempts, .. }
            | RetryOutcome::Exhausted { attempts, .. }
            | RetryOutcome::Interrupted { attempts } => *attempts,
        }
    }
}

/// Run `operation` up to `policy.max_attempts` times.
///
/// The operation receives the zero-based attempt number. Failures are
/// logged and followed by a backoff pause; cancellation during the pause
/// ends the loop immediately. Every failure kind spends the same budget.
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    operation_name: &str,
    key: &str,
    mut operation: F,
) -> RetryOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let mut last_error = StoreError::Provider("no attempts were made".to_string());
    let mut attempts = 0;

    for attempt in 0..policy.max_attempts {
        attempts = attempt + 1;

        match operation(attempt).await {
            Ok(value) => {
                debug!(operation = operation_name, key, attempt, "Succeeded");
                return RetryOutcome::Succeeded { value, attempts };
            }
            Err(e) => {
                error!(
                    operation = operation_name,
                    key,
                    attempt,
                    error = %e,
                    "Attempt failed"
                );

                last_error = e;
            }
        }

        if attempts < policy.max_attempts {
            tokio::select! {
                _ = cancel.cancelled() => {
                    error!(operation = operation_name, key, "Interrupted while waiting to retry");
                    return RetryOutcome::Interrupted { attempts };
                }
                _ = tokio::time::sleep(policy.backoff) => {}
            }
        }
    }

    RetryOutcome::Exhausted {
        attempts,
        last_error,
    }
}
