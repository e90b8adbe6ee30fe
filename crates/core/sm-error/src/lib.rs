//! Error types and classification for s3-mirror.
//!
//! This crate provides:
//! - [`MirrorError`] - Top-level error enum for a mirror run
//! - [`StoreError`] - Failures reported by an object store
//! - [`ErrorCategory`] for skip/retry decision making

use thiserror::Error;

/// Top-level error type for s3-mirror.
#[derive(Error, Debug)]
pub enum MirrorError {
    /// Object store errors outside of a per-key job
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Enumerating a bucket failed; fatal for the run
    #[error("Listing s3://{bucket}/{} failed: {source}", prefix.as_deref().unwrap_or(""))]
    Listing {
        bucket: String,
        prefix: Option<String>,
        #[source]
        source: StoreError,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The run was cancelled from outside
    #[error("Interrupted")]
    Interrupted,

    /// Generic errors (wrapped anyhow)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors reported by an object store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The object does not exist
    #[error("Not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Permission denied
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Malformed or rejected request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Request rate exceeded (SlowDown, 429, 503)
    #[error("Throttled: {0}")]
    Throttled(String),

    /// Timeouts, dropped connections, 5xx responses
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Any other provider error
    #[error("Provider error: {0}")]
    Provider(String),
}

/// Error classification for per-key decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Absence of the object; drives create-vs-skip decisions, not a failure
    NotFound,

    /// Worth another attempt after a backoff
    ///
    /// Examples: network timeout, 503, throttling
    Transient,

    /// Retrying will not help
    ///
    /// Examples: access denied, malformed request
    Permanent,
}

impl StoreError {
    /// Build a `NotFound` error for the given location.
    pub fn not_found(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Classify a provider failure from its HTTP status and S3 error code.
    ///
    /// `status` is `None` when no response was received (dispatch failure,
    /// timeout), which is always treated as transient.
    pub fn from_status(
        status: Option<u16>,
        code: Option<&str>,
        bucket: &str,
        key: &str,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();

        match code {
            Some("NoSuchKey" | "NotFound") => return Self::not_found(bucket, key),
            Some("AccessDenied" | "AllAccessDisabled") => return Self::AccessDenied(message),
            Some("SlowDown" | "TooManyRequests" | "RequestLimitExceeded") => {
                return Self::Throttled(message);
            }
            _ => {}
        }

        match status {
            None => Self::Transient(message),
            Some(404) => Self::not_found(bucket, key),
            Some(401 | 403) => Self::AccessDenied(message),
            Some(429 | 503) => Self::Throttled(message),
            Some(400 | 405 | 411 | 412 | 416) => Self::InvalidRequest(message),
            Some(408) => Self::Transient(message),
            Some(s) if s >= 500 => Self::Transient(message),
            Some(_) => Self::Provider(message),
        }
    }

    /// Returns true if this error means the object is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Classify this error for skip/retry decisions.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::AccessDenied(_) | Self::InvalidRequest(_) => ErrorCategory::Permanent,
            Self::Throttled(_) | Self::Transient(_) | Self::Provider(_) => {
                ErrorCategory::Transient
            }
        }
    }
}

/// Result type alias using MirrorError.
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Result type alias for object store calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
