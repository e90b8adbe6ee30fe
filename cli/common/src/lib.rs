//! Shared utilities for s3-mirror CLI binaries.
//!
//! Logging setup, the `--log-level` argument and human-readable
//! formatting of byte counts, numbers and durations.

pub mod args;
pub mod format;
pub mod logging;

pub use args::LogLevel;
pub use format::{format_bytes, format_duration, format_number};
pub use logging::init_logging;
