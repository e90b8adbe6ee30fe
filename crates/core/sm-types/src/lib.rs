//! Core types for s3-mirror.
//!
//! This crate provides the foundational types used throughout the system:
//! - [`KeySummary`] - A listing record for one object key
//! - [`Fingerprint`] - The (size, hash) pair used to decide equivalence
//! - [`CopyRequest`] - Everything a server-side copy needs
//! - [`MirrorOptions`] - Immutable configuration for one mirror run
//! - [`AgeFilter`] - Last-modified cutoff with a direction

pub mod age;
pub mod object;
pub mod options;
pub mod units;

pub use age::*;
pub use object::*;
pub use options::*;
pub use units::*;
