//! Core traits for s3-mirror.
//!
//! This crate defines the abstraction the mirror engine consumes:
//! - [`ObjectStore`] - List, inspect, copy and delete objects

pub mod store;

pub use store::*;
