//! Common utilities for integration tests.
//!
//! Shared LocalStack client setup and bucket helpers.

pub mod localstack;

pub use localstack::{LocalStackTestContext, test_data};
