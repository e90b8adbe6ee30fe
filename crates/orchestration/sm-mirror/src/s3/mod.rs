//! S3 implementation of the object store capability.

mod client;
mod error;
mod list;
mod store;

pub use client::{S3Config, create_s3_client};
pub use list::list_objects;
pub use store::{S3Store, copy_source};
