//! Object-level types: listing records, metadata, fingerprints and copy requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::options::StorageClass;

/// One object as reported by a bucket listing.
///
/// Produced by the lister and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySummary {
    /// The object key (full path within the bucket)
    pub key: String,

    /// Size of the object in bytes
    pub size: u64,

    /// Last modified timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,

    /// Content hash (ETag) without surrounding quotes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl KeySummary {
    /// Create a summary with only a key and size.
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            last_modified: None,
            etag: None,
        }
    }

    /// Set the content hash.
    pub fn with_etag(mut self, etag: impl AsRef<str>) -> Self {
        self.etag = Some(normalize_etag(etag.as_ref()));
        self
    }

    /// Set the last modified timestamp.
    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = Some(last_modified);
        self
    }

    /// Fingerprint of this object as seen by the listing.
    pub fn fingerprint(&self, size_only: bool) -> Fingerprint {
        Fingerprint::for_comparison(self.size, self.etag.clone(), size_only)
    }
}

/// Metadata returned by a HEAD request on a single object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// Content length in bytes
    pub content_length: u64,

    /// Content hash (ETag) without surrounding quotes
    pub etag: Option<String>,

    /// Last modified timestamp
    pub last_modified: Option<DateTime<Utc>>,

    /// Content type, if the store reported one
    pub content_type: Option<String>,
}

impl ObjectMetadata {
    /// Create metadata with a length and optional hash.
    pub fn new(content_length: u64, etag: Option<&str>) -> Self {
        Self {
            content_length,
            etag: etag.map(normalize_etag),
            ..Default::default()
        }
    }

    /// Fingerprint of this object as seen by a metadata lookup.
    pub fn fingerprint(&self, size_only: bool) -> Fingerprint {
        Fingerprint::for_comparison(self.content_length, self.etag.clone(), size_only)
    }
}

/// Size plus optional content hash.
///
/// Two fingerprints are equal when sizes match and hashes match, where two
/// absent hashes count as matching. Size-only comparison is expressed by
/// building both sides with [`Fingerprint::for_comparison`] and
/// `size_only = true`, which drops the hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub size: u64,
    pub hash: Option<String>,
}

impl Fingerprint {
    pub fn new(size: u64, hash: Option<String>) -> Self {
        Self { size, hash }
    }

    /// A fingerprint that carries no hash.
    pub fn size_only(size: u64) -> Self {
        Self { size, hash: None }
    }

    /// Build a fingerprint for comparison under the run's size-only setting.
    pub fn for_comparison(size: u64, hash: Option<String>, size_only: bool) -> Self {
        if size_only {
            Self::size_only(size)
        } else {
            Self::new(size, hash)
        }
    }
}

/// Strip the quotes S3 puts around ETag values.
pub fn normalize_etag(etag: &str) -> String {
    etag.trim().trim_matches('"').to_string()
}

/// Who a grant applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grantee {
    CanonicalUser(String),
    Group(String),
    Email(String),
}

impl Grantee {
    /// Render in the `x-amz-grant-*` header syntax.
    pub fn header_value(&self) -> String {
        match self {
            Grantee::CanonicalUser(id) => format!("id=\"{id}\""),
            Grantee::Group(uri) => format!("uri=\"{uri}\""),
            Grantee::Email(addr) => format!("emailAddress=\"{addr}\""),
        }
    }
}

/// Access granted to a grantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    FullControl,
    Read,
    ReadAcp,
    Write,
    WriteAcp,
}

/// A single ACL entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub grantee: Grantee,
    pub permission: Permission,
}

/// An object's access control list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectAcl {
    /// Canonical id of the owner
    pub owner: Option<String>,
    pub grants: Vec<Grant>,
}

impl ObjectAcl {
    /// Comma-joined grantees holding `permission`, or `None` if nobody does.
    pub fn grant_header(&self, permission: Permission) -> Option<String> {
        let grantees: Vec<String> = self
            .grants
            .iter()
            .filter(|g| g.permission == permission)
            .map(|g| g.grantee.header_value())
            .collect();

        if grantees.is_empty() {
            None
        } else {
            Some(grantees.join(", "))
        }
    }
}

/// Access control to apply to the copied object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AclPolicy {
    /// Replay the source object's grants verbatim
    Mirror(ObjectAcl),
    /// Canned `bucket-owner-full-control`, used for cross-account copies
    BucketOwnerFullControl,
}

/// A server-side copy of one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyRequest {
    pub source_bucket: String,
    pub source_key: String,
    pub dest_bucket: String,
    pub dest_key: String,
    pub storage_class: StorageClass,
    /// Request AES256 server-side encryption
    pub encrypt: bool,
    pub acl: AclPolicy,
}
