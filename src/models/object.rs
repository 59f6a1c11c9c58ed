//! Represents objects as reported by a bucket listing.

use chrono::{DateTime, Utc};

/// A single object discovered while listing a bucket.
///
/// Only the key drives the mirror; the size shows up in progress output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectEntry {
    /// Object key (path-like identifier within the bucket).
    pub key: String,

    /// Size in bytes as reported by the listing.
    pub size: u64,

    /// Timestamp when the object was last modified, if the backend reports it.
    pub last_modified: Option<DateTime<Utc>>,
}

impl ObjectEntry {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            last_modified: None,
        }
    }
}

/// One batch of objects returned by a single listing call, in listing order.
#[derive(Clone, Debug, Default)]
pub struct ObjectPage {
    pub objects: Vec<ObjectEntry>,
}

impl ObjectPage {
    pub fn new(objects: Vec<ObjectEntry>) -> Self {
        Self { objects }
    }
}

