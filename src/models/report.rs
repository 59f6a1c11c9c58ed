//! Outcome of one mirror run.

use crate::errors::MirrorError;
use std::path::PathBuf;

/// A per-object failure recorded by a best-effort run.
#[derive(Debug)]
pub struct ObjectFailure {
    pub key: String,
    pub error: MirrorError,
}

/// Summary of a finished (or interrupted) mirror.
#[derive(Debug)]
pub struct MirrorReport {
    /// Bucket that was mirrored.
    pub bucket: String,

    /// Run directory the objects were written into.
    pub destination: PathBuf,

    /// Number of objects written to disk.
    pub transferred: usize,

    /// Total payload bytes written.
    pub bytes: u64,

    /// Directory placeholders materialized as empty directories.
    pub directories: usize,

    /// Objects that could not be mirrored.
    pub failures: Vec<ObjectFailure>,

    /// Whether the run stopped early because cancellation was requested.
    pub cancelled: bool,
}

impl MirrorReport {
    pub fn new(bucket: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            bucket: bucket.into(),
            destination: destination.into(),
            transferred: 0,
            bytes: 0,
            directories: 0,
            failures: Vec::new(),
            cancelled: false,
        }
    }

    /// True when every listed object was mirrored and the run was not cut short.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}
