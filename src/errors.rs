use crate::backends::BackendError;
use std::{io, path::PathBuf};
use thiserror::Error;

/// Process exit codes, so schedulers can tell outcomes apart.
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_PARTIAL: u8 = 1;
pub const EXIT_FATAL: u8 = 2;
pub const EXIT_CREDENTIALS: u8 = 3;
pub const EXIT_INTERRUPTED: u8 = 130;

/// Reasons an object key cannot be materialized below the run directory.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("key is empty")]
    Empty,
    #[error("key is absolute")]
    Absolute,
    #[error("key contains a `..` segment")]
    ParentTraversal,
    #[error("key contains a backslash, NUL or control character")]
    ForbiddenCharacter,
    #[error("key segment `{0}` is not a plain path component")]
    InvalidSegment(String),
}

/// What went wrong with one particular object.
#[derive(Debug, Error)]
pub enum ObjectFault {
    #[error("invalid key path: {0}")]
    InvalidKey(#[from] KeyError),
    #[error("download failed: {0}")]
    Fetch(#[source] BackendError),
    #[error("writing `{}` failed: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Closed error taxonomy for a backup run.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("storage credentials missing or rejected for bucket `{bucket}`: {source}")]
    Credentials {
        bucket: String,
        #[source]
        source: BackendError,
    },
    #[error("listing bucket `{bucket}` failed: {source}")]
    Transport {
        bucket: String,
        #[source]
        source: BackendError,
    },
    #[error("object `{key}` in bucket `{bucket}`: {source}")]
    ObjectIo {
        bucket: String,
        key: String,
        #[source]
        source: ObjectFault,
    },
    #[error("cannot create directory `{}`: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type MirrorResult<T> = Result<T, MirrorError>;

impl MirrorError {
    pub fn object(bucket: &str, key: &str, fault: impl Into<ObjectFault>) -> Self {
        MirrorError::ObjectIo {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source: fault.into(),
        }
    }

    pub fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        MirrorError::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Credential failures end the run regardless of the failure policy.
    pub fn is_credentials(&self) -> bool {
        matches!(self, MirrorError::Credentials { .. })
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            MirrorError::Credentials { .. } => EXIT_CREDENTIALS,
            MirrorError::ObjectIo { .. } => EXIT_PARTIAL,
            MirrorError::Transport { .. } | MirrorError::Filesystem { .. } => EXIT_FATAL,
        }
    }
}
