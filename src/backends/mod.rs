//! Storage backends the mirror can read from.
//!
//! The mirror only needs two capabilities from a bucket: enumerate its
//! objects page by page, and stream one object's bytes. [`ObjectSource`]
//! captures exactly that so the S3 client can be swapped for an in-memory
//! double in tests.

#[cfg(test)]
pub mod memory;
pub mod s3;

use crate::models::object::ObjectPage;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;

/// Backend faults, classified once at the adapter boundary.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Authentication is missing or was rejected by the service.
    #[error("credentials error: {0}")]
    Credentials(String),
    /// Authenticated, but a policy forbids this request.
    #[error("access denied: {0}")]
    AccessDenied(String),
    /// The endpoint could not be reached or the request did not complete.
    #[error("transport error: {0}")]
    Transport(String),
    /// The service answered with an error code (e.g. NoSuchBucket, NoSuchKey).
    #[error("{code}: {message}")]
    Service { code: String, message: String },
    /// The object body broke off while streaming.
    #[error("object body stream failed: {0}")]
    Stream(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Lazily fetched listing pages, finite and not restartable.
pub type PageStream<'a> = BoxStream<'a, BackendResult<ObjectPage>>;

/// Payload of one object as a stream of chunks.
pub type ObjectBody = BoxStream<'static, BackendResult<Bytes>>;

#[async_trait]
pub trait ObjectSource: Send + Sync {
    /// List every object in `bucket`. Page size is up to the backend.
    fn list_pages<'a>(&'a self, bucket: &'a str) -> PageStream<'a>;

    /// Open the payload of `key` for streaming.
    async fn fetch(&self, bucket: &str, key: &str) -> BackendResult<ObjectBody>;
}
