//! In-memory bucket used as a test double for [`ObjectSource`].

use super::{BackendError, BackendResult, ObjectBody, ObjectSource, PageStream};
use crate::models::object::{ObjectEntry, ObjectPage};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, stream};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

pub struct MemorySource {
    objects: BTreeMap<String, Bytes>,
    page_size: usize,
    failing_keys: BTreeSet<String>,
    denied_keys: BTreeSet<String>,
    broken_bodies: BTreeSet<String>,
    reject_credentials: bool,
    fetched: Mutex<Vec<String>>,
    pages_served: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            page_size: 1000,
            failing_keys: BTreeSet::new(),
            denied_keys: BTreeSet::new(),
            broken_bodies: BTreeSet::new(),
            reject_credentials: false,
            fetched: Mutex::new(Vec::new()),
            pages_served: AtomicUsize::new(0),
        }
    }

    pub fn with_object(mut self, key: &str, body: impl Into<Bytes>) -> Self {
        self.objects.insert(key.to_string(), body.into());
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Make `fetch` fail for this key with a service error.
    pub fn failing(mut self, key: &str) -> Self {
        self.failing_keys.insert(key.to_string());
        self
    }

    /// Make `fetch` refuse this key as a bucket policy would.
    pub fn denying(mut self, key: &str) -> Self {
        self.denied_keys.insert(key.to_string());
        self
    }

    /// Serve the first chunk of this key, then break the body stream.
    pub fn failing_mid_body(mut self, key: &str) -> Self {
        self.broken_bodies.insert(key.to_string());
        self
    }

    /// Reject every call as if the access key were invalid.
    pub fn rejecting_credentials(mut self) -> Self {
        self.reject_credentials = true;
        self
    }

    /// Keys fetched so far, in request order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().map(|f| f.clone()).unwrap_or_default()
    }

    pub fn pages_served(&self) -> usize {
        self.pages_served.load(Ordering::SeqCst)
    }

    fn credentials_error() -> BackendError {
        BackendError::Credentials("InvalidAccessKeyId: The access key does not exist".into())
    }
}

#[async_trait]
impl ObjectSource for MemorySource {
    fn list_pages<'a>(&'a self, _bucket: &'a str) -> PageStream<'a> {
        if self.reject_credentials {
            return stream::once(async { Err(Self::credentials_error()) }).boxed();
        }

        let entries = self
            .objects
            .iter()
            .map(|(key, body)| ObjectEntry::new(key.clone(), body.len() as u64))
            .collect::<Vec<_>>();
        let pages = entries
            .chunks(self.page_size)
            .map(|chunk| ObjectPage::new(chunk.to_vec()))
            .collect::<Vec<_>>();

        stream::iter(pages)
            .map(move |page| {
                self.pages_served.fetch_add(1, Ordering::SeqCst);
                Ok(page)
            })
            .boxed()
    }

    async fn fetch(&self, _bucket: &str, key: &str) -> BackendResult<ObjectBody> {
        if self.reject_credentials {
            return Err(Self::credentials_error());
        }
        if let Ok(mut fetched) = self.fetched.lock() {
            fetched.push(key.to_string());
        }
        if self.denied_keys.contains(key) {
            return Err(BackendError::AccessDenied("AccessDenied: Access Denied".into()));
        }
        if self.failing_keys.contains(key) {
            return Err(BackendError::Service {
                code: "InternalError".into(),
                message: format!("injected failure for {key}"),
            });
        }
        let body = self
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| BackendError::Service {
                code: "NoSuchKey".into(),
                message: "The specified key does not exist.".into(),
            })?;

        // Split into two chunks so writers see more than one piece.
        let mid = body.len() / 2;
        let tail = if self.broken_bodies.contains(key) {
            Err(BackendError::Stream("connection reset by peer".into()))
        } else {
            Ok(body.slice(mid..))
        };
        let chunks = vec![Ok(body.slice(..mid)), tail];
        Ok(stream::iter(chunks).boxed())
    }
}
