//! src/services/mirror_service.rs
//!
//! MirrorService — copies every object of a bucket into a local run
//! directory, recreating the key hierarchy as subdirectories. Objects are
//! processed one at a time in listing order. Payloads are streamed into a
//! temporary sibling and renamed over the target, so an interrupted or
//! failed download never leaves a truncated file behind.

use crate::{
    backends::{BackendError, ObjectSource},
    errors::{MirrorError, MirrorResult, ObjectFault},
    models::{
        object::ObjectEntry,
        report::{MirrorReport, ObjectFailure},
    },
    services::key_path::{LocalTarget, resolve_key, target_path},
};
use futures::StreamExt;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What to do when a single object cannot be mirrored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Record the failure and move on to the next object.
    #[default]
    BestEffort,
    /// Stop the run at the first failed object.
    FailFast,
}

/// Result of mirroring one listing entry.
enum Mirrored {
    File(u64),
    Directory,
}

#[derive(Clone)]
pub struct MirrorService {
    /// Backend the bucket is read from.
    pub source: Arc<dyn ObjectSource>,

    pub policy: FailurePolicy,

    /// Checked before each object; a cancelled run keeps what it wrote.
    pub cancel: CancellationToken,
}

impl MirrorService {
    pub fn new(source: Arc<dyn ObjectSource>, policy: FailurePolicy) -> Self {
        Self {
            source,
            policy,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Mirror every object in `bucket` into `destination`.
    ///
    /// - Credential failures end the run immediately.
    /// - A listing that breaks off ends the run as a transport error.
    /// - Per-object failures follow the configured [`FailurePolicy`].
    ///
    /// Existing files are overwritten, so mirroring twice into the same
    /// directory converges on the bucket's current contents.
    pub async fn mirror(&self, bucket: &str, destination: &Path) -> MirrorResult<MirrorReport> {
        let mut report = MirrorReport::new(bucket, destination);
        let mut pages = self.source.list_pages(bucket);

        'pages: while let Some(page) = pages.next().await {
            let page = page.map_err(|err| listing_error(bucket, err))?;
            debug!("processing page of {} objects", page.objects.len());

            for entry in page.objects {
                if self.cancel.is_cancelled() {
                    warn!("cancellation requested, stopping before `{}`", entry.key);
                    report.cancelled = true;
                    break 'pages;
                }

                match self.mirror_object(bucket, destination, &entry).await {
                    Ok(Mirrored::File(bytes)) => {
                        report.transferred += 1;
                        report.bytes += bytes;
                    }
                    Ok(Mirrored::Directory) => report.directories += 1,
                    Err(err) if err.is_credentials() => return Err(err),
                    Err(err) => match self.policy {
                        FailurePolicy::FailFast => return Err(err),
                        FailurePolicy::BestEffort => {
                            warn!("skipping object: {}", err);
                            report.failures.push(ObjectFailure {
                                key: entry.key.clone(),
                                error: err,
                            });
                        }
                    },
                }
            }
        }

        Ok(report)
    }

    /// Materialize one listing entry below `destination`.
    async fn mirror_object(
        &self,
        bucket: &str,
        destination: &Path,
        entry: &ObjectEntry,
    ) -> MirrorResult<Mirrored> {
        let key = entry.key.as_str();
        let resolved = resolve_key(key).map_err(|err| MirrorError::object(bucket, key, err))?;

        match resolved {
            LocalTarget::Directory(relative) => {
                let dir = target_path(destination, &relative);
                fs::create_dir_all(&dir)
                    .await
                    .map_err(|source| write_error(bucket, key, &dir, source))?;
                debug!("created directory {} for marker {}", dir.display(), key);
                Ok(Mirrored::Directory)
            }
            LocalTarget::File(relative) => {
                let file_path = target_path(destination, &relative);
                info!(
                    "Downloading {} ({} bytes) to {}",
                    key,
                    entry.size,
                    file_path.display()
                );
                let bytes = self.download_to(bucket, key, &file_path).await?;
                Ok(Mirrored::File(bytes))
            }
        }
    }

    /// Stream an object into `file_path`, replacing any previous copy.
    ///
    /// The object is opened before any directory is created, so a rejected
    /// request leaves nothing behind.
    async fn download_to(&self, bucket: &str, key: &str, file_path: &Path) -> MirrorResult<u64> {
        let mut body = self
            .source
            .fetch(bucket, key)
            .await
            .map_err(|err| fetch_error(bucket, key, err))?;

        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            write_error(
                bucket,
                key,
                file_path,
                std::io::Error::new(ErrorKind::Other, "object path missing parent directory"),
            )
        })?;
        fs::create_dir_all(&parent)
            .await
            .map_err(|source| write_error(bucket, key, &parent, source))?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path)
            .await
            .map_err(|source| write_error(bucket, key, &tmp_path, source))?;

        let mut size_bytes: u64 = 0;
        while let Some(chunk_res) = body.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(fetch_error(bucket, key, err));
                }
            };
            size_bytes += chunk.len() as u64;
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(write_error(bucket, key, &tmp_path, err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(write_error(bucket, key, &tmp_path, err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(write_error(bucket, key, &tmp_path, err));
        }
        drop(file);

        if let Err(err) = fs::rename(&tmp_path, file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                let replaced = async {
                    fs::remove_file(file_path).await?;
                    fs::rename(&tmp_path, file_path).await
                }
                .await;
                if let Err(err) = replaced {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(write_error(bucket, key, file_path, err));
                }
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(write_error(bucket, key, file_path, err));
            }
        }

        Ok(size_bytes)
    }
}

/// Being refused the listing itself leaves nothing to mirror, so a denial
/// there is as fatal as bad credentials.
fn listing_error(bucket: &str, err: BackendError) -> MirrorError {
    match err {
        BackendError::Credentials(_) | BackendError::AccessDenied(_) => MirrorError::Credentials {
            bucket: bucket.to_string(),
            source: err,
        },
        other => MirrorError::Transport {
            bucket: bucket.to_string(),
            source: other,
        },
    }
}

/// A denied object is an object failure and follows the failure policy.
fn fetch_error(bucket: &str, key: &str, err: BackendError) -> MirrorError {
    match err {
        BackendError::Credentials(_) => MirrorError::Credentials {
            bucket: bucket.to_string(),
            source: err,
        },
        other => MirrorError::object(bucket, key, ObjectFault::Fetch(other)),
    }
}

fn write_error(bucket: &str, key: &str, path: &Path, source: std::io::Error) -> MirrorError {
    MirrorError::object(
        bucket,
        key,
        ObjectFault::Write {
            path: PathBuf::from(path),
            source,
        },
    )
}
