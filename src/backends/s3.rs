//! S3-compatible backend built on the AWS SDK.
//!
//! Works against AWS as well as MinIO, cloudscale, DigitalOcean Spaces and
//! other services that speak ListObjectsV2 and GetObject. SDK errors are
//! mapped to [`BackendError`] here and nowhere else.

use super::{BackendError, BackendResult, ObjectBody, ObjectSource, PageStream};
use crate::{
    config::S3Settings,
    models::object::{ObjectEntry, ObjectPage},
};
use async_stream::try_stream;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, meta::region::RegionProviderChain};
use aws_sdk_s3::{
    Client,
    config::Credentials,
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
};
use chrono::DateTime;
use futures::StreamExt;
use tracing::debug;

const DEFAULT_REGION: &str = "us-east-1";

/// Service error codes that mean the request was not authenticated.
const CREDENTIAL_ERROR_CODES: [&str; 6] = [
    "InvalidAccessKeyId",
    "SignatureDoesNotMatch",
    "ExpiredToken",
    "InvalidToken",
    "TokenRefreshRequired",
    "AuthorizationHeaderMalformed",
];

/// Fragments the SDK uses when no identity could be resolved before sending.
const CREDENTIAL_RESOLVE_MARKERS: [&str; 3] =
    ["no credentials", "failed to load credentials", "resolve identity"];

#[derive(Clone, Debug)]
pub struct S3Source {
    client: Client,
}

impl S3Source {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from resolved settings.
    ///
    /// Explicit keys win; otherwise the SDK's default credential chain is
    /// used. Missing credentials are not an error here, they surface on the
    /// first request.
    pub async fn connect(settings: &S3Settings) -> Self {
        let region = RegionProviderChain::first_try(settings.region.clone().map(Region::new))
            .or_default_provider()
            .or_else(Region::new(DEFAULT_REGION));

        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region);

        if let Some(endpoint) = &settings.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        if let Some((access_key, secret_key)) = settings.static_credentials() {
            let credentials =
                Credentials::new(access_key, secret_key, None, None, "bucket-backup");
            loader = loader.credentials_provider(credentials);
        }

        let sdk_config = loader.load().await;

        // Custom endpoints rarely support virtual-hosted bucket addressing.
        let builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        let s3_config = if settings.endpoint_url.is_some() {
            builder.force_path_style(true).build()
        } else {
            builder.build()
        };

        Self::new(Client::from_conf(s3_config))
    }
}

#[async_trait]
impl ObjectSource for S3Source {
    fn list_pages<'a>(&'a self, bucket: &'a str) -> PageStream<'a> {
        let stream = try_stream! {
            let mut continuation_token: Option<String> = None;

            loop {
                let mut req = self.client.list_objects_v2().bucket(bucket);
                if let Some(ref token) = continuation_token {
                    req = req.continuation_token(token);
                }

                let resp = req.send().await.map_err(classify_sdk_error)?;

                let objects = resp
                    .contents
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|obj| {
                        let key = obj.key?;
                        if key.is_empty() {
                            return None;
                        }
                        let last_modified = obj
                            .last_modified
                            .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()));
                        let size = obj.size.unwrap_or(0).max(0) as u64;
                        Some(ObjectEntry {
                            last_modified,
                            ..ObjectEntry::new(key, size)
                        })
                    })
                    .collect::<Vec<_>>();

                debug!("listed page of {} objects from {}", objects.len(), bucket);
                yield ObjectPage::new(objects);

                if resp.is_truncated != Some(true) {
                    break;
                }
                continuation_token = resp.next_continuation_token;
                if continuation_token.is_none() {
                    break;
                }
            }
        };

        stream.boxed()
    }

    async fn fetch(&self, bucket: &str, key: &str) -> BackendResult<ObjectBody> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(classify_sdk_error)?;

        let mut body = output.body;
        let chunks = try_stream! {
            while let Some(chunk) = body
                .try_next()
                .await
                .map_err(|err| BackendError::Stream(DisplayErrorContext(&err).to_string()))?
            {
                yield chunk;
            }
        };

        Ok(chunks.boxed())
    }
}

/// Map an SDK error onto the backend taxonomy.
///
/// Authentication problems are recognised either by service error code or,
/// when the request never left the client, by the identity-resolution
/// message. A 403 with valid credentials is an authorization failure and
/// stays separate, so callers can decide whether it is fatal. Everything the service answered otherwise keeps its code; the
/// rest is treated as transport trouble.
fn classify_sdk_error<E>(err: SdkError<E>) -> BackendError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let detail = DisplayErrorContext(&err).to_string();

    if let SdkError::ServiceError(ref service_err) = err {
        let code = service_err.err().code().unwrap_or("Unknown");
        let message = service_err.err().message().unwrap_or("no message");
        if is_credentials_code(code) || service_err.raw().status().as_u16() == 401 {
            return BackendError::Credentials(format!("{code}: {message}"));
        }
        if code == "AccessDenied" || service_err.raw().status().as_u16() == 403 {
            return BackendError::AccessDenied(format!("{code}: {message}"));
        }
        return BackendError::Service {
            code: code.to_string(),
            message: message.to_string(),
        };
    }

    if mentions_missing_credentials(&detail) {
        return BackendError::Credentials(detail);
    }

    BackendError::Transport(detail)
}

fn is_credentials_code(code: &str) -> bool {
    CREDENTIAL_ERROR_CODES.contains(&code)
}

fn mentions_missing_credentials(detail: &str) -> bool {
    let lower = detail.to_ascii_lowercase();
    CREDENTIAL_RESOLVE_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}
