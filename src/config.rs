use crate::services::mirror_service::FailurePolicy;
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, fmt, path::PathBuf};

const DEFAULT_BUCKET: &str = "bucket";
const DEFAULT_BACKUP_DIR: &str = "./backup";
const DEFAULT_ENDPOINT_URL: &str = "https://objects.lpg.cloudscale.ch";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bucket: String,
    pub backup_dir: PathBuf,
    pub failure_policy: FailurePolicy,
    pub s3: S3Settings,
}

/// Connection settings handed to the S3 backend.
#[derive(Clone, Default)]
pub struct S3Settings {
    /// `None` means the provider's default endpoint.
    pub endpoint_url: Option<String>,
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Mirror an S3-compatible bucket into a dated local backup tree")]
pub struct Args {
    /// Bucket to back up (overrides S3_BUCKET_NAME)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Root directory for backups (overrides BACKUP_DIR)
    #[arg(long)]
    pub backup_dir: Option<PathBuf>,

    /// S3 endpoint URL, empty for the provider default (overrides S3_ENDPOINT_URL)
    #[arg(long)]
    pub endpoint_url: Option<String>,

    /// Signing region (overrides S3_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// Abort on the first object that fails instead of continuing (overrides BACKUP_FAIL_FAST)
    #[arg(long)]
    pub fail_fast: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::from_sources(Args::parse(), |name| env::var(name).ok())
    }

    /// Merge parsed arguments with values looked up through `lookup`.
    ///
    /// Arguments win over the environment, the environment wins over defaults.
    pub fn from_sources(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env_bucket = lookup("S3_BUCKET_NAME").unwrap_or_else(|| DEFAULT_BUCKET.into());
        let env_backup_dir = lookup("BACKUP_DIR").unwrap_or_else(|| DEFAULT_BACKUP_DIR.into());
        let env_endpoint =
            lookup("S3_ENDPOINT_URL").unwrap_or_else(|| DEFAULT_ENDPOINT_URL.into());
        let env_fail_fast = match lookup("BACKUP_FAIL_FAST") {
            Some(value) => parse_flag(&value)
                .with_context(|| format!("parsing BACKUP_FAIL_FAST value `{}`", value))?,
            None => false,
        };

        let bucket = args.bucket.unwrap_or(env_bucket);
        if bucket.trim().is_empty() {
            bail!("bucket name must not be empty");
        }

        let failure_policy = if args.fail_fast || env_fail_fast {
            FailurePolicy::FailFast
        } else {
            FailurePolicy::BestEffort
        };

        Ok(Self {
            bucket,
            backup_dir: args
                .backup_dir
                .unwrap_or_else(|| PathBuf::from(env_backup_dir)),
            failure_policy,
            s3: S3Settings {
                endpoint_url: non_empty(args.endpoint_url.unwrap_or(env_endpoint)),
                region: non_empty(args.region.or_else(|| lookup("S3_REGION")).unwrap_or_default()),
                access_key_id: lookup("S3_ACCESS_KEY_ID").and_then(non_empty),
                secret_access_key: lookup("S3_SECRET_ACCESS_KEY").and_then(non_empty),
            },
        })
    }
}

impl S3Settings {
    /// Both keys, when both were supplied.
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(access), Some(secret)) => Some((access.as_str(), secret.as_str())),
            _ => None,
        }
    }
}

impl fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Settings")
            .field("endpoint_url", &self.endpoint_url)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => bail!("expected a boolean, got `{}`", other),
    }
}
