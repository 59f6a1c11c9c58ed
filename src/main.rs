use anyhow::Result;
use futures::{Stream, StreamExt, stream};
use std::{process::ExitCode, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod backends;
mod config;
mod errors;
mod models;
mod services;

use backends::s3::S3Source;
use errors::{EXIT_FATAL, EXIT_INTERRUPTED, EXIT_PARTIAL, EXIT_SUCCESS, MirrorError};
use models::report::MirrorReport;
use services::{mirror_service::MirrorService, run_directory::allocate_run_directory};

#[tokio::main]
async fn main() -> ExitCode {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(report) => ExitCode::from(summarize(&report)),
        Err(err) => {
            tracing::error!("Backup failed: {:#}", err);
            let code = err
                .downcast_ref::<MirrorError>()
                .map(MirrorError::exit_code)
                .unwrap_or(EXIT_FATAL);
            ExitCode::from(code)
        }
    }
}

async fn run() -> Result<MirrorReport> {
    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;
    tracing::debug!("Starting bucket-backup with config: {:?}", cfg);

    // --- Stop between objects on Ctrl-C ---
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    let interrupts = stream::unfold((), |()| async {
        tokio::signal::ctrl_c().await.ok().map(|()| ((), ()))
    });
    tokio::spawn(watch_interrupts(Box::pin(interrupts), on_signal, || {
        std::process::exit(i32::from(EXIT_INTERRUPTED));
    }));

    // --- Storage backend ---
    let source = S3Source::connect(&cfg.s3).await;

    // --- Run directory ---
    let today = chrono::Local::now().date_naive();
    let destination = allocate_run_directory(&cfg.backup_dir, today).await?;

    tracing::info!(
        "Downloading bucket '{}' to local directory: {}",
        cfg.bucket,
        destination.display()
    );

    // --- Mirror ---
    let mirror = MirrorService::new(Arc::new(source), cfg.failure_policy).with_cancellation(cancel);
    let report = mirror.mirror(&cfg.bucket, &destination).await?;

    Ok(report)
}

/// First interrupt: stop before the next object. Second interrupt: `abort`.
///
/// A stuck download would otherwise hold the run open. Finished objects were
/// renamed into place, so aborting leaves them intact.
async fn watch_interrupts<S, A>(mut interrupts: S, cancel: CancellationToken, abort: A)
where
    S: Stream<Item = ()> + Unpin,
    A: FnOnce(),
{
    if interrupts.next().await.is_none() {
        return;
    }
    tracing::warn!("Interrupt received, finishing current object (Ctrl-C again to abort)");
    cancel.cancel();

    if interrupts.next().await.is_some() {
        tracing::error!("Second interrupt received, aborting");
        abort();
    }
}

/// Log the final status line and pick the exit code.
fn summarize(report: &MirrorReport) -> u8 {
    if report.cancelled {
        tracing::warn!(
            "Backup of '{}' interrupted after {} objects; partial copy left in {}",
            report.bucket,
            report.transferred,
            report.destination.display()
        );
        return EXIT_INTERRUPTED;
    }

    if report.is_complete() {
        tracing::info!(
            "Download completed successfully: {} objects ({} bytes, {} directories) in {}",
            report.transferred,
            report.bytes,
            report.directories,
            report.destination.display()
        );
        return EXIT_SUCCESS;
    }

    for failure in &report.failures {
        tracing::error!("failed: {}: {}", failure.key, failure.error);
    }
    tracing::error!(
        "Download finished with {} failed objects ({} transferred) in {}",
        report.failures.len(),
        report.transferred,
        report.destination.display()
    );
    EXIT_PARTIAL
}
