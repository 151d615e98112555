//! Drain command implementation.
//!
//! Replays events spooled by the file reliability backend. Events keep the
//! id and timestamp they were stamped with when first published.

use std::path::PathBuf;

use anyhow::{Context, Result};
use cased_client::HttpTransport;
use cased_core::{Request, Transport};
use cased_publisher::{FileBackend, FileBackendConfig};
use clap::Args;
use tracing::{info, warn};

use super::ConnectionArgs;

/// Arguments for the drain command.
#[derive(Args, Debug)]
pub struct DrainArgs {
    /// Spool directory to replay
    #[arg(long, env = "CASED_SPOOL_DIR")]
    pub spool: PathBuf,

    /// Print spooled events without sending or removing them
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

/// Counts from one drain run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Events delivered.
    pub sent: usize,
    /// Events that failed again and were left in the spool.
    pub kept: usize,
}

/// Runs the drain command.
///
/// # Errors
///
/// Returns an error if the spool cannot be read.
pub fn run(args: &DrainArgs) -> Result<()> {
    let backend = FileBackend::new(FileBackendConfig::new(&args.spool))
        .context("Failed to open spool directory")?;

    if args.dry_run {
        let events = backend.peek()?;
        for event in &events {
            println!("{}", serde_json::to_string(event)?);
        }
        eprintln!("{} events waiting in {}", events.len(), args.spool.display());
        return Ok(());
    }

    let config = args.connection.config()?;
    let transport = HttpTransport::from_config(&config)?;
    let url = format!("{}/", config.publish_base.trim_end_matches('/'));

    let report = drain(&backend, &transport, &url, config.publish_key.as_deref())?;
    println!(
        "✓ Sent {} events, {} left in the spool",
        report.sent, report.kept
    );
    Ok(())
}

/// Sends every spooled event to `url`. A spool file is removed only once
/// its event is delivered; failed events stay where they are.
///
/// # Errors
///
/// Returns an error if the spool directory cannot be read.
pub fn drain(
    backend: &FileBackend,
    transport: &dyn Transport,
    url: &str,
    publish_key: Option<&str>,
) -> Result<DrainReport> {
    info!(dir = %backend.dir().display(), "Replaying spooled events");

    let mut report = DrainReport::default();
    backend
        .drain_with(|event| {
            let request = Request::post(url)
                .with_api_key(publish_key.map(ToString::to_string))
                .with_data(event.clone());

            match transport
                .send(&request)
                .and_then(|response| response.error_for_status(url))
            {
                Ok(_) => {
                    report.sent += 1;
                    true
                }
                Err(e) => {
                    warn!(error = %e, "Delivery failed again, keeping event spooled");
                    report.kept += 1;
                    false
                }
            }
        })
        .context("Failed to read spooled events")?;

    Ok(report)
}
