//! Publish command implementation.
//!
//! Publishes a single event through the full pipeline, optionally spooling
//! it to disk when delivery fails.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use cased_client::{CasedClient, HttpTransport};
use cased_core::ClientConfig;
use cased_publisher::{
    BackendSelection, FileBackend, FileBackendConfig, PublishOutcome, Publisher,
};
use clap::Args;
use serde_json::Value;
use tracing::info;

use super::ConnectionArgs;

/// Arguments for the publish command.
#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Event data as a JSON object
    #[arg(short, long)]
    pub data: String,

    /// Reliability backend to fall back to (only `file` is available here)
    #[arg(short, long, env = "CASED_RELIABILITY_BACKEND")]
    pub backend: Option<String>,

    /// Spool directory for the file backend (implies `--backend file`)
    #[arg(long, env = "CASED_SPOOL_DIR")]
    pub spool: Option<PathBuf>,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

/// Runs the publish command.
///
/// # Errors
///
/// Returns an error if:
/// - The event data is not a JSON object
/// - The spool directory cannot be created
/// - Delivery fails and the event could not be spooled
pub fn run(args: &PublishArgs) -> Result<()> {
    let data: Value = serde_json::from_str(&args.data).context("Event data is not valid JSON")?;

    let mut config = args.connection.config()?;
    config.reliability_backend = None;

    let client = build_client(config, args)?;
    info!(url = client.publisher().publish_url(), "Publishing event");

    let outcome = client.events().publish(data)?;
    println!("{}", describe(outcome.as_ref()));
    Ok(())
}

fn build_client(config: ClientConfig, args: &PublishArgs) -> Result<CasedClient> {
    let transport = Arc::new(HttpTransport::from_config(&config)?);
    let mut builder = Publisher::builder(transport.clone()).config(&config);

    match backend_name(args).as_deref() {
        None => {}
        Some(FileBackend::NAME) => {
            let spool = args
                .spool
                .clone()
                .map_or_else(FileBackendConfig::default, FileBackendConfig::new);
            let backend = FileBackend::new(spool).context("Failed to open spool directory")?;
            builder = builder
                .with_backend(Arc::new(backend))
                .default_backend(BackendSelection::from(FileBackend::NAME));
        }
        Some(other) => bail!(
            "Unknown reliability backend '{other}' (available: {})",
            FileBackend::NAME
        ),
    }

    Ok(CasedClient::with_publisher(
        config,
        transport,
        builder.build()?,
    ))
}

/// Backend requested on the command line, if any.
fn backend_name(args: &PublishArgs) -> Option<String> {
    args.backend
        .clone()
        .or_else(|| args.spool.as_ref().map(|_| FileBackend::NAME.to_string()))
}

fn describe(outcome: Option<&PublishOutcome>) -> String {
    match outcome {
        None => "Publishing is disabled, event dropped".to_string(),
        Some(PublishOutcome::Sent(response)) => {
            format!("✓ Event published (HTTP {})", response.status_code)
        }
        Some(PublishOutcome::Deferred { backend, error }) => {
            format!("Event stored in '{backend}' backend for later delivery: {error}")
        }
    }
}
