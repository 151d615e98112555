//! Fetch command implementation.

use anyhow::{Context, Result};
use cased_client::CasedClient;
use clap::Args;
use tracing::info;

use super::ConnectionArgs;

/// Arguments for the fetch command.
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Event id
    pub id: String,

    /// Policy key to use instead of the configured one
    #[arg(long, hide_env_values = true)]
    pub key: Option<String>,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

/// Runs the fetch command.
///
/// # Errors
///
/// Returns an error if no policy key is available or the request fails.
pub fn run(args: &FetchArgs) -> Result<()> {
    let client = CasedClient::new(args.connection.config()?)?;
    info!(id = %args.id, "Fetching event");

    let response = client
        .events()
        .fetch(&args.id, args.key.as_deref())
        .with_context(|| format!("Failed to fetch event {}", args.id))?;

    println!("{}", serde_json::to_string_pretty(&response.body)?);
    Ok(())
}
