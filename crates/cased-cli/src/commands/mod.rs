//! CLI commands and argument parsing.

pub mod drain;
pub mod fetch;
pub mod list;
pub mod publish;

use std::time::Duration;

use anyhow::{Context, Result};
use cased_core::ClientConfig;
use clap::{Args, Parser, Subcommand};

/// Cased - publish and query audit events
#[derive(Parser)]
#[command(name = "cased")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Publish an event
    Publish(publish::PublishArgs),

    /// Fetch a single event
    Fetch(fetch::FetchArgs),

    /// List events
    List(list::ListArgs),

    /// Replay events spooled by the file reliability backend
    Drain(drain::DrainArgs),

    /// Print version information
    Version,
}

/// API endpoints, keys and timeout shared by every command.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// API base URL for reads
    #[arg(long, env = "CASED_API_BASE")]
    pub api_base: Option<String>,

    /// Base URL events are published to
    #[arg(long, env = "CASED_PUBLISH_BASE")]
    pub publish_base: Option<String>,

    /// Key used to publish events
    #[arg(long, env = "CASED_PUBLISH_KEY", hide_env_values = true)]
    pub publish_key: Option<String>,

    /// Default policy key used for reads
    #[arg(long, env = "CASED_POLICY_KEY", hide_env_values = true)]
    pub policy_key: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "CASED_TIMEOUT_SECS", default_value = "30")]
    pub timeout: u64,
}

impl ConnectionArgs {
    /// Loads `CASED_*` configuration and applies the command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment holds invalid values.
    pub fn config(&self) -> Result<ClientConfig> {
        let config = ClientConfig::from_env().context("Invalid CASED_* environment")?;
        Ok(self.apply(config))
    }

    fn apply(&self, mut config: ClientConfig) -> ClientConfig {
        if let Some(base) = &self.api_base {
            config = config.with_api_base(base.as_str());
        }
        if let Some(base) = &self.publish_base {
            config = config.with_publish_base(base.as_str());
        }
        if let Some(key) = &self.publish_key {
            config = config.with_publish_key(key.as_str());
        }
        if let Some(key) = &self.policy_key {
            config = config.with_policy_key(key.as_str());
        }
        config.with_timeout(Duration::from_secs(self.timeout))
    }
}
