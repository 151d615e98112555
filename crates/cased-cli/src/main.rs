//! Cased CLI - publish and query audit events from the command line.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cased=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Publish(args) => commands::publish::run(&args),
        Commands::Fetch(args) => commands::fetch::run(&args),
        Commands::List(args) => commands::list::run(&args),
        Commands::Drain(args) => commands::drain::run(&args),
        Commands::Version => {
            println!("cased {}", cased_core::VERSION);
            Ok(())
        }
    }
}
