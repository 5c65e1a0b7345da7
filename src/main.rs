use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use minca_inventory::cli::{self, Cli};
use minca_inventory::config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr so tables on stdout stay clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "minca_inventory=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    // Failures are already shown to the user by the time run returns
    match cli::run(cli, config).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            tracing::debug!("Exiting after error: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
