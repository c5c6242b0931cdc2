//! Metricflow agent binary.
//!
//! # Usage
//!
//! ```bash
//! agent --help
//! agent -a localhost:8080 -p 2 -r 10 -k secret
//! ```

#![deny(unsafe_code)]

use agent::Cli;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_config()?;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            return;
        }
        tracing::info!("Received Ctrl+C, stopping agent");
        signal_cancel.cancel();
    });

    agent::run(config, cancel).await
}
