//! Metricflow Agent
//!
//! This crate samples process and host statistics and pushes them to a
//! collector.
//!
//! # Architecture
//!
//! - [`sampler`]: `sysinfo`-backed sample sources, one per metric group
//! - [`accumulator`]: latest sample per group plus the poll counter
//! - [`scheduler`]: the poll and report loops
//! - [`pool`]: bounded set of delivery workers
//! - [`delivery`]: signed, compressed HTTP delivery with retry
//!
//! # Example
//!
//! ```no_run
//! use agent::{run, Cli};
//! use clap::Parser;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Cli::parse().into_config()?;
//!     run(config, CancellationToken::new()).await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod accumulator;
mod config;
pub mod delivery;
pub mod pool;
pub mod sampler;
pub mod scheduler;

pub use config::{AgentConfig, Cli};
pub use delivery::{DeliveryClient, DeliveryError};

use anyhow::{Context, Result};
use pool::WorkerPool;
use scheduler::Scheduler;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs the agent until `cancel` fires.
///
/// # Errors
///
/// Returns an error if the delivery client cannot be built from `config`.
pub async fn run(config: AgentConfig, cancel: CancellationToken) -> Result<()> {
    let client = DeliveryClient::from_config(&config).context("Invalid delivery settings")?;

    tracing::info!(
        endpoint = %client.endpoint(),
        poll_interval_secs = config.poll_interval.as_secs(),
        report_interval_secs = config.report_interval.as_secs(),
        rate_limit = config.rate_limit,
        gzip = config.gzip,
        signed = config.key.is_some(),
        "Metrics agent starting"
    );

    let pool = WorkerPool::spawn(config.rate_limit, Arc::new(client), cancel.clone());
    let scheduler = Scheduler::new(
        config.poll_interval,
        config.report_interval,
        sampler::default_sources(),
    );

    scheduler.run(pool, cancel).await;

    tracing::info!("Agent shutdown complete");
    Ok(())
}
