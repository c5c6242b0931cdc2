//! Agent configuration.
//!
//! Every option can be given on the command line or through an environment
//! variable. [`Cli::into_config`] validates the raw values once at startup.

use anyhow::{bail, Context, Result};
use clap::Parser;
use reqwest::Url;
use std::time::Duration;

/// Metricflow agent - pushes process and host metrics to a collector
#[derive(Debug, Parser)]
#[command(name = "agent")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Collector address (`host:port` or a full URL)
    #[arg(short = 'a', long, env = "ADDRESS", default_value = "localhost:8080")]
    pub address: String,

    /// Seconds between two samples
    #[arg(
        short = 'p',
        long,
        env = "POLL_INTERVAL",
        default_value_t = 2,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_interval: u64,

    /// Seconds between two reports
    #[arg(
        short = 'r',
        long,
        env = "REPORT_INTERVAL",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub report_interval: u64,

    /// Maximum number of concurrent requests to the collector
    #[arg(
        short = 'l',
        long,
        env = "RATE_LIMIT",
        default_value_t = 1,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub rate_limit: u64,

    /// Shared key used to sign request bodies
    #[arg(short = 'k', long, env = "KEY")]
    pub key: Option<String>,

    /// Send request bodies uncompressed
    #[arg(long, env = "NO_GZIP")]
    pub no_gzip: bool,

    /// Per-request timeout in milliseconds
    #[arg(
        long = "timeout",
        env = "REQUEST_TIMEOUT",
        default_value_t = 2000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout_ms: u64,
}

/// Validated agent configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Base URL of the collector, without trailing slash.
    pub collector_url: String,
    /// Sampling period.
    pub poll_interval: Duration,
    /// Reporting period.
    pub report_interval: Duration,
    /// Maximum number of in-flight deliveries.
    pub rate_limit: usize,
    /// Signing key; `None` disables signing.
    pub key: Option<String>,
    /// Whether request bodies are gzip-compressed.
    pub gzip: bool,
    /// Timeout of a single delivery attempt.
    pub request_timeout: Duration,
}

impl Cli {
    /// Validates the parsed arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if the collector address is not a valid HTTP URL or
    /// the rate limit does not fit in `usize`.
    pub fn into_config(self) -> Result<AgentConfig> {
        let collector_url = normalize_address(&self.address)?;
        let rate_limit = usize::try_from(self.rate_limit).context("RATE_LIMIT is too large")?;

        if self.report_interval < self.poll_interval {
            tracing::warn!(
                poll_interval = self.poll_interval,
                report_interval = self.report_interval,
                "Report interval is shorter than poll interval"
            );
        }

        Ok(AgentConfig {
            collector_url,
            poll_interval: Duration::from_secs(self.poll_interval),
            report_interval: Duration::from_secs(self.report_interval),
            rate_limit,
            key: self.key.filter(|key| !key.is_empty()),
            gzip: !self.no_gzip,
            request_timeout: Duration::from_millis(self.timeout_ms),
        })
    }
}

fn normalize_address(address: &str) -> Result<String> {
    let address = address.trim();
    let url = if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{address}")
    };

    let parsed = Url::parse(&url).with_context(|| format!("Invalid ADDRESS '{address}'"))?;
    if parsed.scheme() != "http" {
        bail!(
            "Invalid ADDRESS '{address}': unsupported scheme '{}', only http is available",
            parsed.scheme()
        );
    }
    if parsed.host_str().is_none() {
        bail!("Invalid ADDRESS '{address}': missing host");
    }

    Ok(url.trim_end_matches('/').to_string())
}
