//! Server configuration module.
//!
//! Handles loading configuration from environment variables with sensible defaults.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_ADDRESS: &str = "0.0.0.0:8080";
const DEFAULT_STORE_INTERVAL_SECS: u64 = 300;
const DEFAULT_FILE_STORAGE_PATH: &str = "/tmp/metrics-db.json";

/// Server configuration.
///
/// Configuration values can be set via environment variables:
/// - `ADDRESS`: The address to bind to (default: "0.0.0.0:8080")
/// - `STORE_INTERVAL`: Seconds between snapshots of the in-memory store (default: 300)
/// - `FILE_STORAGE_PATH`: Snapshot file; empty disables snapshots (default: "/tmp/metrics-db.json")
/// - `RESTORE`: Load the snapshot before serving (default: true)
/// - `DATABASE_DSN`: `PostgreSQL` connection string; selects the relational backend
/// - `KEY`: Shared key for request and response signatures
#[derive(Debug, Clone)]
pub struct Config {
    /// The address to bind to.
    pub address: String,
    /// Period of the snapshot task.
    pub store_interval: Duration,
    /// Snapshot file, if snapshots are enabled.
    pub file_storage_path: Option<PathBuf>,
    /// Whether to restore the snapshot on startup.
    pub restore: bool,
    /// Connection string of the relational backend.
    pub database_dsn: Option<String>,
    /// Shared signing key.
    pub key: Option<String>,
}

impl Config {
    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `STORE_INTERVAL` is set but is not a positive number of seconds
    /// - `RESTORE` is set but is not a boolean
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let address = lookup("ADDRESS").unwrap_or_else(|| DEFAULT_ADDRESS.to_string());

        let store_interval = lookup("STORE_INTERVAL")
            .map(|s| s.trim().parse::<u64>())
            .transpose()
            .context("STORE_INTERVAL must be a number of seconds")?
            .unwrap_or(DEFAULT_STORE_INTERVAL_SECS);
        if store_interval == 0 {
            bail!("STORE_INTERVAL must be greater than zero");
        }

        let file_storage_path = match lookup("FILE_STORAGE_PATH") {
            Some(path) if path.trim().is_empty() => None,
            Some(path) => Some(PathBuf::from(path)),
            None => Some(PathBuf::from(DEFAULT_FILE_STORAGE_PATH)),
        };

        let restore = lookup("RESTORE")
            .map(|s| s.trim().parse::<bool>())
            .transpose()
            .context("RESTORE must be true or false")?
            .unwrap_or(true);

        let database_dsn = lookup("DATABASE_DSN").filter(|s| !s.trim().is_empty());
        let key = lookup("KEY").filter(|s| !s.is_empty());

        Ok(Self {
            address,
            store_interval: Duration::from_secs(store_interval),
            file_storage_path,
            restore,
            database_dsn,
            key,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            store_interval: Duration::from_secs(DEFAULT_STORE_INTERVAL_SECS),
            file_storage_path: Some(PathBuf::from(DEFAULT_FILE_STORAGE_PATH)),
            restore: true,
            database_dsn: None,
            key: None,
        }
    }
}
