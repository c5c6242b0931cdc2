//! Relational backend setup.
//!
//! Builds the `PostgreSQL` metric store from the configured connection string
//! and makes sure its table exists before the server accepts traffic.

use anyhow::{Context, Result};
use shared::storage::PostgresMetricStore;
use std::time::Duration;

/// How long one attempt waits for a pooled connection.
pub const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(2);

/// Connects to `dsn` and bootstraps the `metrics` table.
///
/// Connection-refused failures are retried by the store's retry policy.
///
/// # Errors
///
/// Returns an error if the DSN is invalid or the table cannot be created
/// after retries.
pub async fn connect_store(dsn: &str) -> Result<PostgresMetricStore> {
    let store = PostgresMetricStore::connect_lazy(dsn, ACQUIRE_TIMEOUT)
        .context("Invalid DATABASE_DSN")?;

    store
        .bootstrap()
        .await
        .context("Failed to create the metrics table")?;

    tracing::info!("Connected to PostgreSQL metric store");
    Ok(store)
}
