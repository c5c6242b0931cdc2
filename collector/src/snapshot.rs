//! Periodic snapshots of the in-memory store.
//!
//! The full id -> record mapping is written as JSON to a sibling temporary file
//! and renamed over the snapshot, so readers never observe a partial file.
//! Snapshot failures are logged and never stop the collector.

use shared::models::Metric;
use shared::storage::{InMemoryMetricStore, MetricStoreError};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Errors that can occur while writing or reading a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The snapshot file could not be read or written.
    #[error("Snapshot I/O error on {path}: {source}")]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The snapshot content is not valid JSON.
    #[error("Snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store could not be read or replaced.
    #[error(transparent)]
    Store(#[from] MetricStoreError),
}

/// Writes and restores snapshots of an [`InMemoryMetricStore`].
#[derive(Debug, Clone)]
pub struct SnapshotManager {
    store: Arc<InMemoryMetricStore>,
    path: PathBuf,
    interval: Duration,
}

impl SnapshotManager {
    /// Creates a manager writing `store` to `path` every `interval`.
    #[must_use]
    pub fn new(store: Arc<InMemoryMetricStore>, path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            store,
            path: path.into(),
            interval,
        }
    }

    /// Returns the snapshot file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the current store content and returns the number of records.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the file cannot be
    /// written.
    pub async fn save(&self) -> Result<usize, SnapshotError> {
        let metrics = self.store.snapshot()?;
        let data = serde_json::to_vec_pretty(&metrics)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| io_error(parent, source))?;
        }

        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, &data)
            .await
            .map_err(|source| io_error(&tmp, source))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| io_error(&self.path, source))?;

        Ok(metrics.len())
    }

    /// Replaces the store content with the snapshot and returns the number of
    /// restored records. A missing file restores nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed; the store is left
    /// untouched in that case.
    pub async fn load(&self) -> Result<usize, SnapshotError> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(source) if source.kind() == ErrorKind::NotFound => return Ok(0),
            Err(source) => return Err(io_error(&self.path, source)),
        };

        let records: BTreeMap<String, Metric> = serde_json::from_slice(&data)?;
        let metrics: BTreeMap<String, Metric> = records
            .into_values()
            .map(|metric| (metric.id.clone(), metric))
            .collect();
        let count = metrics.len();
        self.store.restore(metrics)?;

        Ok(count)
    }

    /// Restores the snapshot, logging instead of failing.
    pub async fn restore_logged(&self) {
        match self.load().await {
            Ok(count) => {
                tracing::info!(path = %self.path.display(), count, "Restored metrics snapshot");
            }
            Err(err) => {
                tracing::error!(path = %self.path.display(), error = %err, "Failed to restore metrics snapshot");
            }
        }
    }

    async fn save_logged(&self) {
        match self.save().await {
            Ok(count) => {
                tracing::debug!(path = %self.path.display(), count, "Saved metrics snapshot");
            }
            Err(err) => {
                tracing::error!(path = %self.path.display(), error = %err, "Failed to save metrics snapshot");
            }
        }
    }

    /// Saves a snapshot every interval until `cancel` fires, then saves once
    /// more.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.save_logged().await,
                () = cancel.cancelled() => {
                    tracing::debug!("Snapshot task shutting down, writing final snapshot");
                    break;
                }
            }
        }

        self.save_logged().await;
        tracing::info!(path = %self.path.display(), "Final metrics snapshot written");
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> SnapshotError {
    SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    }
}
