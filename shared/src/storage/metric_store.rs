//! Metric storage trait and the in-memory implementation.
//!
//! Provides the `MetricStore` trait the collector ingests into, and an
//! `InMemoryMetricStore` that keeps every record in a lock-protected map.

use crate::models::Metric;
use crate::retry::{is_connection_refused, RetryableError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Errors that can occur during metric store operations.
#[derive(Debug, Error)]
pub enum MetricStoreError {
    /// Failed to acquire lock on the store.
    #[error("Failed to acquire lock on metric store")]
    LockError,

    /// The relational backend returned an error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row does not describe a valid metric.
    #[error("Corrupt metric row '{id}': {reason}")]
    Corrupt {
        /// Id of the offending row.
        id: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A counter sum does not fit in the stored integer type.
    #[error("Counter '{id}' overflows")]
    CounterOverflow {
        /// Id of the counter.
        id: String,
    },

    /// The backend does not support the operation.
    #[error("{0} is not supported by this storage backend")]
    Unsupported(&'static str),
}

impl RetryableError for MetricStoreError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::PoolTimedOut) => true,
            Self::Database(sqlx::Error::Io(err)) => err.kind() == ErrorKind::ConnectionRefused,
            Self::Database(err) => is_connection_refused(err),
            _ => false,
        }
    }
}

/// Trait for metric storage implementations.
///
/// Every write applies the merge rules of [`Metric::merge`]: a counter delta is
/// added to a stored counter, anything else replaces the stored record.
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Returns the record stored under `id`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    async fn get(&self, id: &str) -> Result<Option<Metric>, MetricStoreError>;

    /// Returns every stored record, sorted by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    async fn get_all(&self) -> Result<Vec<Metric>, MetricStoreError>;

    /// Merges a single record into the store and returns the stored result.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn record(&self, metric: Metric) -> Result<Metric, MetricStoreError>;

    /// Merges a batch atomically: either every record is stored or none is.
    ///
    /// Ids are expected to be unique within `metrics`. Results are returned in
    /// input order.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; nothing from the batch is kept.
    async fn record_batch(&self, metrics: Vec<Metric>) -> Result<Vec<Metric>, MetricStoreError>;

    /// Removes every record.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be cleared.
    async fn clean(&self) -> Result<(), MetricStoreError>;

    /// Checks backend connectivity.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable or has nothing to check.
    async fn ping(&self) -> Result<(), MetricStoreError>;
}

/// In-memory metric store implementation.
#[derive(Debug, Default)]
pub struct InMemoryMetricStore {
    metrics: RwLock<BTreeMap<String, Metric>>,
}

impl InMemoryMetricStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new store wrapped in an Arc for shared ownership.
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Returns a copy of the full id -> record mapping.
    ///
    /// # Errors
    ///
    /// Returns [`MetricStoreError::LockError`] if the lock is poisoned.
    pub fn snapshot(&self) -> Result<BTreeMap<String, Metric>, MetricStoreError> {
        let metrics = self
            .metrics
            .read()
            .map_err(|_| MetricStoreError::LockError)?;
        Ok(metrics.clone())
    }

    /// Replaces the whole content of the store with `metrics`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricStoreError::LockError`] if the lock is poisoned.
    pub fn restore(&self, metrics: BTreeMap<String, Metric>) -> Result<(), MetricStoreError> {
        let mut current = self
            .metrics
            .write()
            .map_err(|_| MetricStoreError::LockError)?;
        *current = metrics;
        Ok(())
    }

    /// Returns the number of stored records.
    ///
    /// # Errors
    ///
    /// Returns [`MetricStoreError::LockError`] if the lock is poisoned.
    pub fn len(&self) -> Result<usize, MetricStoreError> {
        let metrics = self
            .metrics
            .read()
            .map_err(|_| MetricStoreError::LockError)?;
        Ok(metrics.len())
    }

    /// Returns true if no record is stored.
    ///
    /// # Errors
    ///
    /// Returns [`MetricStoreError::LockError`] if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, MetricStoreError> {
        Ok(self.len()? == 0)
    }

    /// Merges `metric` onto `current` without writing anything back.
    fn merged(current: Option<&Metric>, metric: Metric) -> Result<Metric, MetricStoreError> {
        let Some(current) = current else {
            return Ok(metric);
        };
        let mut merged = current.clone();
        merged
            .merge(metric.value)
            .map_err(|_| MetricStoreError::CounterOverflow { id: metric.id })?;
        Ok(merged)
    }
}

#[async_trait]
impl MetricStore for InMemoryMetricStore {
    async fn get(&self, id: &str) -> Result<Option<Metric>, MetricStoreError> {
        let metrics = self
            .metrics
            .read()
            .map_err(|_| MetricStoreError::LockError)?;
        Ok(metrics.get(id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Metric>, MetricStoreError> {
        let metrics = self
            .metrics
            .read()
            .map_err(|_| MetricStoreError::LockError)?;
        Ok(metrics.values().cloned().collect())
    }

    async fn record(&self, metric: Metric) -> Result<Metric, MetricStoreError> {
        let mut metrics = self
            .metrics
            .write()
            .map_err(|_| MetricStoreError::LockError)?;
        let merged = Self::merged(metrics.get(&metric.id), metric)?;
        metrics.insert(merged.id.clone(), merged.clone());
        Ok(merged)
    }

    async fn record_batch(&self, batch: Vec<Metric>) -> Result<Vec<Metric>, MetricStoreError> {
        let mut metrics = self
            .metrics
            .write()
            .map_err(|_| MetricStoreError::LockError)?;
        // Stage the whole batch so an overflow leaves the map untouched.
        let mut staged: BTreeMap<String, Metric> = BTreeMap::new();
        let mut merged = Vec::with_capacity(batch.len());
        for metric in batch {
            let current = staged.get(&metric.id).or_else(|| metrics.get(&metric.id));
            let next = Self::merged(current, metric)?;
            staged.insert(next.id.clone(), next.clone());
            merged.push(next);
        }
        metrics.extend(staged);
        Ok(merged)
    }

    async fn clean(&self) -> Result<(), MetricStoreError> {
        let mut metrics = self
            .metrics
            .write()
            .map_err(|_| MetricStoreError::LockError)?;
        metrics.clear();
        Ok(())
    }

    async fn ping(&self) -> Result<(), MetricStoreError> {
        Err(MetricStoreError::Unsupported("ping"))
    }
}
