//! `PostgreSQL`-backed metric store.
//!
//! Records live in a single `metrics` table keyed by id. Writes are upserts
//! that apply the merge rules in SQL, and a batch is written inside one
//! transaction. Every operation goes through a [`RetryPolicy`] so that a
//! database which is still starting up (connection refused) is waited for.

use super::metric_store::{MetricStore, MetricStoreError};
use crate::models::{Metric, MetricKind, MetricValidationError, MetricValue};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction};
use std::time::Duration;

const CREATE_TABLE: &str = r"
    CREATE TABLE IF NOT EXISTS metrics (
        id VARCHAR PRIMARY KEY,
        mtype VARCHAR NOT NULL,
        value DOUBLE PRECISION,
        delta BIGINT
    )
";

const UPSERT: &str = r"
    INSERT INTO metrics (id, mtype, value, delta)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (id) DO UPDATE SET
        mtype = EXCLUDED.mtype,
        value = EXCLUDED.value,
        delta = CASE
            WHEN EXCLUDED.mtype = 'counter' AND metrics.mtype = 'counter'
                THEN metrics.delta + EXCLUDED.delta
            ELSE EXCLUDED.delta
        END
    RETURNING id, mtype, value, delta
";

const SELECT_ONE: &str = "SELECT id, mtype, value, delta FROM metrics WHERE id = $1";
const SELECT_ALL: &str = "SELECT id, mtype, value, delta FROM metrics ORDER BY id";

/// Metric store persisting records in `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PostgresMetricStore {
    pool: PgPool,
    retry: RetryPolicy,
}

impl PostgresMetricStore {
    /// Creates a store over an existing pool with the default retry policy.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            retry: RetryPolicy::default(),
        }
    }

    /// Creates a store whose pool connects on first use.
    ///
    /// `acquire_timeout` bounds how long a single attempt waits for a
    /// connection before it counts as refused.
    ///
    /// # Errors
    ///
    /// Returns an error if `dsn` is not a valid connection string.
    pub fn connect_lazy(dsn: &str, acquire_timeout: Duration) -> Result<Self, MetricStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(dsn)?;
        Ok(Self::new(pool))
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the `metrics` table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be created after retries.
    pub async fn bootstrap(&self) -> Result<(), MetricStoreError> {
        self.retry
            .run(move || async move {
                sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
                Ok::<_, MetricStoreError>(())
            })
            .await
    }

    /// Merges `metric` inside a caller-owned transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails. The caller decides whether to roll
    /// the transaction back.
    pub async fn record_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        metric: &Metric,
    ) -> Result<Metric, MetricStoreError> {
        Self::upsert(&mut **tx, metric).await
    }

    async fn upsert(conn: &mut PgConnection, metric: &Metric) -> Result<Metric, MetricStoreError> {
        let row = sqlx::query(UPSERT)
            .bind(metric.id.as_str())
            .bind(metric.kind().as_str())
            .bind(metric.value.as_gauge())
            .bind(metric.value.as_counter())
            .fetch_one(conn)
            .await?;
        metric_from_row(&row)
    }

    async fn record_once(&self, metric: &Metric) -> Result<Metric, MetricStoreError> {
        let mut conn = self.pool.acquire().await?;
        Self::upsert(&mut conn, metric).await
    }

    async fn record_batch_once(&self, metrics: &[Metric]) -> Result<Vec<Metric>, MetricStoreError> {
        let mut tx = self.pool.begin().await?;
        let mut stored = Vec::with_capacity(metrics.len());

        for metric in metrics {
            match self.record_in(&mut tx, metric).await {
                Ok(merged) => stored.push(merged),
                Err(err) => {
                    if let Err(rollback_err) = tx.rollback().await {
                        tracing::error!(error = %rollback_err, "Failed to roll back metric batch");
                    }
                    return Err(err);
                }
            }
        }

        tx.commit().await?;
        Ok(stored)
    }
}

fn metric_from_row(row: &PgRow) -> Result<Metric, MetricStoreError> {
    let id: String = row.try_get("id")?;
    let mtype: String = row.try_get("mtype")?;
    let value: Option<f64> = row.try_get("value")?;
    let delta: Option<i64> = row.try_get("delta")?;

    let kind: MetricKind = mtype
        .parse()
        .map_err(|e: MetricValidationError| MetricStoreError::Corrupt {
            id: id.clone(),
            reason: e.to_string(),
        })?;
    let value = match kind {
        MetricKind::Gauge => value.map(MetricValue::Gauge),
        MetricKind::Counter => delta.map(MetricValue::Counter),
    }
    .ok_or_else(|| MetricStoreError::Corrupt {
        id: id.clone(),
        reason: format!("no payload for kind {kind}"),
    })?;

    Ok(Metric::new(id, value))
}

#[async_trait]
impl MetricStore for PostgresMetricStore {
    async fn get(&self, id: &str) -> Result<Option<Metric>, MetricStoreError> {
        self.retry
            .run(move || async move {
                let row = sqlx::query(SELECT_ONE)
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?;
                row.as_ref().map(metric_from_row).transpose()
            })
            .await
    }

    async fn get_all(&self) -> Result<Vec<Metric>, MetricStoreError> {
        self.retry
            .run(move || async move {
                let rows = sqlx::query(SELECT_ALL).fetch_all(&self.pool).await?;
                rows.iter().map(metric_from_row).collect::<Result<Vec<_>, _>>()
            })
            .await
    }

    async fn record(&self, metric: Metric) -> Result<Metric, MetricStoreError> {
        let metric = &metric;
        self.retry.run(move || self.record_once(metric)).await
    }

    async fn record_batch(&self, metrics: Vec<Metric>) -> Result<Vec<Metric>, MetricStoreError> {
        let metrics = metrics.as_slice();
        self.retry.run(move || self.record_batch_once(metrics)).await
    }

    async fn clean(&self) -> Result<(), MetricStoreError> {
        self.retry
            .run(move || async move {
                sqlx::query("TRUNCATE TABLE metrics")
                    .execute(&self.pool)
                    .await?;
                Ok::<_, MetricStoreError>(())
            })
            .await
    }

    async fn ping(&self) -> Result<(), MetricStoreError> {
        self.retry
            .run(move || async move {
                sqlx::query("SELECT 1").execute(&self.pool).await?;
                Ok::<_, MetricStoreError>(())
            })
            .await
    }
}
