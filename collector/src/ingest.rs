//! Ingestion of validated metric records.
//!
//! Every record of a batch is validated before anything is written. Records are
//! then pre-aggregated by id so that each id reaches the store exactly once per
//! batch, and the batch is handed to the store as one atomic write.

use shared::models::{Metric, MetricKind, MetricPayload, MetricValidationError, MetricValue};
use shared::storage::{MetricStore, MetricStoreError};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur while ingesting metrics.
#[derive(Debug, Error)]
pub enum IngestError {
    /// A record failed validation; nothing from the request was stored.
    #[error(transparent)]
    Invalid(#[from] MetricValidationError),

    /// The batch holds no record.
    #[error("At least one metric is required")]
    EmptyBatch,

    /// The store rejected the write.
    #[error(transparent)]
    Storage(#[from] MetricStoreError),
}

/// Builds a metric from the segments of a path-form update.
///
/// # Errors
///
/// Returns an error if the kind is unknown, the id is empty or the value does
/// not parse as the kind's numeric type.
pub fn parse_path_metric(kind: &str, id: &str, raw: &str) -> Result<Metric, MetricValidationError> {
    let kind: MetricKind = kind.parse()?;
    if id.is_empty() {
        return Err(MetricValidationError::EmptyId);
    }
    Ok(Metric::new(id, MetricValue::parse(kind, raw)?))
}

/// Folds records sharing an id into one, keeping first-seen order.
///
/// Counter deltas are summed and gauges keep the last value, following
/// [`Metric::merge`] in submission order.
///
/// # Errors
///
/// Returns [`MetricValidationError::CounterOverflow`] if the summed deltas of
/// one id do not fit in an `i64`.
pub fn aggregate_batch(metrics: Vec<Metric>) -> Result<Vec<Metric>, MetricValidationError> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(metrics.len());
    let mut aggregated: Vec<Metric> = Vec::with_capacity(metrics.len());

    for metric in metrics {
        if let Some(&pos) = index.get(&metric.id) {
            aggregated[pos].merge(metric.value)?;
        } else {
            index.insert(metric.id.clone(), aggregated.len());
            aggregated.push(metric);
        }
    }

    Ok(aggregated)
}

/// Stores a single record and returns the merged result.
///
/// # Errors
///
/// Returns [`IngestError::Storage`] if the store rejects the write.
pub async fn ingest_one(store: &dyn MetricStore, metric: Metric) -> Result<Metric, IngestError> {
    let stored = store.record(metric).await?;
    tracing::debug!(id = %stored.id, kind = %stored.kind(), "Metric recorded");
    Ok(stored)
}

/// Validates, pre-aggregates and stores a batch of wire records.
///
/// Returns the merged record of every unique id, in first-seen order.
///
/// # Errors
///
/// Returns [`IngestError::Invalid`] for the first invalid record or a batch
/// whose own deltas overflow,
/// [`IngestError::EmptyBatch`] for an empty batch, or [`IngestError::Storage`]
/// if the store rejects the batch. Nothing is stored on error.
pub async fn ingest_batch(
    store: &dyn MetricStore,
    payloads: Vec<MetricPayload>,
) -> Result<Vec<Metric>, IngestError> {
    let metrics = payloads
        .into_iter()
        .map(Metric::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    if metrics.is_empty() {
        return Err(IngestError::EmptyBatch);
    }

    let received = metrics.len();
    let aggregated = aggregate_batch(metrics)?;
    let unique = aggregated.len();
    let stored = store.record_batch(aggregated).await?;

    tracing::debug!(received, unique, "Metric batch recorded");
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::storage::InMemoryMetricStore;

    fn payload(id: &str, kind: &str, value: Option<f64>, delta: Option<i64>) -> MetricPayload {
        MetricPayload {
            id: id.to_string(),
            kind: kind.to_string(),
            value,
            delta,
        }
    }

    #[test]
    fn test_parse_path_metric() {
        assert_eq!(
            parse_path_metric("counter", "A", "10").unwrap(),
            Metric::counter("A", 10)
        );
        assert_eq!(
            parse_path_metric("gauge", "B", "-0.5").unwrap(),
            Metric::gauge("B", -0.5)
        );
    }

    #[test]
    fn test_parse_path_metric_errors() {
        assert!(matches!(
            parse_path_metric("histogram", "A", "1"),
            Err(MetricValidationError::UnknownKind(_))
        ));
        assert!(matches!(
            parse_path_metric("counter", "", "1"),
            Err(MetricValidationError::EmptyId)
        ));
        assert!(matches!(
            parse_path_metric("counter", "A", "1.5"),
            Err(MetricValidationError::InvalidValue { .. })
        ));
        assert!(matches!(
            parse_path_metric("gauge", "A", "none"),
            Err(MetricValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_aggregate_sums_counters_and_keeps_last_gauge() {
        let aggregated = aggregate_batch(vec![
            Metric::counter("hits", 2),
            Metric::gauge("load", 1.5),
            Metric::counter("hits", 3),
            Metric::gauge("load", 2.5),
        ])
        .unwrap();

        assert_eq!(
            aggregated,
            vec![Metric::counter("hits", 5), Metric::gauge("load", 2.5)]
        );
    }

    #[test]
    fn test_aggregate_is_order_independent_for_counters() {
        let forward = aggregate_batch(vec![
            Metric::counter("c", 1),
            Metric::counter("c", 20),
            Metric::counter("c", 300),
        ])
        .unwrap();
        let backward = aggregate_batch(vec![
            Metric::counter("c", 300),
            Metric::counter("c", 20),
            Metric::counter("c", 1),
        ])
        .unwrap();

        assert_eq!(forward, backward);
        assert_eq!(forward[0].value, MetricValue::Counter(321));
    }

    #[test]
    fn test_aggregate_kind_flip_follows_submission_order() {
        let aggregated = aggregate_batch(vec![
            Metric::counter("x", 4),
            Metric::gauge("x", 0.5),
            Metric::counter("x", 1),
        ])
        .unwrap();

        assert_eq!(aggregated, vec![Metric::counter("x", 1)]);
    }

    #[tokio::test]
    async fn test_ingest_batch_stores_aggregated_records() {
        let store = InMemoryMetricStore::new();
        store.record(Metric::counter("hits", 10)).await.unwrap();

        let stored = ingest_batch(
            &store,
            vec![
                payload("hits", "counter", None, Some(1)),
                payload("hits", "counter", None, Some(2)),
                payload("load", "gauge", Some(0.75), None),
            ],
        )
        .await
        .unwrap();

        assert_eq!(
            stored,
            vec![Metric::counter("hits", 13), Metric::gauge("load", 0.75)]
        );
    }

    #[tokio::test]
    async fn test_invalid_record_aborts_whole_batch() {
        let store = InMemoryMetricStore::new();

        let result = ingest_batch(
            &store,
            vec![
                payload("ok", "gauge", Some(1.0), None),
                payload("bad", "counter", None, None),
            ],
        )
        .await;

        assert!(matches!(result, Err(IngestError::Invalid(_))));
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_overflowing_batch_is_invalid() {
        let store = InMemoryMetricStore::new();

        let result = ingest_batch(
            &store,
            vec![
                payload("fresh", "gauge", Some(1.0), None),
                payload("big", "counter", None, Some(i64::MAX)),
                payload("big", "counter", None, Some(1)),
            ],
        )
        .await;

        assert!(matches!(
            result,
            Err(IngestError::Invalid(MetricValidationError::CounterOverflow { .. }))
        ));
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_stored_counter_overflow_is_a_storage_error() {
        let store = InMemoryMetricStore::new();
        store.record(Metric::counter("big", i64::MAX)).await.unwrap();

        let result = ingest_batch(&store, vec![payload("big", "counter", None, Some(1))]).await;

        assert!(matches!(
            result,
            Err(IngestError::Storage(MetricStoreError::CounterOverflow { .. }))
        ));
        assert_eq!(
            store.get("big").await.unwrap(),
            Some(Metric::counter("big", i64::MAX))
        );
    }

    #[tokio::test]
    async fn test_empty_batch_is_rejected() {
        let store = InMemoryMetricStore::new();
        let result = ingest_batch(&store, Vec::new()).await;

        assert!(matches!(result, Err(IngestError::EmptyBatch)));
    }
}
