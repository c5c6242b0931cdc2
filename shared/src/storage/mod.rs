//! Storage traits and implementations.
//!
//! The `MetricStore` trait is the single interface the collector ingests into.
//! Two backends implement it: a lock-protected in-memory map and a
//! `PostgreSQL` table. The backend is chosen once at startup.

pub mod metric_store;
pub mod postgres_store;

pub use metric_store::{InMemoryMetricStore, MetricStore, MetricStoreError};
pub use postgres_store::PostgresMetricStore;
