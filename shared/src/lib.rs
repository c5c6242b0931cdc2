//! Metricflow Shared Library
//!
//! This crate contains the types and building blocks shared by the metrics
//! agent and the collector.
//!
//! # Modules
//!
//! - [`models`] - The metric record and its JSON wire shape
//! - [`codec`] - HMAC-SHA256 body signing and gzip compression
//! - [`retry`] - Bounded retry for connection-refused failures
//! - [`storage`] - Storage trait with in-memory and `PostgreSQL` backends
//!
//! # Example
//!
//! ```
//! use shared::models::{Metric, MetricPayload};
//!
//! let payload: MetricPayload =
//!     serde_json::from_str(r#"{"id":"PollCount","type":"counter","delta":3}"#).unwrap();
//! let metric = Metric::try_from(payload).unwrap();
//!
//! assert_eq!(metric, Metric::counter("PollCount", 3));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod codec;
pub mod models;
pub mod retry;
pub mod storage;

/// Re-export common dependencies for convenience.
pub use serde;
pub use serde_json;
pub use validator;
