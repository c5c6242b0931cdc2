//! Data models for metric telemetry.
//!
//! This module contains the metric record and its JSON wire shape.

pub mod metric;

pub use metric::{Metric, MetricKind, MetricPayload, MetricValidationError, MetricValue};
