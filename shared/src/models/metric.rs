//! Metric data model.
//!
//! Defines the `Metric` record stored by the collector and shipped by the agent,
//! together with its JSON wire shape (`MetricPayload`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use validator::Validate;

/// Kind of metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// A point-in-time value; a new value replaces the stored one.
    Gauge,
    /// An accumulating integer; a new delta is added to the stored one.
    Counter,
}

impl MetricKind {
    /// Returns the wire name of the kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gauge => "gauge",
            Self::Counter => "counter",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = MetricValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gauge" => Ok(Self::Gauge),
            "counter" => Ok(Self::Counter),
            other => Err(MetricValidationError::UnknownKind(other.to_string())),
        }
    }
}

/// The value of a metric, tagged by kind.
///
/// Exactly one payload exists per record and it always matches the kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    /// Gauge value.
    Gauge(f64),
    /// Counter running delta.
    Counter(i64),
}

impl MetricValue {
    /// Returns the kind of this value.
    #[must_use]
    pub fn kind(&self) -> MetricKind {
        match self {
            Self::Gauge(_) => MetricKind::Gauge,
            Self::Counter(_) => MetricKind::Counter,
        }
    }

    /// Returns the gauge value if this is a gauge.
    #[must_use]
    pub fn as_gauge(&self) -> Option<f64> {
        match self {
            Self::Gauge(v) => Some(*v),
            Self::Counter(_) => None,
        }
    }

    /// Returns the counter delta if this is a counter.
    #[must_use]
    pub fn as_counter(&self) -> Option<i64> {
        match self {
            Self::Gauge(_) => None,
            Self::Counter(d) => Some(*d),
        }
    }

    /// Parses a textual value for the given kind.
    ///
    /// Gauges accept any finite `f64` literal, counters any `i64` literal.
    ///
    /// # Errors
    ///
    /// Returns [`MetricValidationError::InvalidValue`] if the text does not
    /// convert to the kind's numeric type.
    pub fn parse(kind: MetricKind, raw: &str) -> Result<Self, MetricValidationError> {
        let invalid = || MetricValidationError::InvalidValue {
            kind,
            raw: raw.to_string(),
        };
        match kind {
            MetricKind::Gauge => raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Self::Gauge)
                .ok_or_else(invalid),
            MetricKind::Counter => raw.parse::<i64>().map(Self::Counter).map_err(|_| invalid()),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gauge(v) => write!(f, "{v}"),
            Self::Counter(d) => write!(f, "{d}"),
        }
    }
}

/// A metric record identified by `id`.
///
/// # Example
///
/// ```
/// use shared::models::{Metric, MetricValue};
///
/// let mut requests = Metric::counter("requests", 10);
/// requests.merge(MetricValue::Counter(5)).unwrap();
/// assert_eq!(requests.value, MetricValue::Counter(15));
///
/// let mut load = Metric::gauge("load", 0.5);
/// load.merge(MetricValue::Gauge(0.75)).unwrap();
/// assert_eq!(load.value, MetricValue::Gauge(0.75));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MetricPayload", into = "MetricPayload")]
pub struct Metric {
    /// Unique id of the metric within a store.
    pub id: String,
    /// Tagged value.
    pub value: MetricValue,
}

impl Metric {
    /// Creates a new metric.
    #[must_use]
    pub fn new(id: impl Into<String>, value: MetricValue) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }

    /// Creates a new gauge metric.
    #[must_use]
    pub fn gauge(id: impl Into<String>, value: f64) -> Self {
        Self::new(id, MetricValue::Gauge(value))
    }

    /// Creates a new counter metric.
    #[must_use]
    pub fn counter(id: impl Into<String>, delta: i64) -> Self {
        Self::new(id, MetricValue::Counter(delta))
    }

    /// Returns the kind of the metric.
    #[must_use]
    pub fn kind(&self) -> MetricKind {
        self.value.kind()
    }

    /// Merges an incoming value into this record.
    ///
    /// A counter delta is added to a stored counter. Anything else replaces the
    /// stored value, which is how a record changes kind.
    ///
    /// # Errors
    ///
    /// Returns [`MetricValidationError::CounterOverflow`] if the counter sum
    /// does not fit in an `i64`; the record is left unchanged.
    pub fn merge(&mut self, incoming: MetricValue) -> Result<(), MetricValidationError> {
        self.value = match (self.value, incoming) {
            (MetricValue::Counter(stored), MetricValue::Counter(delta)) => {
                let sum = stored.checked_add(delta).ok_or_else(|| {
                    MetricValidationError::CounterOverflow {
                        id: self.id.clone(),
                    }
                })?;
                MetricValue::Counter(sum)
            }
            (_, incoming) => incoming,
        };
        Ok(())
    }
}

/// Errors that can occur while validating a metric.
#[derive(Debug, Error)]
pub enum MetricValidationError {
    /// The metric id is empty.
    #[error("Metric id cannot be empty")]
    EmptyId,

    /// The metric type is neither `gauge` nor `counter`.
    #[error("Wrong type of metric: '{0}'")]
    UnknownKind(String),

    /// The payload field matching the kind is absent.
    #[error("Metric of type {kind} is missing its value")]
    MissingValue {
        /// The declared kind.
        kind: MetricKind,
    },

    /// The value does not convert to the kind's numeric type.
    #[error("Bad value for metric of type {kind}: '{raw}'")]
    InvalidValue {
        /// The declared kind.
        kind: MetricKind,
        /// The rejected value as received.
        raw: String,
    },

    /// Accumulated counter deltas exceed the `i64` range.
    #[error("Counter '{id}' overflows")]
    CounterOverflow {
        /// Id of the counter.
        id: String,
    },

    /// Validation failed with details.
    #[error("Validation failed: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

impl MetricValidationError {
    /// Returns true when the error names something that does not exist
    /// (an unknown kind or an empty id) rather than a malformed value.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::EmptyId | Self::UnknownKind(_))
    }
}

/// JSON wire shape of a metric: `{"id", "type", "value"?, "delta"?}`.
///
/// Fields are unchecked; convert into a [`Metric`] with `TryFrom` to validate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct MetricPayload {
    /// Metric id.
    #[validate(length(min = 1, message = "Metric id cannot be empty"))]
    pub id: String,

    /// Metric type, `gauge` or `counter`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Gauge value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,

    /// Counter delta.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
}

impl TryFrom<MetricPayload> for Metric {
    type Error = MetricValidationError;

    fn try_from(payload: MetricPayload) -> Result<Self, Self::Error> {
        if let Err(errors) = payload.validate() {
            return Err(if errors.field_errors().contains_key("id") {
                MetricValidationError::EmptyId
            } else {
                errors.into()
            });
        }

        let kind: MetricKind = payload.kind.parse()?;
        let value = match kind {
            MetricKind::Gauge => {
                let v = payload
                    .value
                    .ok_or(MetricValidationError::MissingValue { kind })?;
                if !v.is_finite() {
                    return Err(MetricValidationError::InvalidValue {
                        kind,
                        raw: v.to_string(),
                    });
                }
                MetricValue::Gauge(v)
            }
            MetricKind::Counter => MetricValue::Counter(
                payload
                    .delta
                    .ok_or(MetricValidationError::MissingValue { kind })?,
            ),
        };

        Ok(Metric::new(payload.id, value))
    }
}

impl From<Metric> for MetricPayload {
    fn from(metric: Metric) -> Self {
        Self {
            kind: metric.kind().to_string(),
            value: metric.value.as_gauge(),
            delta: metric.value.as_counter(),
            id: metric.id,
        }
    }
}
