//! Shared sample accumulator.
//!
//! The sampling task writes into the accumulator and the reporting task drains
//! it. Both go through the same lock, so a report never observes a half-written
//! sample and no sample is lost while a report is being composed.

use shared::models::Metric;
use std::collections::BTreeMap;
use std::sync::Mutex;
use thiserror::Error;

/// Group carrying agent-process statistics, `PollCount` and `RandomValue`.
pub const RUNTIME_GROUP: &str = "runtime";

/// Group carrying host statistics.
pub const SYSTEM_GROUP: &str = "system";

/// Counter of samples taken since the previous report.
pub const POLL_COUNT: &str = "PollCount";

/// Random gauge attached to every report.
pub const RANDOM_VALUE: &str = "RandomValue";

/// A raw numeric sample as produced by a sample source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawSample {
    /// Floating point reading.
    Float(f64),
    /// Unsigned reading such as a byte count.
    Unsigned(u64),
    /// Signed reading.
    Signed(i64),
}

impl RawSample {
    /// Converts the sample to a gauge value. Non-finite readings have no gauge
    /// representation.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn to_gauge(self) -> Option<f64> {
        let value = match self {
            Self::Float(v) => v,
            Self::Unsigned(v) => v as f64,
            Self::Signed(v) => v as f64,
        };
        value.is_finite().then_some(value)
    }
}

/// Samples read from one source during a poll.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupReading {
    /// Source group name.
    pub group: String,
    /// Sample name and value pairs.
    pub samples: Vec<(String, RawSample)>,
}

impl GroupReading {
    /// Creates a reading for `group`.
    #[must_use]
    pub fn new(group: impl Into<String>, samples: Vec<(String, RawSample)>) -> Self {
        Self {
            group: group.into(),
            samples,
        }
    }
}

/// One group of metrics ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricBatch {
    /// Source group name.
    pub group: String,
    /// Metrics of the group.
    pub metrics: Vec<Metric>,
}

/// Errors raised by the accumulator.
#[derive(Debug, Error)]
pub enum AccumulatorError {
    /// The lock was poisoned by a panicking task.
    #[error("Failed to acquire accumulator lock")]
    LockError,
}

#[derive(Debug, Default)]
struct State {
    groups: BTreeMap<String, BTreeMap<String, RawSample>>,
    poll_count: u64,
}

/// Latest sample per group and name, plus the number of samples taken since
/// the last report.
#[derive(Debug, Default)]
pub struct Accumulator {
    state: Mutex<State>,
}

impl Accumulator {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges the readings of one poll and counts it.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn record_poll(&self, readings: Vec<GroupReading>) -> Result<(), AccumulatorError> {
        let mut state = self.state.lock().map_err(|_| AccumulatorError::LockError)?;
        for reading in readings {
            state
                .groups
                .entry(reading.group)
                .or_default()
                .extend(reading.samples);
        }
        state.poll_count += 1;
        Ok(())
    }

    /// Number of polls since the last report.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn poll_count(&self) -> Result<u64, AccumulatorError> {
        let state = self.state.lock().map_err(|_| AccumulatorError::LockError)?;
        Ok(state.poll_count)
    }

    /// Copies out every tracked gauge per group, adds `PollCount` and
    /// `RandomValue` to the runtime group and resets the poll counter.
    ///
    /// Samples without a gauge representation are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn drain_report(&self, random_value: f64) -> Result<Vec<MetricBatch>, AccumulatorError> {
        let mut state = self.state.lock().map_err(|_| AccumulatorError::LockError)?;

        let mut batches: Vec<MetricBatch> = state
            .groups
            .iter()
            .map(|(group, samples)| MetricBatch {
                group: group.clone(),
                metrics: samples
                    .iter()
                    .filter_map(|(name, sample)| gauge(group, name, *sample))
                    .collect(),
            })
            .collect();

        let poll_count = std::mem::take(&mut state.poll_count);
        drop(state);

        let runtime = match batches.iter().position(|b| b.group == RUNTIME_GROUP) {
            Some(index) => &mut batches[index],
            None => {
                batches.push(MetricBatch {
                    group: RUNTIME_GROUP.to_string(),
                    metrics: Vec::new(),
                });
                let last = batches.len() - 1;
                &mut batches[last]
            }
        };
        match i64::try_from(poll_count) {
            Ok(delta) => runtime.metrics.push(Metric::counter(POLL_COUNT, delta)),
            Err(_) => tracing::warn!(poll_count, "Skipping PollCount that does not fit a counter"),
        }
        if random_value.is_finite() {
            runtime.metrics.push(Metric::gauge(RANDOM_VALUE, random_value));
        }

        batches.retain(|batch| !batch.metrics.is_empty());
        Ok(batches)
    }
}

fn gauge(group: &str, name: &str, sample: RawSample) -> Option<Metric> {
    match sample.to_gauge() {
        Some(value) => Some(Metric::gauge(name, value)),
        None => {
            tracing::warn!(group, name, ?sample, "Skipping sample without a numeric value");
            None
        }
    }
}
