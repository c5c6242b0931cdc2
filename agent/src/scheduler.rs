//! Sample and report loops.
//!
//! The sampler polls every source on each poll tick and records the readings
//! as one poll. The reporter drains the accumulator on each report tick and
//! hands one batch per group to the worker pool, outside the accumulator lock.

use crate::accumulator::Accumulator;
use crate::pool::{PoolHandle, WorkerPool};
use crate::sampler::SampleSource;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Drives sampling and reporting until cancelled.
pub struct Scheduler {
    poll_interval: Duration,
    report_interval: Duration,
    accumulator: Arc<Accumulator>,
    sources: Vec<Box<dyn SampleSource>>,
}

impl Scheduler {
    /// Creates a scheduler polling `sources` every `poll_interval` and
    /// reporting every `report_interval`.
    #[must_use]
    pub fn new(
        poll_interval: Duration,
        report_interval: Duration,
        sources: Vec<Box<dyn SampleSource>>,
    ) -> Self {
        Self {
            poll_interval,
            report_interval,
            accumulator: Arc::new(Accumulator::new()),
            sources,
        }
    }

    /// Shared accumulator.
    #[must_use]
    pub fn accumulator(&self) -> Arc<Accumulator> {
        Arc::clone(&self.accumulator)
    }

    /// Runs both loops until `cancel` fires, then waits for the pool to
    /// finish.
    pub async fn run(self, pool: WorkerPool, cancel: CancellationToken) {
        let mut tasks = JoinSet::new();

        tasks.spawn(sample_loop(
            self.poll_interval,
            self.sources,
            Arc::clone(&self.accumulator),
            cancel.clone(),
        ));
        tasks.spawn(report_loop(
            self.report_interval,
            Arc::clone(&self.accumulator),
            pool.handle(),
            cancel.clone(),
        ));

        while let Some(result) = tasks.join_next().await {
            if let Err(err) = result {
                tracing::error!(error = %err, "Scheduler task panicked");
            }
        }

        pool.shutdown().await;
        tracing::info!("Scheduler stopped");
    }
}

async fn sample_loop(
    period: Duration,
    mut sources: Vec<Box<dyn SampleSource>>,
    accumulator: Arc<Accumulator>,
    cancel: CancellationToken,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let readings = sources.iter_mut().map(|source| source.read()).collect();
                if let Err(err) = accumulator.record_poll(readings) {
                    tracing::error!(error = %err, "Failed to record samples");
                }
            }
        }
    }

    tracing::debug!("Sampler stopped");
}

async fn report_loop(
    period: Duration,
    accumulator: Arc<Accumulator>,
    pool: PoolHandle,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let random_value = rand::thread_rng().gen::<f64>();
                let batches = match accumulator.drain_report(random_value) {
                    Ok(batches) => batches,
                    Err(err) => {
                        tracing::error!(error = %err, "Failed to compose report");
                        continue;
                    }
                };

                for batch in batches {
                    tracing::debug!(group = %batch.group, count = batch.metrics.len(), "Queueing report");
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        result = pool.submit(batch) => {
                            if let Err(err) = result {
                                tracing::error!(error = %err, "Report dropped");
                            }
                        }
                    }
                }
            }
        }
    }

    tracing::debug!("Reporter stopped");
}
