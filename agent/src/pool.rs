//! Rate-limited delivery pool.
//!
//! A fixed set of `limit` workers drains a bounded queue of `limit` batches,
//! so at most `limit` deliveries are in flight and a full queue blocks the
//! producer.

use crate::accumulator::MetricBatch;
use crate::delivery::BatchSink;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Returned when a batch is submitted to a pool that no longer accepts work.
#[derive(Debug, Error)]
#[error("Delivery pool is shut down")]
pub struct PoolClosed;

/// Cloneable handle queueing batches into a [`WorkerPool`].
#[derive(Debug, Clone)]
pub struct PoolHandle {
    sender: mpsc::Sender<MetricBatch>,
}

impl PoolHandle {
    /// Queues a batch, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`PoolClosed`] if every worker has stopped.
    pub async fn submit(&self, batch: MetricBatch) -> Result<(), PoolClosed> {
        self.sender.send(batch).await.map_err(|_| PoolClosed)
    }
}

/// Fixed-size set of delivery workers.
pub struct WorkerPool {
    sender: mpsc::Sender<MetricBatch>,
    workers: JoinSet<()>,
}

impl WorkerPool {
    /// Spawns `limit` workers delivering through `sink` until `cancel` fires
    /// or the pool is shut down.
    #[must_use]
    pub fn spawn(limit: usize, sink: Arc<dyn BatchSink>, cancel: CancellationToken) -> Self {
        let limit = limit.max(1);
        let (sender, receiver) = mpsc::channel(limit);
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = JoinSet::new();
        for worker in 0..limit {
            workers.spawn(run_worker(
                worker,
                Arc::clone(&receiver),
                Arc::clone(&sink),
                cancel.clone(),
            ));
        }

        Self { sender, workers }
    }

    /// Returns a handle for queueing batches from other tasks.
    #[must_use]
    pub fn handle(&self) -> PoolHandle {
        PoolHandle {
            sender: self.sender.clone(),
        }
    }

    /// Queues a batch, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`PoolClosed`] if every worker has stopped.
    pub async fn submit(&self, batch: MetricBatch) -> Result<(), PoolClosed> {
        self.sender.send(batch).await.map_err(|_| PoolClosed)
    }

    /// Stops accepting batches, lets the workers finish the queue and waits
    /// for them. Outstanding [`PoolHandle`]s must be dropped first.
    pub async fn shutdown(self) {
        let Self {
            sender,
            mut workers,
        } = self;
        drop(sender);

        while let Some(result) = workers.join_next().await {
            if let Err(err) = result {
                tracing::error!(error = %err, "Delivery worker panicked");
            }
        }
    }
}

async fn run_worker(
    worker: usize,
    receiver: Arc<Mutex<mpsc::Receiver<MetricBatch>>>,
    sink: Arc<dyn BatchSink>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => None,
            batch = async { receiver.lock().await.recv().await } => batch,
        };
        let Some(batch) = next else {
            break;
        };

        tokio::select! {
            () = cancel.cancelled() => {
                tracing::warn!(worker, group = %batch.group, "Delivery aborted by shutdown");
                break;
            }
            result = sink.deliver(&batch.metrics) => match result {
                Ok(()) => tracing::debug!(
                    worker,
                    group = %batch.group,
                    count = batch.metrics.len(),
                    "Batch delivered"
                ),
                Err(err) => tracing::error!(
                    worker,
                    group = %batch.group,
                    error = %err,
                    "Dropping batch after failed delivery"
                ),
            },
        }
    }

    tracing::debug!(worker, "Delivery worker stopped");
}
