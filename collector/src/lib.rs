//! Metricflow Collector
//!
//! This crate provides the HTTP server that receives metrics pushed by agents,
//! validates and aggregates them, and stores them in memory or in `PostgreSQL`.
//!
//! # Architecture
//!
//! The collector is built on Axum and Tokio. Every request passes through:
//! - a tracing span and gzip response compression
//! - gzip request decoding
//! - signature verification and response signing (when `KEY` is set)
//!
//! before reaching the update, value, index or ping routes. With the in-memory
//! backend a snapshot task persists the store periodically and on shutdown.
//!
//! # Example
//!
//! ```no_run
//! use collector::run_server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_server().await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod config;
pub mod db;
mod error;
pub mod ingest;
pub mod middleware;
mod routes;
pub mod snapshot;
mod state;

pub use config::Config;
pub use error::{ApiError, ErrorBody};
pub use snapshot::{SnapshotError, SnapshotManager};
pub use state::AppState;

use anyhow::{Context, Result};
use axum::Router;
use shared::codec::Signer;
use shared::storage::{InMemoryMetricStore, MetricStore};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::compression::predicate::SizeAbove;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

/// Runs the collector.
///
/// This function initializes the server with configuration from environment variables
/// and starts listening for incoming connections. It handles graceful shutdown on
/// SIGTERM/SIGINT signals.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration cannot be loaded from environment
/// - The server fails to bind to the configured address
/// - The relational backend cannot be reached at startup
pub async fn run_server() -> Result<()> {
    let config = Config::from_env()?;
    run_server_with_config(config).await
}

/// Runs the collector with the provided configuration.
///
/// # Errors
///
/// Returns an error if:
/// - The server fails to bind to the configured address
/// - The relational backend cannot be reached at startup
/// - A fatal error occurs during operation
pub async fn run_server_with_config(config: Config) -> Result<()> {
    let listener = TcpListener::bind(&config.address)
        .await
        .with_context(|| format!("Failed to bind {}", config.address))?;

    serve(listener, config, shutdown_signal()).await
}

/// Serves the collector on an already bound listener until `shutdown`
/// completes.
///
/// The store is set up (and restored from its snapshot) before the first
/// request is accepted. After the server has drained, the snapshot task
/// writes a final snapshot.
///
/// # Errors
///
/// Returns an error if the store or signer cannot be set up, or if serving
/// fails.
pub async fn serve<F>(listener: TcpListener, config: Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    let backend = if config.database_dsn.is_some() {
        "postgres"
    } else {
        "memory"
    };
    tracing::info!(
        %addr,
        backend,
        signed = config.key.is_some(),
        "Metrics collector starting"
    );

    let cancel = CancellationToken::new();
    let (store, snapshot_task) = build_store(&config, &cancel).await?;

    let mut state = AppState::new(store);
    if let Some(key) = &config.key {
        state = state.with_signer(Signer::new(key).context("Invalid KEY")?);
    }
    let app = create_router(state);

    tracing::info!(%addr, "Listening for connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    cancel.cancel();
    if let Some(task) = snapshot_task {
        if let Err(err) = task.await {
            tracing::error!(error = %err, "Snapshot task failed");
        }
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Selects the storage backend. The in-memory backend is restored from its
/// snapshot and gets a snapshot task bound to `cancel`.
async fn build_store(
    config: &Config,
    cancel: &CancellationToken,
) -> Result<(Arc<dyn MetricStore>, Option<JoinHandle<()>>)> {
    if let Some(dsn) = &config.database_dsn {
        let store: Arc<dyn MetricStore> = Arc::new(db::connect_store(dsn).await?);
        return Ok((store, None));
    }

    let memory = InMemoryMetricStore::new_shared();
    let store: Arc<dyn MetricStore> = memory.clone();
    let Some(path) = &config.file_storage_path else {
        tracing::info!("Snapshots disabled, metrics are kept in memory only");
        return Ok((store, None));
    };

    let snapshots = SnapshotManager::new(Arc::clone(&memory), path, config.store_interval);
    if config.restore {
        snapshots.restore_logged().await;
    }
    let task = tokio::spawn(snapshots.run(cancel.clone()));

    Ok((store, Some(task)))
}

/// Creates the main application router with all routes and middleware.
///
/// This function is public to allow testing the router without starting a full server.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::index_routes(state.clone()))
        .merge(routes::ping_routes(state.clone()))
        .merge(routes::update_routes(state.clone()))
        .merge(routes::value_routes(state.clone()))
        .layer(axum::middleware::from_fn_with_state(
            state,
            middleware::verify_signature,
        ))
        .layer(axum::middleware::from_fn(middleware::decompress_request))
        .layer(CompressionLayer::new().compress_when(SizeAbove::new(0)))
        .layer(TraceLayer::new_for_http())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
