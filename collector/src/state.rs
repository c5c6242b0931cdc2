//! Application state module.
//!
//! Defines the shared application state that is passed to route handlers.

use shared::codec::Signer;
use shared::storage::{InMemoryMetricStore, MetricStore};
use std::sync::Arc;

/// Application state shared across all request handlers.
///
/// The metric store is the only mutable state shared between requests.
#[derive(Clone)]
pub struct AppState {
    /// The metric storage backend.
    store: Arc<dyn MetricStore>,
    /// Signs responses and verifies requests when a key is configured.
    signer: Option<Signer>,
}

impl AppState {
    /// Creates a new application state over the given store, without signing.
    pub fn new(store: Arc<dyn MetricStore>) -> Self {
        Self {
            store,
            signer: None,
        }
    }

    /// Creates a new application state with an in-memory store.
    ///
    /// This is useful for development and testing.
    #[must_use]
    pub fn with_in_memory_store() -> Self {
        Self::new(Arc::new(InMemoryMetricStore::new()))
    }

    /// Enables request verification and response signing.
    #[must_use]
    pub fn with_signer(mut self, signer: Signer) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Returns a reference to the metric store.
    #[must_use]
    pub fn store(&self) -> &dyn MetricStore {
        self.store.as_ref()
    }

    /// Returns the signer, if a key is configured.
    #[must_use]
    pub fn signer(&self) -> Option<&Signer> {
        self.signer.as_ref()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::with_in_memory_store()
    }
}
