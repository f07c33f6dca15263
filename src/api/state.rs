//! Application state for the API server

use crate::db::Database;
use crate::queue::JobBackend;
use crate::storage::ObjectStore;
use std::sync::Arc;

/// Shared state handed to every route handler
///
/// Cloned per request; every field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    /// Catalog and device registry
    pub db: Arc<Database>,

    /// Where `POST /download` submissions go
    pub backend: Arc<dyn JobBackend>,

    /// Object store, for deleting an episode's artifacts
    pub store: Arc<dyn ObjectStore>,

    /// Public URL prefix the stored episode URLs were built from
    pub public_url: String,
}

impl AppState {
    /// Create a new AppState
    pub fn new(
        db: Arc<Database>,
        backend: Arc<dyn JobBackend>,
        store: Arc<dyn ObjectStore>,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            db,
            backend,
            store,
            public_url: public_url.into(),
        }
    }
}
