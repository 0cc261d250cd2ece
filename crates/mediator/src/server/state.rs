//! Shared application state injected into every Axum handler.

use crate::config::ConfigStore;

/// Application state shared across the admission gate and request handlers.
///
/// Cheaply cloneable: [`ConfigStore`] is `Arc`-backed, so Axum can clone the
/// state per request without copying the configuration tree.
#[derive(Clone)]
pub struct AppState {
    /// Current runtime configuration; read-only from the request path.
    pub config: ConfigStore,
}

impl AppState {
    /// Create a new [`AppState`] over `config`.
    pub fn new(config: ConfigStore) -> Self {
        Self { config }
    }
}

impl Default for AppState {
    /// Creates an [`AppState`] with an empty configuration, suitable for tests.
    fn default() -> Self {
        Self::new(ConfigStore::new(Default::default()))
    }
}
