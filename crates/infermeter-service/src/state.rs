//! Application state.

use std::sync::Arc;

use infermeter_store::Store;

use crate::config::ServiceConfig;
use crate::dispatch::Dispatcher;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Job dispatcher (message broker).
    pub dispatcher: Arc<dyn Dispatcher>,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        dispatcher: Arc<dyn Dispatcher>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            config,
        }
    }
}
