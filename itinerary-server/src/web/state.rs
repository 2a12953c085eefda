//! Application state for the web layer.

use std::sync::Arc;

use crate::session::SearchCoordinator;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Admits and runs searches
    pub coordinator: Arc<SearchCoordinator>,
}

impl AppState {
    /// Create a new app state.
    pub fn new(coordinator: Arc<SearchCoordinator>) -> Self {
        Self { coordinator }
    }
}
