//! Collaborators every search needs.

use std::sync::Arc;

use crate::domain::TunnelRegistry;
use crate::results::ResultCache;
use crate::terrain::TerrainCache;

/// Shared services handed to each session.
#[derive(Clone)]
pub struct SearchContext {
    pub terrain: Arc<TerrainCache>,
    pub results: Option<Arc<ResultCache>>,
    pub tunnels: Arc<dyn TunnelRegistry>,
}

impl SearchContext {
    /// A context without a result cache.
    pub fn new(terrain: Arc<TerrainCache>, tunnels: Arc<dyn TunnelRegistry>) -> Self {
        Self {
            terrain,
            results: None,
            tunnels,
        }
    }

    pub fn with_results(mut self, results: Arc<ResultCache>) -> Self {
        self.results = Some(results);
        self
    }
}
