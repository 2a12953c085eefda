//! Terrain access errors.

/// Errors from reading terrain through the cache.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TerrainError {
    /// The owner thread is gone or the cache was closed
    #[error("terrain unavailable: owner thread is not serving requests")]
    Unavailable,
}
