//! Result store errors.

/// Error reading or writing a durable result store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem failure
    #[error("result store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The stored document could not be encoded or decoded
    #[error("result store document is malformed: {0}")]
    Json(#[from] serde_json::Error),
}
