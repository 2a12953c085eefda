//! Search request errors.

/// Error rejecting a search before it starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    /// Malformed flags or a degenerate request
    #[error("invalid search request: {0}")]
    InvalidRequest(String),

    /// A required collaborator is not available
    #[error("search unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SearchError::InvalidRequest("no movement mode enabled".into());
        assert_eq!(
            err.to_string(),
            "invalid search request: no movement mode enabled"
        );

        let err = SearchError::Unavailable("terrain owner stopped".into());
        assert_eq!(err.to_string(), "search unavailable: terrain owner stopped");
    }
}
