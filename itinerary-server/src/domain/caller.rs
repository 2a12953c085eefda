//! Caller identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies whoever asked for a search.
///
/// At most one search runs per caller; identity and permissions themselves
/// belong to the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerId(String);

impl CallerId {
    /// Creates a caller id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
