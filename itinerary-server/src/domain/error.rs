//! Domain error types.
//!
//! These errors represent validation failures in the domain layer. They are
//! distinct from terrain and storage errors.

use super::{Cell, RegionId};

/// Domain-level errors for validation and data consistency.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    /// A path needs at least its origin step
    #[error("path must have at least one step")]
    EmptyPath,

    /// The first step of a path carries a cost or mode
    #[error("origin step must have zero cost and no mode (cost {0})")]
    OriginStepCost(f64),

    /// Negative or non-finite cost
    #[error("cost must be finite and non-negative, got {0}")]
    InvalidCost(f64),

    /// A path step left the path's region
    #[error("path in region {expected} contains a step in region {found}")]
    RegionMismatch { expected: RegionId, found: RegionId },

    /// Itinerary has no segments
    #[error("itinerary must have at least one segment")]
    EmptyItinerary,

    /// Segments don't alternate path/tunnel starting and ending with a path
    #[error("segment {0} breaks the path/tunnel alternation")]
    BrokenAlternation(usize),

    /// Consecutive segments don't meet
    #[error("segment ending at {from} does not connect to segment starting at {to}")]
    Disconnected { from: Cell, to: Cell },
}
