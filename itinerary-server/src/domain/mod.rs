//! Domain types for the itinerary search engine.
//!
//! This module contains the value types searches produce and consume. All
//! types enforce their invariants at construction time, so code that
//! receives these types can trust their validity.

mod caller;
mod cell;
mod destination;
mod error;
mod itinerary;
mod path;
mod tunnel;

pub use caller::CallerId;
pub use cell::{Cell, RegionId};
pub use destination::Destination;
pub use error::DomainError;
pub use itinerary::{Itinerary, Segment};
pub use path::{Path, Step};
pub use tunnel::{CompletionPredicate, StaticTunnels, Tunnel, TunnelRegistry};
