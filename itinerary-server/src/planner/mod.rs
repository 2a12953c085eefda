//! Itinerary planning.
//!
//! Two layers of search. A [`PathTrial`] runs A* inside one region over the
//! moves the enabled modes generate. An [`ItineraryTrial`] composes path
//! trials with tunnels to reach other regions, or to get around obstacles
//! within the same one.

mod cancel;
mod config;
mod error;
mod itinerary_trial;
mod path_trial;

pub use cancel::CancelFlag;
pub use config::{SearchFlags, TrialBudget};
pub use error::SearchError;
pub use itinerary_trial::{ItineraryOutcome, ItineraryReport, ItineraryTrial};
pub use path_trial::{PathOutcome, PathTrial, TrialReport, TrialStats};
