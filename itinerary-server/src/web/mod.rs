//! Web layer for the itinerary server.
//!
//! JSON endpoints for submitting, polling and canceling searches.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::AppState;
