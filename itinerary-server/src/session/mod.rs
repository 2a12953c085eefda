//! Search sessions and their coordination.
//!
//! A [`SearchCoordinator`] admits requests, runs each as a
//! [`SearchSession`] on the tokio runtime, and bounds how many run at once.

mod context;
mod coordinator;
mod session;
mod state;

pub use context::SearchContext;
pub use coordinator::{CoordinatorConfig, SearchCoordinator};
pub use session::{CancelReason, SearchSession, SessionHandle, SessionId, SessionOutcome};
pub use state::SessionState;
