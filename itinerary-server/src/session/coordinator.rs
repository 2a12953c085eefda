//! Admission control for concurrent searches.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use super::{
    CancelReason, SearchContext, SearchSession, SessionHandle, SessionOutcome, SessionState,
};
use crate::domain::{CallerId, Cell, Destination};
use crate::planner::{SearchError, SearchFlags};

/// Configuration for the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Searches allowed to run at once; the rest queue in submission order.
    pub max_concurrent_searches: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_searches: 4,
        }
    }
}

/// Runs sessions on the tokio runtime, at most a fixed number at a time and
/// at most one per caller.
///
/// Keeps each caller's most recent session, finished or not, so its status
/// and outcome stay queryable until the caller submits again.
pub struct SearchCoordinator {
    context: SearchContext,
    permits: Arc<Semaphore>,
    sessions: Mutex<HashMap<CallerId, Arc<SearchSession>>>,
    closed: AtomicBool,
}

impl SearchCoordinator {
    pub fn new(context: SearchContext, config: &CoordinatorConfig) -> Self {
        Self {
            context,
            permits: Arc::new(Semaphore::new(config.max_concurrent_searches.max(1))),
            sessions: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CallerId, Arc<SearchSession>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn context(&self) -> &SearchContext {
        &self.context
    }

    /// Start a search for `caller`, canceling any search it still has live.
    ///
    /// Must be called within a tokio runtime. Malformed requests are
    /// rejected here, before a session exists.
    pub fn submit(
        &self,
        caller: CallerId,
        origin: Cell,
        destination: Destination,
        flags: SearchFlags,
    ) -> Result<SessionHandle, SearchError> {
        flags.validate()?;
        if !destination.is_well_formed() {
            return Err(SearchError::InvalidRequest(
                "destination area has min above max".to_string(),
            ));
        }
        if destination.contains(&origin) {
            return Err(SearchError::InvalidRequest(
                "origin is already inside the destination".to_string(),
            ));
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(SearchError::Unavailable(
                "coordinator is shut down".to_string(),
            ));
        }
        if self.context.terrain.is_closed() {
            return Err(SearchError::Unavailable(
                "terrain owner is not running".to_string(),
            ));
        }

        let session = Arc::new(SearchSession::new(caller.clone(), origin, destination, flags));
        let previous = self.lock().insert(caller.clone(), session.clone());
        if let Some(previous) = previous
            && previous.cancel(CancelReason::Requested)
        {
            debug!(session = %previous.id(), %caller, "superseded by a new submission");
        }
        info!(
            session = %session.id(),
            %caller,
            %origin,
            %destination,
            "search submitted"
        );

        tokio::spawn({
            let session = session.clone();
            let permits = self.permits.clone();
            let context = self.context.clone();
            async move {
                let permit = tokio::select! {
                    permit = permits.acquire_owned() => permit,
                    _ = session.cancel_flag().canceled() => return,
                    _ = tokio::time::sleep_until(session.deadline()) => {
                        session.cancel(CancelReason::TimedOut);
                        return;
                    }
                };
                let Ok(_permit) = permit else {
                    // Semaphore closed by shutdown
                    session.cancel(CancelReason::Requested);
                    return;
                };
                debug!(session = %session.id(), "search admitted");
                // A panicking search still has to end its session
                if AssertUnwindSafe(session.run(&context)).catch_unwind().await.is_err() {
                    error!(session = %session.id(), "search panicked");
                    session.complete(SessionOutcome::Error("search panicked".to_string()));
                }
            }
        });

        Ok(SessionHandle::new(session))
    }

    /// Cancel the caller's live session. False if it has none.
    pub fn cancel(&self, caller: &CallerId) -> bool {
        let session = self.lock().get(caller).cloned();
        session.is_some_and(|s| s.cancel(CancelReason::Requested))
    }

    /// State of the caller's most recent session.
    pub fn status(&self, caller: &CallerId) -> Option<SessionState> {
        self.lock().get(caller).map(|s| s.state())
    }

    /// Handle to the caller's most recent session.
    pub fn session(&self, caller: &CallerId) -> Option<SessionHandle> {
        self.lock().get(caller).cloned().map(SessionHandle::new)
    }

    /// Sessions queued or running.
    pub fn active_count(&self) -> usize {
        self.lock()
            .values()
            .filter(|s| !s.state().is_terminal())
            .count()
    }

    /// Searches currently holding a worker slot.
    pub fn running_count(&self) -> usize {
        self.lock()
            .values()
            .filter(|s| s.state() == SessionState::Running)
            .count()
    }

    /// Cancel every live session and refuse new ones.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        self.permits.close();
        let sessions: Vec<_> = self.lock().values().cloned().collect();
        let canceled = sessions
            .iter()
            .filter(|s| s.cancel(CancelReason::Requested))
            .count();
        info!(canceled, "search coordinator shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Drop for SearchCoordinator {
    fn drop(&mut self) {
        if !self.is_shut_down() {
            self.shutdown();
        }
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
