//! Session lifecycle states.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

/// Where a search session is in its lifecycle.
///
/// ```text
/// INITIAL --> RUNNING --> STOPPED_{SUCCESSFUL,FAILED,CANCELED,ERROR}
///    \
///     `--> STOPPED_CANCELED  (canceled while queued)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum SessionState {
    Initial = 0,
    Running = 1,
    StoppedSuccessful = 2,
    StoppedFailed = 3,
    StoppedCanceled = 4,
    StoppedError = 5,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionState::Initial | SessionState::Running)
    }

    pub fn name(self) -> &'static str {
        match self {
            SessionState::Initial => "INITIAL",
            SessionState::Running => "RUNNING",
            SessionState::StoppedSuccessful => "STOPPED_SUCCESSFUL",
            SessionState::StoppedFailed => "STOPPED_FAILED",
            SessionState::StoppedCanceled => "STOPPED_CANCELED",
            SessionState::StoppedError => "STOPPED_ERROR",
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => SessionState::Initial,
            1 => SessionState::Running,
            2 => SessionState::StoppedSuccessful,
            3 => SessionState::StoppedFailed,
            4 => SessionState::StoppedCanceled,
            _ => SessionState::StoppedError,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A session state changed only by compare-and-set.
#[derive(Debug)]
pub(crate) struct AtomicState(AtomicU8);

impl AtomicState {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(SessionState::Initial as u8))
    }

    pub(crate) fn load(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn transition(&self, from: SessionState, to: SessionState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// INITIAL to RUNNING. False if the session already left INITIAL.
    pub(crate) fn start(&self) -> bool {
        self.transition(SessionState::Initial, SessionState::Running)
    }

    /// Moves to a terminal state. Only one call ever succeeds.
    ///
    /// From INITIAL only cancellation is allowed.
    pub(crate) fn finish(&self, to: SessionState) -> bool {
        debug_assert!(to.is_terminal());
        loop {
            let current = self.load();
            let allowed = match current {
                SessionState::Running => true,
                SessionState::Initial => to == SessionState::StoppedCanceled,
                _ => false,
            };
            if !allowed {
                return false;
            }
            if self.transition(current, to) {
                return true;
            }
        }
    }
}
