//! Search configuration.

use std::time::Duration;

use tokio::time::Instant;

use crate::modes::{ModeType, ModeTypeGroup};

use super::SearchError;

/// Per-request search flags.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchFlags {
    /// Whole-session timeout (milliseconds). Firing cancels the session.
    pub timeout_ms: u64,

    /// Pause after every expansion (milliseconds), for live visualization.
    /// Zero disables it.
    pub step_delay_ms: u64,

    /// Modes the agent may use.
    pub modes: ModeTypeGroup,

    /// Expansions between cancellation/time checks.
    pub check_interval: u32,

    /// Expansion budget of a single path trial.
    pub max_expansions: u64,

    /// Time budget of a single path trial (milliseconds).
    /// Exceeding it fails the trial rather than canceling the session.
    pub trial_timeout_ms: u64,

    /// Maximum number of tunnels in one itinerary.
    pub max_tunnels: usize,

    /// Consult and populate the result cache.
    pub use_cache: bool,
}

impl SearchFlags {
    /// Flags allowing exactly the given modes, defaults otherwise.
    pub fn with_modes(modes: ModeTypeGroup) -> Self {
        Self {
            modes,
            ..Self::default()
        }
    }

    /// Reject flags no search could run with.
    pub fn validate(&self) -> Result<(), SearchError> {
        if !self.modes.has_movement() {
            return Err(SearchError::InvalidRequest(
                "no movement mode enabled".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(SearchError::InvalidRequest(
                "timeout must be positive".to_string(),
            ));
        }
        if self.check_interval == 0 {
            return Err(SearchError::InvalidRequest(
                "check interval must be positive".to_string(),
            ));
        }
        if self.max_expansions == 0 {
            return Err(SearchError::InvalidRequest(
                "expansion budget must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the session timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Returns the per-expansion delay as a Duration.
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    /// Returns the per-trial time limit as a Duration.
    pub fn trial_timeout(&self) -> Duration {
        Duration::from_millis(self.trial_timeout_ms)
    }

    /// The budget handed to each path trial.
    pub fn budget(&self) -> TrialBudget {
        TrialBudget {
            max_expansions: self.max_expansions,
            check_interval: self.check_interval.max(1),
            time_limit: self.trial_timeout(),
            step_delay: self.step_delay(),
            deadline: None,
        }
    }
}

impl Default for SearchFlags {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            step_delay_ms: 0,
            // Digging reshapes the world, so it is opt-in
            modes: ModeTypeGroup::movement().without(ModeType::Dig),
            check_interval: 256,
            max_expansions: 100_000,
            trial_timeout_ms: 10_000,
            max_tunnels: 6,
            use_cache: true,
        }
    }
}

/// Limits of one path trial.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialBudget {
    pub max_expansions: u64,
    pub check_interval: u32,
    pub time_limit: Duration,
    pub step_delay: Duration,
    /// Session deadline. Passing it cancels the trial.
    pub deadline: Option<Instant>,
}

impl TrialBudget {
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// The session deadline has passed.
    pub fn expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

impl Default for TrialBudget {
    fn default() -> Self {
        SearchFlags::default().budget()
    }
}
