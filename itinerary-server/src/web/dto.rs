//! Data transfer objects for web requests and responses.

use serde::{Deserialize, Serialize};

use crate::domain::{Cell, Destination, Itinerary, Segment, Step};
use crate::modes::{ModeType, ModeTypeGroup};
use crate::planner::SearchFlags;
use crate::session::{CancelReason, SearchSession, SessionOutcome, SessionState};
use crate::terrain::CacheStats;

/// Request to start a search.
#[derive(Debug, Deserialize)]
pub struct SubmitSearchRequest {
    /// Who is searching; a new search replaces the caller's previous one
    pub caller: String,

    pub origin: Cell,

    pub destination: Destination,

    /// Mode names (e.g. "walk", "swim"); defaults apply when absent
    #[serde(default)]
    pub modes: Option<Vec<String>>,

    #[serde(default)]
    pub timeout_ms: Option<u64>,

    #[serde(default)]
    pub step_delay_ms: Option<u64>,

    #[serde(default)]
    pub max_expansions: Option<u64>,

    #[serde(default)]
    pub max_tunnels: Option<usize>,

    #[serde(default)]
    pub use_cache: Option<bool>,
}

impl SubmitSearchRequest {
    /// Overlay the request's options on the default flags.
    pub fn flags(&self) -> Result<SearchFlags, String> {
        let mut flags = SearchFlags::default();
        if let Some(names) = &self.modes {
            flags.modes = names
                .iter()
                .map(|name| {
                    ModeType::from_name(name).ok_or_else(|| format!("unknown mode: {name}"))
                })
                .collect::<Result<ModeTypeGroup, _>>()?;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            flags.timeout_ms = timeout_ms;
        }
        if let Some(step_delay_ms) = self.step_delay_ms {
            flags.step_delay_ms = step_delay_ms;
        }
        if let Some(max_expansions) = self.max_expansions {
            flags.max_expansions = max_expansions;
        }
        if let Some(max_tunnels) = self.max_tunnels {
            flags.max_tunnels = max_tunnels;
        }
        if let Some(use_cache) = self.use_cache {
            flags.use_cache = use_cache;
        }
        Ok(flags)
    }
}

/// Status of a caller's latest search.
#[derive(Debug, Serialize)]
pub struct SearchStatusResponse {
    pub session_id: u64,
    pub caller: String,
    pub state: SessionState,
    /// Present once the search has ended
    pub outcome: Option<OutcomeResult>,
}

impl SearchStatusResponse {
    pub fn from_session(session: &SearchSession) -> Self {
        Self {
            session_id: session.id().get(),
            caller: session.caller().to_string(),
            state: session.state(),
            outcome: session.outcome().map(OutcomeResult::from_outcome),
        }
    }
}

/// How a search ended.
#[derive(Debug, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum OutcomeResult {
    Found {
        total_length: f64,
        tunnel_count: usize,
        segments: Vec<SegmentResult>,
    },
    NotFound,
    Canceled {
        timed_out: bool,
    },
    Error {
        message: String,
    },
}

impl OutcomeResult {
    pub fn from_outcome(outcome: &SessionOutcome) -> Self {
        match outcome {
            SessionOutcome::Found(itinerary) => Self::from_itinerary(itinerary),
            SessionOutcome::NotFound => OutcomeResult::NotFound,
            SessionOutcome::Canceled(reason) => OutcomeResult::Canceled {
                timed_out: *reason == CancelReason::TimedOut,
            },
            SessionOutcome::Error(message) => OutcomeResult::Error {
                message: message.clone(),
            },
        }
    }

    fn from_itinerary(itinerary: &Itinerary) -> Self {
        OutcomeResult::Found {
            total_length: itinerary.total_length(),
            tunnel_count: itinerary.tunnel_count(),
            segments: itinerary
                .segments()
                .iter()
                .map(SegmentResult::from_segment)
                .collect(),
        }
    }
}

/// One segment of a found itinerary.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SegmentResult {
    Path {
        origin: Cell,
        destination: Cell,
        length: f64,
        steps: Vec<Step>,
    },
    Tunnel {
        origin: Cell,
        destination: Cell,
        cost: f64,
    },
}

impl SegmentResult {
    pub fn from_segment(segment: &Segment) -> Self {
        match segment {
            Segment::Path(path) => SegmentResult::Path {
                origin: path.origin(),
                destination: path.destination(),
                length: path.length(),
                steps: path.steps().to_vec(),
            },
            Segment::Tunnel(tunnel) => SegmentResult::Tunnel {
                origin: tunnel.origin(),
                destination: tunnel.destination(),
                cost: tunnel.cost(),
            },
        }
    }
}

/// Response to a cancel request.
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    /// False if the caller had no live search
    pub canceled: bool,
}

/// Server counters.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub active_searches: usize,
    pub running_searches: usize,
    pub terrain: CacheStats,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}
