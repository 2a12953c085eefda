//! One search request, from submission to outcome.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use super::SearchContext;
use super::state::{AtomicState, SessionState};
use crate::domain::{CallerId, Cell, Destination, Itinerary};
use crate::planner::{CancelFlag, ItineraryOutcome, ItineraryTrial, SearchFlags};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Why a session was canceled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Explicit cancel, a newer submission from the same caller, or shutdown
    Requested,
    /// The session timeout fired
    TimedOut,
}

/// Final result of a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Found(Itinerary),
    NotFound,
    Canceled(CancelReason),
    Error(String),
}

impl SessionOutcome {
    /// The terminal state this outcome puts a session in.
    pub fn state(&self) -> SessionState {
        match self {
            SessionOutcome::Found(_) => SessionState::StoppedSuccessful,
            SessionOutcome::NotFound => SessionState::StoppedFailed,
            SessionOutcome::Canceled(_) => SessionState::StoppedCanceled,
            SessionOutcome::Error(_) => SessionState::StoppedError,
        }
    }
}

/// A single search request and its state machine.
pub struct SearchSession {
    id: SessionId,
    caller: CallerId,
    origin: Cell,
    destination: Destination,
    flags: SearchFlags,
    created_at: DateTime<Utc>,
    deadline: Instant,
    state: AtomicState,
    state_tx: watch::Sender<SessionState>,
    outcome: OnceLock<SessionOutcome>,
    cancel: CancelFlag,
}

impl SearchSession {
    /// A new INITIAL session. The timeout clock starts now.
    pub fn new(caller: CallerId, origin: Cell, destination: Destination, flags: SearchFlags) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Initial);
        Self {
            id: SessionId::next(),
            caller,
            origin,
            destination,
            deadline: Instant::now() + flags.timeout(),
            flags,
            created_at: Utc::now(),
            state: AtomicState::new(),
            state_tx,
            outcome: OnceLock::new(),
            cancel: CancelFlag::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn caller(&self) -> &CallerId {
        &self.caller
    }

    pub fn origin(&self) -> Cell {
        self.origin
    }

    pub fn destination(&self) -> Destination {
        self.destination
    }

    pub fn flags(&self) -> &SearchFlags {
        &self.flags
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the session times out.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn state(&self) -> SessionState {
        self.state.load()
    }

    /// The outcome, once the session is terminal.
    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.get()
    }

    pub(crate) fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Run the search to completion on the current task.
    ///
    /// Does nothing if the session was canceled before it started.
    pub async fn run(&self, context: &SearchContext) {
        if !self.state.start() {
            return;
        }
        self.state_tx.send_replace(SessionState::Running);
        debug!(session = %self.id, caller = %self.caller, "session running");

        let tunnels = context.tunnels.tunnels_for(&self.caller);
        let trial = ItineraryTrial::new(&context.terrain, &self.flags, &self.cancel, tunnels)
            .with_results(context.results.as_deref())
            .with_deadline(self.deadline);

        let outcome = tokio::select! {
            report = trial.run(self.origin, self.destination) => match report.outcome {
                ItineraryOutcome::Found(itinerary) => SessionOutcome::Found(itinerary),
                ItineraryOutcome::NotFound => SessionOutcome::NotFound,
                // An explicit cancel already finished us, so this is the deadline
                ItineraryOutcome::Canceled if !self.cancel.is_canceled() => {
                    SessionOutcome::Canceled(CancelReason::TimedOut)
                }
                ItineraryOutcome::Canceled => SessionOutcome::Canceled(CancelReason::Requested),
                ItineraryOutcome::Error(e) => SessionOutcome::Error(e.to_string()),
            },
            _ = self.cancel.canceled() => SessionOutcome::Canceled(CancelReason::Requested),
            _ = tokio::time::sleep_until(self.deadline) => SessionOutcome::Canceled(CancelReason::TimedOut),
        };

        self.complete(outcome);
    }

    /// Record the outcome and move to its terminal state.
    ///
    /// Returns false, discarding `outcome`, if the session already ended.
    pub fn complete(&self, outcome: SessionOutcome) -> bool {
        let to = outcome.state();
        if !self.state.finish(to) {
            return false;
        }
        // Only the winning transition gets here
        let _ = self.outcome.set(outcome);
        self.state_tx.send_replace(to);
        debug!(session = %self.id, caller = %self.caller, state = %to, "session finished");
        true
    }

    /// Cancel the session, queued or running.
    ///
    /// Takes effect immediately: the state is terminal when this returns
    /// true. A running search notices at its next check.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        let canceled = self.complete(SessionOutcome::Canceled(reason));
        self.cancel.cancel();
        canceled
    }

    /// Wait for the terminal outcome.
    pub async fn wait(&self) -> SessionOutcome {
        let mut rx = self.state_tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = rx.wait_for(|state| state.is_terminal()).await;
        self.outcome
            .get()
            .cloned()
            .unwrap_or_else(|| SessionOutcome::Error("session ended without outcome".to_string()))
    }
}

impl fmt::Debug for SearchSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchSession")
            .field("id", &self.id)
            .field("caller", &self.caller)
            .field("origin", &self.origin)
            .field("destination", &self.destination)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Caller-side handle to a submitted session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    session: Arc<SearchSession>,
}

impl SessionHandle {
    pub(crate) fn new(session: Arc<SearchSession>) -> Self {
        Self { session }
    }

    pub fn id(&self) -> SessionId {
        self.session.id()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn session(&self) -> &SearchSession {
        &self.session
    }

    /// Wait for the session to end. Any number of handles may wait.
    pub async fn outcome(&self) -> SessionOutcome {
        self.session.wait().await
    }

    pub fn cancel(&self) -> bool {
        self.session.cancel(CancelReason::Requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RegionId, StaticTunnels};
    use crate::modes::{ModeType, ModeTypeGroup};
    use crate::terrain::{
        GridWorld, OwnerConfig, RegionSpec, TerrainCache, TerrainCacheConfig, TerrainOwner,
        TerrainSample,
    };
    use std::time::Duration;

    const R1: RegionId = RegionId(1);

    fn context() -> (SearchContext, TerrainOwner) {
        let cache = Arc::new(TerrainCache::new(TerrainCacheConfig::default()));
        let world = GridWorld::new().with_region(R1, RegionSpec::flat(0));
        let owner = TerrainOwner::spawn(world, cache.clone(), OwnerConfig::default()).unwrap();
        let context = SearchContext::new(cache, Arc::new(StaticTunnels::default()));
        (context, owner)
    }

    fn session(to_x: i32, flags: SearchFlags) -> Arc<SearchSession> {
        Arc::new(SearchSession::new(
            CallerId::from("alice"),
            Cell::new(0, 0, 0, R1),
            Destination::from(Cell::new(to_x, 0, 0, R1)),
            flags,
        ))
    }

    /// Flags for a search that would run for a long time.
    fn slow() -> SearchFlags {
        SearchFlags {
            step_delay_ms: 5,
            ..SearchFlags::default()
        }
    }

    #[tokio::test]
    async fn successful_run() {
        let (context, _owner) = context();
        let session = session(4, SearchFlags::default());
        assert_eq!(session.state(), SessionState::Initial);

        session.run(&context).await;

        assert_eq!(session.state(), SessionState::StoppedSuccessful);
        let SessionOutcome::Found(itinerary) = session.wait().await else {
            panic!("expected an itinerary");
        };
        assert_eq!(itinerary.total_length(), 4.0);
    }

    #[tokio::test]
    async fn canceled_before_start_never_runs() {
        let (context, _owner) = context();
        let session = session(4, SearchFlags::default());

        assert!(session.cancel(CancelReason::Requested));
        session.run(&context).await;

        assert_eq!(session.state(), SessionState::StoppedCanceled);
        assert_eq!(
            session.outcome(),
            Some(&SessionOutcome::Canceled(CancelReason::Requested))
        );
    }

    #[tokio::test]
    async fn cancel_is_terminal_and_final() {
        let (context, _owner) = context();
        let session = session(500, slow());

        let runner = tokio::spawn({
            let session = session.clone();
            async move { session.run(&context).await }
        });
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(session.state(), SessionState::Running);

        assert!(session.cancel(CancelReason::Requested));
        assert_eq!(session.state(), SessionState::StoppedCanceled);
        assert!(!session.cancel(CancelReason::Requested));
        assert!(!session.complete(SessionOutcome::NotFound));

        runner.await.unwrap();
        assert_eq!(session.state(), SessionState::StoppedCanceled);
    }

    #[tokio::test]
    async fn timeout_cancels() {
        let (context, _owner) = context();
        let session = session(
            500,
            SearchFlags {
                timeout_ms: 40,
                ..slow()
            },
        );

        session.run(&context).await;

        assert_eq!(
            session.wait().await,
            SessionOutcome::Canceled(CancelReason::TimedOut)
        );
    }

    #[tokio::test]
    async fn timeout_fires_on_cached_terrain() {
        let cache = Arc::new(TerrainCache::new(TerrainCacheConfig::default()));
        let mut world = GridWorld::new().with_region(R1, RegionSpec::flat(0));
        // Bury the target so every search exhausts its budget
        world.fill_box(R1, [29, -1, -1], [31, 3, 1], TerrainSample::Bedrock);
        let owner_config = OwnerConfig {
            tick: Duration::from_millis(1),
            ..OwnerConfig::default()
        };
        let _owner = TerrainOwner::spawn(world, cache.clone(), owner_config).unwrap();
        let context = SearchContext::new(cache.clone(), Arc::new(StaticTunnels::default()));
        let flags = SearchFlags {
            max_expansions: 100_000,
            trial_timeout_ms: 60_000,
            ..SearchFlags::with_modes(ModeTypeGroup::of(&[ModeType::Walk]))
        };

        let warm = session(30, flags.clone());
        warm.run(&context).await;
        assert_eq!(warm.state(), SessionState::StoppedFailed);
        let fetches = cache.stats().fetches;

        let timed = session(
            30,
            SearchFlags {
                timeout_ms: 20,
                ..flags
            },
        );
        timed.run(&context).await;

        assert_eq!(cache.stats().fetches, fetches, "terrain should be cached");
        assert_eq!(timed.state(), SessionState::StoppedCanceled);
        assert_eq!(
            timed.outcome(),
            Some(&SessionOutcome::Canceled(CancelReason::TimedOut))
        );
    }

    #[tokio::test]
    async fn many_waiters_see_the_same_outcome() {
        let (context, _owner) = context();
        let session = session(3, SearchFlags::default());
        let handles: Vec<_> = (0..3).map(|_| SessionHandle::new(session.clone())).collect();

        let waiters: Vec<_> = handles
            .iter()
            .cloned()
            .map(|h| tokio::spawn(async move { h.outcome().await }))
            .collect();
        session.run(&context).await;

        for waiter in waiters {
            assert!(matches!(waiter.await.unwrap(), SessionOutcome::Found(_)));
        }
    }
}
