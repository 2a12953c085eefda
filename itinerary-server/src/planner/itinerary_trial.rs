//! Inter-region itinerary composition.
//!
//! Tunnels are expensive to validate (every leg between them is a full path
//! trial), so chains of tunnels are explored cheapest-first on optimistic
//! bounds and legs are only searched once a complete chain reaches the top
//! of the queue.
//!
//! A chain's bound is the sum of its tunnel costs plus the straight-line
//! length of every leg, which never exceeds the real cost because every
//! move costs at least its length. A validated chain is re-queued at its
//! real cost, so the first validated chain popped is the cheapest one.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::path_trial::{PathOutcome, PathTrial};
use super::{CancelFlag, SearchFlags, TrialBudget};
use crate::domain::{Cell, Destination, Itinerary, Path, Segment, Tunnel};
use crate::results::ResultCache;
use crate::terrain::{TerrainCache, TerrainError};

/// Chain queue pops before giving up.
const MAX_CHAIN_CANDIDATES: usize = 10_000;

/// How an itinerary trial ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ItineraryOutcome {
    Found(Itinerary),
    NotFound,
    Canceled,
    Error(TerrainError),
}

/// Outcome plus the work spent on it.
#[derive(Debug, Clone, PartialEq)]
pub struct ItineraryReport {
    pub outcome: ItineraryOutcome,
    /// Path trials actually run, cache hits included.
    pub path_trials: usize,
    pub cache_hits: usize,
    pub expansions: u64,
    pub elapsed: Duration,
}

/// Leg trial that ended the whole search early.
enum Abort {
    Canceled,
    Error(TerrainError),
}

/// Where a leg leads: into a tunnel, or to the final destination.
type Transition = (Cell, Option<usize>);

#[derive(Debug, Clone)]
enum ChainState {
    /// Ends somewhere; may be extended
    Open,
    /// Ends in the destination region, legs not yet searched
    Complete,
    /// Every leg searched; the itinerary is ready
    Validated(Itinerary),
}

#[derive(Debug, Clone)]
struct Chain {
    priority: f64,
    seq: u64,
    /// Tunnel costs plus straight-line legs so far
    bound: f64,
    tunnels: Vec<usize>,
    state: ChainState,
}

impl PartialEq for Chain {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Chain {}

impl Ord for Chain {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering so BinaryHeap becomes a min-heap
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Chain {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One itinerary search over a snapshot of the caller's tunnels.
pub struct ItineraryTrial<'a> {
    terrain: &'a TerrainCache,
    results: Option<&'a ResultCache>,
    flags: &'a SearchFlags,
    cancel: &'a CancelFlag,
    tunnels: Vec<Tunnel>,
    deadline: Option<tokio::time::Instant>,
}

impl<'a> ItineraryTrial<'a> {
    pub fn new(
        terrain: &'a TerrainCache,
        flags: &'a SearchFlags,
        cancel: &'a CancelFlag,
        tunnels: Vec<Tunnel>,
    ) -> Self {
        Self {
            terrain,
            results: None,
            flags,
            cancel,
            tunnels,
            deadline: None,
        }
    }

    /// Stop with [`ItineraryOutcome::Canceled`] once `deadline` passes.
    pub fn with_deadline(mut self, deadline: tokio::time::Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Use `results` for every leg when the flags allow caching.
    pub fn with_results(mut self, results: Option<&'a ResultCache>) -> Self {
        self.results = results.filter(|_| self.flags.use_cache);
        self
    }

    pub async fn run(&self, origin: Cell, destination: Destination) -> ItineraryReport {
        let start = Instant::now();
        let mut budget = self.flags.budget();
        budget.deadline = self.deadline;
        let mut legs = Legs::new(self, &budget);

        let outcome = match self.search(origin, &destination, &mut legs).await {
            Ok(Some(itinerary)) => ItineraryOutcome::Found(itinerary),
            Ok(None) => ItineraryOutcome::NotFound,
            Err(Abort::Canceled) => ItineraryOutcome::Canceled,
            Err(Abort::Error(e)) => ItineraryOutcome::Error(e),
        };

        let report = ItineraryReport {
            outcome,
            path_trials: legs.trials,
            cache_hits: legs.cache_hits,
            expansions: legs.expansions,
            elapsed: start.elapsed(),
        };
        debug!(
            %origin,
            %destination,
            path_trials = report.path_trials,
            cache_hits = report.cache_hits,
            expansions = report.expansions,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "itinerary trial finished"
        );
        report
    }

    async fn search(
        &self,
        origin: Cell,
        destination: &Destination,
        legs: &mut Legs<'_, '_>,
    ) -> Result<Option<Itinerary>, Abort> {
        if destination.region() == origin.region {
            if let Some(path) = legs.run(origin, destination).await? {
                return Ok(Some(Itinerary::direct(path)));
            }
            if self.tunnels.is_empty() {
                return Ok(None);
            }
            trace!("direct path failed, trying tunnel chains");
        }
        self.search_chains(origin, destination, legs).await
    }

    async fn search_chains(
        &self,
        origin: Cell,
        destination: &Destination,
        legs: &mut Legs<'_, '_>,
    ) -> Result<Option<Itinerary>, Abort> {
        let mut queue = BinaryHeap::new();
        let mut unusable: HashSet<Transition> = HashSet::new();
        let mut seq = 0u64;

        queue.push(Chain {
            priority: 0.0,
            seq,
            bound: 0.0,
            tunnels: Vec::new(),
            state: ChainState::Open,
        });

        let check_interval = legs.budget.check_interval.max(1) as usize;
        let mut popped = 0usize;
        while let Some(chain) = queue.pop() {
            if popped % check_interval == 0 {
                tokio::task::yield_now().await;
            }
            if self.cancel.is_canceled() || legs.budget.expired() {
                return Err(Abort::Canceled);
            }
            popped += 1;
            if popped > MAX_CHAIN_CANDIDATES {
                debug!(popped, "too many tunnel chains, giving up");
                return Ok(None);
            }

            match chain.state {
                ChainState::Validated(itinerary) => return Ok(Some(itinerary)),
                ChainState::Complete => {
                    match self
                        .validate(origin, destination, &chain.tunnels, legs, &mut unusable)
                        .await?
                    {
                        Some(itinerary) => {
                            seq += 1;
                            queue.push(Chain {
                                priority: itinerary.total_length(),
                                seq,
                                bound: chain.bound,
                                tunnels: chain.tunnels,
                                state: ChainState::Validated(itinerary),
                            });
                        }
                        None => trace!(tunnels = ?chain.tunnels, "chain failed validation"),
                    }
                }
                ChainState::Open => {
                    let end = self.chain_end(origin, &chain.tunnels);

                    if !chain.tunnels.is_empty()
                        && end.region == destination.region()
                        && !unusable.contains(&(end, None))
                    {
                        seq += 1;
                        queue.push(Chain {
                            priority: chain.bound + destination.distance_from(&end),
                            seq,
                            bound: chain.bound,
                            tunnels: chain.tunnels.clone(),
                            state: ChainState::Complete,
                        });
                    }

                    if chain.tunnels.len() >= self.flags.max_tunnels {
                        continue;
                    }
                    for (index, tunnel) in self.tunnels.iter().enumerate() {
                        if tunnel.origin().region != end.region
                            || chain.tunnels.contains(&index)
                            || unusable.contains(&(end, Some(index)))
                        {
                            continue;
                        }
                        let exit = tunnel.destination();
                        let bound = chain.bound + end.distance_to(&tunnel.origin()) + tunnel.cost();
                        let remaining = if exit.region == destination.region() {
                            destination.distance_from(&exit)
                        } else {
                            0.0
                        };
                        let mut tunnels = chain.tunnels.clone();
                        tunnels.push(index);
                        seq += 1;
                        queue.push(Chain {
                            priority: bound + remaining,
                            seq,
                            bound,
                            tunnels,
                            state: ChainState::Open,
                        });
                    }
                }
            }
        }

        Ok(None)
    }

    /// Where a chain leaves the agent.
    fn chain_end(&self, origin: Cell, tunnels: &[usize]) -> Cell {
        tunnels
            .last()
            .map_or(origin, |&i| self.tunnels[i].destination())
    }

    /// Search every leg of a complete chain, marking the first failing
    /// transition unusable.
    async fn validate(
        &self,
        origin: Cell,
        destination: &Destination,
        tunnels: &[usize],
        legs: &mut Legs<'_, '_>,
        unusable: &mut HashSet<Transition>,
    ) -> Result<Option<Itinerary>, Abort> {
        let mut segments = Vec::with_capacity(tunnels.len() * 2 + 1);
        let mut from = origin;

        for &index in tunnels {
            let tunnel = &self.tunnels[index];
            let target = Destination::Cell(tunnel.origin());
            let Some(path) = legs.run(from, &target).await? else {
                unusable.insert((from, Some(index)));
                return Ok(None);
            };
            segments.push(Segment::Path(path));
            segments.push(Segment::Tunnel(tunnel.clone()));
            from = tunnel.destination();
        }

        let Some(path) = legs.run(from, destination).await? else {
            unusable.insert((from, None));
            return Ok(None);
        };
        segments.push(Segment::Path(path));

        match Itinerary::new(segments) {
            Ok(itinerary) => Ok(Some(itinerary)),
            Err(e) => {
                debug!(error = %e, "discarding malformed itinerary");
                Ok(None)
            }
        }
    }
}

/// Leg results memoized for one itinerary trial.
struct Legs<'t, 'b> {
    trial: &'t ItineraryTrial<'t>,
    budget: &'b TrialBudget,
    memo: HashMap<(Cell, Destination), Option<Path>>,
    trials: usize,
    cache_hits: usize,
    expansions: u64,
}

impl<'t, 'b> Legs<'t, 'b> {
    fn new(trial: &'t ItineraryTrial<'t>, budget: &'b TrialBudget) -> Self {
        Self {
            trial,
            budget,
            memo: HashMap::new(),
            trials: 0,
            cache_hits: 0,
            expansions: 0,
        }
    }

    /// Path for one leg, `None` if it cannot be walked.
    async fn run(&mut self, from: Cell, to: &Destination) -> Result<Option<Path>, Abort> {
        if let Some(known) = self.memo.get(&(from, *to)) {
            return Ok(known.clone());
        }

        let report = PathTrial::new(self.trial.terrain, self.budget, self.trial.cancel)
            .with_results(self.trial.results)
            .run(from, to, self.trial.flags.modes)
            .await;
        self.trials += 1;
        self.expansions += report.stats.expansions;
        if report.from_cache {
            self.cache_hits += 1;
        }

        let leg = match report.outcome {
            PathOutcome::Success(path) => Some(path),
            PathOutcome::Failed => None,
            PathOutcome::Canceled => return Err(Abort::Canceled),
            PathOutcome::Error(e) => return Err(Abort::Error(e)),
        };
        self.memo.insert((from, *to), leg.clone());
        Ok(leg)
    }
}

#[cfg(test)]
#[path = "itinerary_trial_tests.rs"]
mod tests;
