//! Intra-region best-first path search.
//!
//! A* over the implicit graph the enabled modes generate. The graph is
//! never materialized: moves are produced lazily from the terrain around
//! each expanded cell, which is loaded through a per-trial [`TerrainView`].

use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::{CancelFlag, TrialBudget};
use crate::domain::{Cell, Destination, Path, Step};
use crate::modes::{ModeType, ModeTypeGroup};
use crate::results::{CacheKey, ResultCache};
use crate::terrain::{TerrainCache, TerrainError, TerrainView};

/// How a path trial ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PathOutcome {
    Success(Path),
    /// No path within the budget, or none at all
    Failed,
    Canceled,
    Error(TerrainError),
}

impl PathOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PathOutcome::Success(_))
    }
}

/// Work done by one trial.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrialStats {
    pub expansions: u64,
    pub enqueued: u64,
    pub elapsed: Duration,
}

/// Outcome plus statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialReport {
    pub outcome: PathOutcome,
    pub stats: TrialStats,
    /// The path came from the result cache.
    pub from_cache: bool,
}

/// Open-set entry, ordered so the heap pops the lowest `f`, oldest first.
#[derive(Debug, Clone, Copy)]
struct OpenNode {
    f: f64,
    g: f64,
    seq: u64,
    cell: Cell,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenNode {}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering so BinaryHeap becomes a min-heap
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Best known way of reaching a cell.
#[derive(Debug, Clone, Copy)]
struct Reached {
    g: f64,
    parent: Option<Cell>,
    mode: Option<ModeType>,
    cost: f64,
}

/// One intra-region search.
pub struct PathTrial<'a> {
    terrain: &'a TerrainCache,
    budget: &'a TrialBudget,
    cancel: &'a CancelFlag,
    results: Option<&'a ResultCache>,
}

impl<'a> PathTrial<'a> {
    pub fn new(terrain: &'a TerrainCache, budget: &'a TrialBudget, cancel: &'a CancelFlag) -> Self {
        Self {
            terrain,
            budget,
            cancel,
            results: None,
        }
    }

    /// Consult and populate `results` around the search.
    pub fn with_results(mut self, results: Option<&'a ResultCache>) -> Self {
        self.results = results;
        self
    }

    /// Search for the cheapest path from `origin` into `destination` using
    /// only `modes`.
    pub async fn run(
        &self,
        origin: Cell,
        destination: &Destination,
        modes: ModeTypeGroup,
    ) -> TrialReport {
        let start = Instant::now();
        let mut stats = TrialStats::default();
        let mut from_cache = false;

        let outcome = if destination.region() != origin.region {
            PathOutcome::Failed
        } else if destination.contains(&origin) {
            PathOutcome::Success(Path::stationary(origin))
        } else {
            let mut view = TerrainView::new(self.terrain);
            let key = CacheKey::new(origin, *destination, modes);
            let cached = match self.results {
                Some(results) => results.lookup(key, &mut view).await,
                None => None,
            };
            match cached {
                Some(path) => {
                    from_cache = true;
                    PathOutcome::Success(path)
                }
                None => {
                    let outcome = self
                        .search(origin, destination, modes, &mut view, &mut stats, start)
                        .await;
                    if let (PathOutcome::Success(path), Some(results)) = (&outcome, self.results) {
                        // Background save; the handle is not needed
                        drop(results.record(key, path, start.elapsed()).await);
                    }
                    outcome
                }
            }
        };

        stats.elapsed = start.elapsed();
        debug!(
            %origin,
            %destination,
            expansions = stats.expansions,
            enqueued = stats.enqueued,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            from_cache,
            outcome = outcome_name(&outcome),
            "path trial finished"
        );

        TrialReport {
            outcome,
            stats,
            from_cache,
        }
    }

    async fn search(
        &self,
        origin: Cell,
        destination: &Destination,
        modes: ModeTypeGroup,
        view: &mut TerrainView<'_>,
        stats: &mut TrialStats,
        start: Instant,
    ) -> PathOutcome {
        let check_interval = u64::from(self.budget.check_interval.max(1));
        let mut open = BinaryHeap::new();
        let mut reached: HashMap<Cell, Reached> = HashMap::new();
        let mut seq = 0u64;

        reached.insert(
            origin,
            Reached {
                g: 0.0,
                parent: None,
                mode: None,
                cost: 0.0,
            },
        );
        open.push(OpenNode {
            f: destination.distance_from(&origin),
            g: 0.0,
            seq,
            cell: origin,
        });
        stats.enqueued += 1;

        while let Some(node) = open.pop() {
            // Superseded by a cheaper route to the same cell
            if reached.get(&node.cell).is_some_and(|r| node.g > r.g) {
                continue;
            }

            if destination.contains(&node.cell) {
                return rebuild(&reached, node.cell);
            }

            if stats.expansions >= self.budget.max_expansions {
                trace!(expansions = stats.expansions, "expansion budget exhausted");
                return PathOutcome::Failed;
            }
            if stats.expansions % check_interval == 0 {
                // Cached terrain never suspends, so give the runtime a turn
                tokio::task::yield_now().await;
                if self.cancel.is_canceled() {
                    return PathOutcome::Canceled;
                }
                if self.budget.expired() {
                    trace!(expansions = stats.expansions, "session deadline passed");
                    return PathOutcome::Canceled;
                }
                if start.elapsed() > self.budget.time_limit {
                    trace!(expansions = stats.expansions, "trial time limit exceeded");
                    return PathOutcome::Failed;
                }
            }
            stats.expansions += 1;

            if let Err(e) = view.load_around(node.cell).await {
                return PathOutcome::Error(e);
            }

            for mode in modes.iter() {
                for mv in mode.destinations(node.cell, &*view) {
                    let g = node.g + mv.cost;
                    let better = match reached.entry(mv.target) {
                        Entry::Occupied(mut slot) if g < slot.get().g => {
                            slot.insert(Reached {
                                g,
                                parent: Some(node.cell),
                                mode: Some(mv.mode),
                                cost: mv.cost,
                            });
                            true
                        }
                        Entry::Occupied(_) => false,
                        Entry::Vacant(slot) => {
                            slot.insert(Reached {
                                g,
                                parent: Some(node.cell),
                                mode: Some(mv.mode),
                                cost: mv.cost,
                            });
                            true
                        }
                    };
                    if better {
                        seq += 1;
                        open.push(OpenNode {
                            f: g + destination.distance_from(&mv.target),
                            g,
                            seq,
                            cell: mv.target,
                        });
                        stats.enqueued += 1;
                    }
                }
            }

            if !self.budget.step_delay.is_zero() {
                tokio::time::sleep(self.budget.step_delay).await;
            }
        }

        PathOutcome::Failed
    }
}

/// Follow parent links back from `end`.
fn rebuild(reached: &HashMap<Cell, Reached>, end: Cell) -> PathOutcome {
    let mut steps = Vec::new();
    let mut current = Some(end);
    while let Some(cell) = current {
        let Some(node) = reached.get(&cell) else {
            break;
        };
        steps.push(match node.mode {
            Some(mode) => Step::reached(cell, mode, node.cost),
            None => Step::start(cell),
        });
        current = node.parent;
    }
    steps.reverse();

    match Path::new(steps) {
        Ok(path) => PathOutcome::Success(path),
        Err(e) => {
            debug!(error = %e, "discarding malformed path");
            PathOutcome::Failed
        }
    }
}

fn outcome_name(outcome: &PathOutcome) -> &'static str {
    match outcome {
        PathOutcome::Success(_) => "success",
        PathOutcome::Failed => "failed",
        PathOutcome::Canceled => "canceled",
        PathOutcome::Error(_) => "error",
    }
}

#[cfg(test)]
#[path = "path_trial_tests.rs"]
mod tests;
