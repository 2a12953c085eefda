//! Tunnels: fixed-cost connectors between two cells.

use std::fmt;
use std::sync::Arc;

use super::{CallerId, Cell, DomainError};

/// Predicate telling whether an agent standing at a cell has come out of the
/// tunnel.
pub type CompletionPredicate = Arc<dyn Fn(&Cell) -> bool + Send + Sync>;

/// A long-range connector, possibly crossing regions.
///
/// The search treats a tunnel as a single edge of `cost` from `origin` to
/// `destination`. How the tunnel is actually traversed belongs to whoever
/// executes the itinerary; `is_complete` lets them tell when it is done.
#[derive(Clone)]
pub struct Tunnel {
    origin: Cell,
    destination: Cell,
    cost: f64,
    completion: Option<CompletionPredicate>,
}

impl Tunnel {
    /// Creates a tunnel.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `cost` is negative or not finite.
    pub fn new(origin: Cell, destination: Cell, cost: f64) -> Result<Self, DomainError> {
        if !cost.is_finite() || cost < 0.0 {
            return Err(DomainError::InvalidCost(cost));
        }
        Ok(Self {
            origin,
            destination,
            cost,
            completion: None,
        })
    }

    /// Replaces the default completion check (arriving at the destination).
    pub fn with_completion<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Cell) -> bool + Send + Sync + 'static,
    {
        self.completion = Some(Arc::new(predicate));
        self
    }

    pub fn origin(&self) -> Cell {
        self.origin
    }

    pub fn destination(&self) -> Cell {
        self.destination
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Returns true if the tunnel crosses into another region.
    pub fn is_cross_region(&self) -> bool {
        self.origin.region != self.destination.region
    }

    /// Returns true once an agent at `cell` has completed the tunnel.
    pub fn is_complete(&self, cell: &Cell) -> bool {
        match &self.completion {
            Some(predicate) => predicate(cell),
            None => *cell == self.destination,
        }
    }
}

impl PartialEq for Tunnel {
    fn eq(&self, other: &Self) -> bool {
        self.origin == other.origin
            && self.destination == other.destination
            && self.cost == other.cost
    }
}

impl fmt::Debug for Tunnel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tunnel")
            .field("origin", &self.origin)
            .field("destination", &self.destination)
            .field("cost", &self.cost)
            .field("custom_completion", &self.completion.is_some())
            .finish()
    }
}

/// Source of the tunnels a caller may use.
///
/// The registry is asked once per session; the returned snapshot is used for
/// the whole search. Acquisition and permission checks are the registry's
/// business.
pub trait TunnelRegistry: Send + Sync {
    fn tunnels_for(&self, caller: &CallerId) -> Vec<Tunnel>;
}

/// A registry offering the same tunnels to every caller.
#[derive(Debug, Clone, Default)]
pub struct StaticTunnels {
    tunnels: Vec<Tunnel>,
}

impl StaticTunnels {
    pub fn new(tunnels: Vec<Tunnel>) -> Self {
        Self { tunnels }
    }

    pub fn len(&self) -> usize {
        self.tunnels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tunnels.is_empty()
    }
}

impl TunnelRegistry for StaticTunnels {
    fn tunnels_for(&self, _caller: &CallerId) -> Vec<Tunnel> {
        self.tunnels.clone()
    }
}
