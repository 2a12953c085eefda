//! Resolved intra-region paths.

use serde::{Deserialize, Serialize};

use super::{Cell, DomainError};
use crate::modes::{ModeType, ModeTypeGroup};

/// One node of a resolved path.
///
/// `mode` and `cost` describe the move that arrived here; the first step of
/// a path has neither.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub cell: Cell,
    pub mode: Option<ModeType>,
    pub cost: f64,
}

impl Step {
    /// The starting step of a path.
    pub fn start(cell: Cell) -> Self {
        Self {
            cell,
            mode: None,
            cost: 0.0,
        }
    }

    /// A step reached by a move of the given mode and cost.
    pub fn reached(cell: Cell, mode: ModeType, cost: f64) -> Self {
        Self {
            cell,
            mode: Some(mode),
            cost,
        }
    }
}

/// A concrete, costed route within one region.
///
/// # Invariants
///
/// - At least one step; the first step is the origin and costs nothing
/// - Every step cost is finite and non-negative
/// - Every step lies in the origin's region
/// - `length` is the sum of step costs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Step>", into = "Vec<Step>")]
pub struct Path {
    steps: Vec<Step>,
    length: f64,
}

impl Path {
    /// Validates steps and builds a path.
    pub fn new(steps: Vec<Step>) -> Result<Self, DomainError> {
        let first = steps.first().ok_or(DomainError::EmptyPath)?;
        if first.cost != 0.0 || first.mode.is_some() {
            return Err(DomainError::OriginStepCost(first.cost));
        }
        let region = first.cell.region;

        let mut length = 0.0;
        for step in &steps {
            if !step.cost.is_finite() || step.cost < 0.0 {
                return Err(DomainError::InvalidCost(step.cost));
            }
            if step.cell.region != region {
                return Err(DomainError::RegionMismatch {
                    expected: region,
                    found: step.cell.region,
                });
            }
            length += step.cost;
        }

        Ok(Self { steps, length })
    }

    /// A zero-length path that stays at `cell`.
    pub fn stationary(cell: Cell) -> Self {
        Self {
            steps: vec![Step::start(cell)],
            length: 0.0,
        }
    }

    /// The cell the path starts from.
    pub fn origin(&self) -> Cell {
        self.steps[0].cell
    }

    /// The cell the path ends at.
    pub fn destination(&self) -> Cell {
        self.steps[self.steps.len() - 1].cell
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Sum of all step costs.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Number of moves, i.e. steps after the origin.
    pub fn move_count(&self) -> usize {
        self.steps.len() - 1
    }

    /// The set of modes used by at least one move.
    pub fn modes_used(&self) -> ModeTypeGroup {
        self.steps.iter().filter_map(|s| s.mode).collect()
    }

    /// Iterates over the visited cells in order.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.steps.iter().map(|s| s.cell)
    }
}

impl TryFrom<Vec<Step>> for Path {
    type Error = DomainError;

    fn try_from(steps: Vec<Step>) -> Result<Self, Self::Error> {
        Path::new(steps)
    }
}

impl From<Path> for Vec<Step> {
    fn from(path: Path) -> Self {
        path.steps
    }
}
