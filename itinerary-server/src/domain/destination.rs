//! Destination specifications.
//!
//! A search ends at any cell satisfying its destination, so destinations can
//! be volumes rather than single points. Each variant also reports the
//! straight-line distance to its nearest member, which the search uses as
//! its heuristic.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Cell, RegionId};

/// Where a search should end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", from = "DestinationDef")]
pub enum Destination {
    /// Exactly one cell.
    Cell(Cell),

    /// Any cell inside an inclusive axis-aligned box.
    Area {
        region: RegionId,
        min: [i32; 3],
        max: [i32; 3],
    },

    /// Any cell within `radius` of `center`.
    Radius { center: Cell, radius: u32 },
}

/// Wire form of [`Destination`]. Areas arrive with corners in any order.
#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum DestinationDef {
    Cell(Cell),
    Area {
        region: RegionId,
        min: [i32; 3],
        max: [i32; 3],
    },
    Radius { center: Cell, radius: u32 },
}

impl From<DestinationDef> for Destination {
    fn from(def: DestinationDef) -> Self {
        match def {
            DestinationDef::Cell(cell) => Destination::Cell(cell),
            DestinationDef::Area { region, min, max } => Destination::area(region, min, max),
            DestinationDef::Radius { center, radius } => Destination::Radius { center, radius },
        }
    }
}

impl Destination {
    /// Builds an area from two opposite corners in any order.
    pub fn area(region: RegionId, a: [i32; 3], b: [i32; 3]) -> Self {
        let min = [a[0].min(b[0]), a[1].min(b[1]), a[2].min(b[2])];
        let max = [a[0].max(b[0]), a[1].max(b[1]), a[2].max(b[2])];
        Destination::Area { region, min, max }
    }

    /// False for an area whose `min` exceeds its `max` on some axis.
    /// Such an area has no members.
    pub fn is_well_formed(&self) -> bool {
        match self {
            Destination::Area { min, max, .. } => (0..3).all(|i| min[i] <= max[i]),
            Destination::Cell(_) | Destination::Radius { .. } => true,
        }
    }

    /// The region every member cell belongs to.
    pub fn region(&self) -> RegionId {
        match self {
            Destination::Cell(cell) => cell.region,
            Destination::Area { region, .. } => *region,
            Destination::Radius { center, .. } => center.region,
        }
    }

    /// Returns true if `cell` satisfies this destination.
    pub fn contains(&self, cell: &Cell) -> bool {
        if cell.region != self.region() {
            return false;
        }
        match self {
            Destination::Cell(target) => target == cell,
            Destination::Area { min, max, .. } => {
                let p = [cell.x, cell.y, cell.z];
                (0..3).all(|i| p[i] >= min[i] && p[i] <= max[i])
            }
            Destination::Radius { center, radius } => {
                let r = f64::from(*radius);
                center.distance_to(cell) <= r
            }
        }
    }

    /// Straight-line distance from `cell` to the nearest member.
    ///
    /// Zero for members. Never larger than the true distance, so it is an
    /// admissible heuristic whenever every move costs at least its length.
    pub fn distance_from(&self, cell: &Cell) -> f64 {
        match self {
            Destination::Cell(target) => target.distance_to(cell),
            Destination::Area { min, max, .. } => {
                let p = [cell.x, cell.y, cell.z];
                let mut sum = 0.0;
                for i in 0..3 {
                    // Not `clamp`, which panics on an inverted box
                    let nearest = p[i].max(min[i]).min(max[i]);
                    let d = f64::from(p[i]) - f64::from(nearest);
                    sum += d * d;
                }
                sum.sqrt()
            }
            Destination::Radius { center, radius } => {
                (center.distance_to(cell) - f64::from(*radius)).max(0.0)
            }
        }
    }
}

impl From<Cell> for Destination {
    fn from(cell: Cell) -> Self {
        Destination::Cell(cell)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Cell(cell) => write!(f, "{cell}"),
            Destination::Area { region, min, max } => write!(
                f,
                "[{}, {}, {}]..[{}, {}, {}]@{region}",
                min[0], min[1], min[2], max[0], max[1], max[2]
            ),
            Destination::Radius { center, radius } => write!(f, "{center}~{radius}"),
        }
    }
}
