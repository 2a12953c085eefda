//! Grid cell and region identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of an independent grid space.
///
/// Regions carry no geometry of their own; they are only a namespace for
/// cells. Moving between regions requires a tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(pub u32);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// A point in a region's integer grid.
///
/// Equality and hashing cover all four fields, so the same coordinates in
/// two regions are distinct cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub region: RegionId,
}

impl Cell {
    /// Creates a cell.
    pub const fn new(x: i32, y: i32, z: i32, region: RegionId) -> Self {
        Self { x, y, z, region }
    }

    /// Returns the cell displaced by the given offsets, in the same region.
    pub const fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz, self.region)
    }

    /// The cell directly above.
    pub const fn up(&self) -> Self {
        self.offset(0, 1, 0)
    }

    /// The cell directly below.
    pub const fn down(&self) -> Self {
        self.offset(0, -1, 0)
    }

    /// Straight-line distance to `other`, ignoring regions.
    pub fn distance_to(&self, other: &Cell) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        let dz = f64::from(self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Returns true if both cells live in the same region.
    pub fn same_region(&self, other: &Cell) -> bool {
        self.region == other.region
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})@{}", self.x, self.y, self.z, self.region)
    }
}
