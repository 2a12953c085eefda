//! In-memory grid world.
//!
//! A simple [`TerrainOracle`] for tests, demos and hosts that keep their
//! world in memory. Each region has vertical bounds, an optional ground
//! level below which everything is solid, a fill for the rest and explicit
//! per-cell overrides. A world file may also list the tunnels between its
//! regions.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{Terrain, TerrainOracle, TerrainSample};
use crate::domain::{Cell, DomainError, RegionId, Tunnel};

/// Error loading a world description from disk.
#[derive(Debug, thiserror::Error)]
pub enum WorldLoadError {
    #[error("failed to read world file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid world file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid tunnel in world file: {0}")]
    Tunnel(#[from] DomainError),
}

/// Shape of one region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSpec {
    pub min_y: i32,
    pub max_y: i32,
    /// Cells with `y < ground_level` are ground.
    #[serde(default)]
    pub ground_level: Option<i32>,
    #[serde(default)]
    pub fill: TerrainSample,
}

impl RegionSpec {
    /// Open air on top of solid ground whose surface is at `ground_level - 1`.
    pub fn flat(ground_level: i32) -> Self {
        Self {
            min_y: ground_level - 4,
            max_y: ground_level + 12,
            ground_level: Some(ground_level),
            fill: TerrainSample::Air,
        }
    }

    /// Nothing but air between the bounds.
    pub fn open(min_y: i32, max_y: i32) -> Self {
        Self {
            min_y,
            max_y,
            ground_level: None,
            fill: TerrainSample::Air,
        }
    }
}

/// One explicit cell in a world file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CellOverride {
    x: i32,
    y: i32,
    z: i32,
    region: RegionId,
    sample: TerrainSample,
}

/// A box of identical cells in a world file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BoxOverride {
    region: RegionId,
    min: [i32; 3],
    max: [i32; 3],
    sample: TerrainSample,
}

/// A tunnel in a world file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TunnelEntry {
    origin: Cell,
    destination: Cell,
    cost: f64,
}

/// On-disk world description.
#[derive(Debug, Default, Serialize, Deserialize)]
struct WorldFile {
    regions: Vec<(RegionId, RegionSpec)>,
    #[serde(default)]
    boxes: Vec<BoxOverride>,
    #[serde(default)]
    cells: Vec<CellOverride>,
    #[serde(default)]
    tunnels: Vec<TunnelEntry>,
}

/// An in-memory world.
#[derive(Debug, Clone, Default)]
pub struct GridWorld {
    regions: HashMap<RegionId, RegionSpec>,
    overrides: HashMap<Cell, TerrainSample>,
    tunnels: Vec<Tunnel>,
}

impl GridWorld {
    /// Create an empty world with no regions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a region.
    pub fn with_region(mut self, region: RegionId, spec: RegionSpec) -> Self {
        self.regions.insert(region, spec);
        self
    }

    /// Adds a tunnel between two cells of this world.
    pub fn with_tunnel(mut self, tunnel: Tunnel) -> Self {
        self.tunnels.push(tunnel);
        self
    }

    /// Tunnels declared alongside the terrain.
    pub fn tunnels(&self) -> &[Tunnel] {
        &self.tunnels
    }

    /// Overrides a single cell.
    pub fn set(&mut self, cell: Cell, sample: TerrainSample) {
        self.overrides.insert(cell, sample);
    }

    /// Overrides every cell of an inclusive box.
    pub fn fill_box(&mut self, region: RegionId, a: [i32; 3], b: [i32; 3], sample: TerrainSample) {
        for x in a[0].min(b[0])..=a[0].max(b[0]) {
            for y in a[1].min(b[1])..=a[1].max(b[1]) {
                for z in a[2].min(b[2])..=a[2].max(b[2]) {
                    self.set(Cell::new(x, y, z, region), sample);
                }
            }
        }
    }

    /// Returns the spec of a region, if it exists.
    pub fn region(&self, region: RegionId) -> Option<&RegionSpec> {
        self.regions.get(&region)
    }

    /// Number of regions.
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Parses a world description from JSON.
    pub fn from_json(json: &str) -> Result<Self, WorldLoadError> {
        let file: WorldFile = serde_json::from_str(json)?;
        let mut world = GridWorld::new();
        for (region, spec) in file.regions {
            world.regions.insert(region, spec);
        }
        for b in file.boxes {
            world.fill_box(b.region, b.min, b.max, b.sample);
        }
        for c in file.cells {
            world.set(Cell::new(c.x, c.y, c.z, c.region), c.sample);
        }
        for t in file.tunnels {
            world.tunnels.push(Tunnel::new(t.origin, t.destination, t.cost)?);
        }
        Ok(world)
    }

    /// Loads a world description from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WorldLoadError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }
}

impl Terrain for GridWorld {
    fn sample(&self, cell: Cell) -> TerrainSample {
        let Some(spec) = self.regions.get(&cell.region) else {
            return TerrainSample::Unloaded;
        };
        if cell.y < spec.min_y || cell.y > spec.max_y {
            return TerrainSample::Bedrock;
        }
        if let Some(sample) = self.overrides.get(&cell) {
            return *sample;
        }
        match spec.ground_level {
            Some(level) if cell.y < level => TerrainSample::Ground,
            _ => spec.fill,
        }
    }
}

impl TerrainOracle for GridWorld {
    fn vertical_bounds(&self, region: RegionId) -> (i32, i32) {
        self.regions
            .get(&region)
            .map(|spec| (spec.min_y, spec.max_y))
            .unwrap_or((0, 0))
    }
}
