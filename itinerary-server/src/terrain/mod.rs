//! Terrain access.
//!
//! The host owns the authoritative world and may only be queried from its
//! own thread. Searches run on workers, so they read terrain through a
//! [`TerrainCache`] of chunk snapshots that the owner thread fills once per
//! tick. Cross-thread traffic is limited to the cache's request/future
//! handoff.

mod cache;
mod error;
mod owner;
mod view;
mod world;

use serde::{Deserialize, Serialize};

use crate::domain::{Cell, RegionId};

pub use cache::{CacheStats, ChunkKey, ChunkSnapshot, DrainReport, TerrainCache, TerrainCacheConfig};
pub use error::TerrainError;
pub use owner::{OwnerConfig, TerrainOwner};
pub use view::TerrainView;
pub use world::{GridWorld, RegionSpec, WorldLoadError};

/// What occupies a cell, as classified by the host.
///
/// Whether a category is passable for a given mode is decided by the modes;
/// which category a cell belongs to is the host's business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerrainSample {
    #[default]
    Air,
    /// Solid and breakable.
    Ground,
    /// Solid and unbreakable.
    Bedrock,
    Water,
    Ladder,
    Door,
    /// Not available in the snapshot; treated as blocked.
    Unloaded,
}

impl TerrainSample {
    /// Can a body occupy this cell without any special mode.
    pub fn is_open(self) -> bool {
        matches!(self, TerrainSample::Air | TerrainSample::Ladder)
    }

    pub fn is_solid(self) -> bool {
        matches!(self, TerrainSample::Ground | TerrainSample::Bedrock)
    }

    /// Can something stand on top of this cell.
    pub fn supports(self) -> bool {
        matches!(
            self,
            TerrainSample::Ground | TerrainSample::Bedrock | TerrainSample::Ladder
        )
    }
}

/// Synchronous read access to terrain samples.
///
/// Implemented by snapshot views on worker threads and by oracles on the
/// owner thread. Modes only see this trait.
pub trait Terrain {
    fn sample(&self, cell: Cell) -> TerrainSample;
}

/// The host's authoritative world.
///
/// Only ever called from the owner thread, so implementations need to be
/// `Send` but not `Sync`.
pub trait TerrainOracle: Terrain + Send + 'static {
    /// Inclusive `(min_y, max_y)` of the region. Cells outside read as
    /// bedrock.
    fn vertical_bounds(&self, region: RegionId) -> (i32, i32);
}
