//! Per-search view over cached snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;

use super::{ChunkKey, ChunkSnapshot, Terrain, TerrainCache, TerrainError, TerrainSample};
use crate::domain::Cell;

/// The chunks one search has pulled from the cache.
///
/// Keeps its own references, so a chunk stays readable for the rest of the
/// search even after the cache evicts it. Reads are synchronous; loading is
/// the only await point.
pub struct TerrainView<'a> {
    cache: &'a TerrainCache,
    chunks: HashMap<ChunkKey, Arc<ChunkSnapshot>>,
}

impl<'a> TerrainView<'a> {
    pub fn new(cache: &'a TerrainCache) -> Self {
        Self {
            cache,
            chunks: HashMap::new(),
        }
    }

    /// Makes sure every column within one cell of `cell` is loaded.
    ///
    /// Mode generators never look further than that horizontally.
    pub async fn load_around(&mut self, cell: Cell) -> Result<(), TerrainError> {
        let size = self.cache.chunk_size();
        let mut missing = Vec::new();
        for dx in -1..=1 {
            for dz in -1..=1 {
                let key = ChunkKey::containing(&cell.offset(dx, 0, dz), size);
                if !self.chunks.contains_key(&key) && !missing.contains(&key) {
                    missing.push(key);
                }
            }
        }
        if missing.is_empty() {
            return Ok(());
        }

        let cache = self.cache;
        let results = join_all(missing.iter().map(|key| cache.request(*key))).await;
        for (key, result) in missing.into_iter().zip(results) {
            self.chunks.insert(key, result?);
        }
        Ok(())
    }

    /// Number of chunks this view holds.
    pub fn loaded_chunks(&self) -> usize {
        self.chunks.len()
    }
}

impl Terrain for TerrainView<'_> {
    fn sample(&self, cell: Cell) -> TerrainSample {
        let key = ChunkKey::containing(&cell, self.cache.chunk_size());
        match self.chunks.get(&key) {
            Some(chunk) => chunk.sample(cell),
            None => TerrainSample::Unloaded,
        }
    }
}
