//! Path result cache.
//!
//! An in-memory memo sits in front of a durable [`ResultStore`]. Entries are
//! never trusted blindly: a sample of their steps is re-checked against the
//! current terrain before a hit is returned, since the world may have
//! changed since the path was found.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache as MokaCache;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{CacheEntry, ResultStore, StoreError};
use crate::domain::{Cell, Destination, Path};
use crate::modes::ModeTypeGroup;
use crate::terrain::{TerrainError, TerrainView};

/// Configuration for the result cache.
#[derive(Debug, Clone)]
pub struct ResultCacheConfig {
    /// Maximum number of memoized entries.
    pub memo_capacity: u64,

    /// Steps re-checked before a hit is trusted. Zero trusts every hit.
    pub validation_samples: usize,
}

impl Default for ResultCacheConfig {
    fn default() -> Self {
        Self {
            memo_capacity: 4096,
            validation_samples: 4,
        }
    }
}

/// Memo key: endpoints plus the exact requested mode group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub origin: Cell,
    pub destination: Destination,
    pub modes: ModeTypeGroup,
}

impl CacheKey {
    pub fn new(origin: Cell, destination: Destination, modes: ModeTypeGroup) -> Self {
        Self {
            origin,
            destination,
            modes,
        }
    }
}

/// Path memoization shared by every search.
pub struct ResultCache {
    memo: MokaCache<CacheKey, Arc<CacheEntry>>,
    store: Arc<dyn ResultStore>,
    validation_samples: usize,
}

impl ResultCache {
    /// Create a new cache in front of `store`.
    pub fn new(config: &ResultCacheConfig, store: Arc<dyn ResultStore>) -> Self {
        let memo = MokaCache::builder()
            .max_capacity(config.memo_capacity)
            .build();

        Self {
            memo,
            store,
            validation_samples: config.validation_samples,
        }
    }

    /// Find a still-valid cached path.
    ///
    /// Store failures and failed validations are misses. Stale entries are
    /// left in place.
    pub async fn lookup(&self, key: CacheKey, view: &mut TerrainView<'_>) -> Option<Path> {
        let entry = match self.memo.get(&key).await {
            Some(entry) => entry,
            None => {
                let entry = Arc::new(self.find_stored(key).await?);
                self.memo.insert(key, entry.clone()).await;
                entry
            }
        };

        match validate(&entry.path, view, self.validation_samples).await {
            Ok(true) => {
                debug!(origin = %key.origin, destination = %key.destination, "result cache hit");
                Some(entry.path.clone())
            }
            Ok(false) => {
                debug!(origin = %key.origin, destination = %key.destination, "cached path is stale");
                None
            }
            Err(e) => {
                debug!(error = %e, "could not validate cached path");
                None
            }
        }
    }

    async fn find_stored(&self, key: CacheKey) -> Option<CacheEntry> {
        let store = self.store.clone();
        let found = tokio::task::spawn_blocking(move || {
            store.find(&key.origin, &key.destination, key.modes)
        })
        .await;

        match found {
            Ok(Ok(entry)) => entry,
            Ok(Err(e)) => {
                warn!(error = %e, "result store lookup failed");
                None
            }
            Err(e) => {
                warn!(error = %e, "result store lookup task failed");
                None
            }
        }
    }

    /// Record a freshly found path.
    ///
    /// The memo is updated before returning. The durable save runs in the
    /// background; the returned handle resolves when it is done and may be
    /// dropped freely.
    pub async fn record(&self, key: CacheKey, path: &Path, elapsed: Duration) -> JoinHandle<()> {
        let execution_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let entry = CacheEntry::new(key.origin, key.destination, key.modes, path.clone(), execution_ms);
        self.memo.insert(key, Arc::new(entry.clone())).await;

        let store = self.store.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = store.save(entry) {
                warn!(error = %e, "failed to save path result");
            }
        })
    }

    /// Drop every memoized and stored entry.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.memo.invalidate_all();
        self.store.clear()
    }

    /// Number of memoized entries (approximate).
    pub fn memo_len(&self) -> u64 {
        self.memo.entry_count()
    }
}

/// Indices of the steps re-checked for a path with `moves` moves.
///
/// Evenly spaced over `1..=moves`, the final step always included.
fn sample_indices(moves: usize, samples: usize) -> Vec<usize> {
    let k = samples.min(moves);
    (1..=k).map(|i| (i * moves).div_ceil(k)).collect()
}

/// Re-checks sampled steps: each must still be a move its recorded mode
/// generates from the previous step.
async fn validate(
    path: &Path,
    view: &mut TerrainView<'_>,
    samples: usize,
) -> Result<bool, TerrainError> {
    let steps = path.steps();
    for index in sample_indices(path.move_count(), samples) {
        let from = steps[index - 1].cell;
        let step = &steps[index];
        let Some(mode) = step.mode else {
            return Ok(false);
        };
        view.load_around(from).await?;
        if !mode
            .destinations(from, &*view)
            .iter()
            .any(|m| m.target == step.cell)
        {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RegionId, Step};
    use crate::modes::ModeType;
    use crate::results::MemoryStore;
    use crate::terrain::{
        GridWorld, OwnerConfig, RegionSpec, TerrainCache, TerrainCacheConfig, TerrainOwner,
        TerrainSample,
    };

    const R1: RegionId = RegionId(1);

    fn cell(x: i32) -> Cell {
        Cell::new(x, 0, 0, R1)
    }

    fn straight(len: i32) -> Path {
        let mut steps = vec![Step::start(cell(0))];
        for x in 1..=len {
            steps.push(Step::reached(cell(x), ModeType::Walk, 1.0));
        }
        Path::new(steps).unwrap()
    }

    fn terrain(world: GridWorld) -> (Arc<TerrainCache>, TerrainOwner) {
        let cache = Arc::new(TerrainCache::new(TerrainCacheConfig::default()));
        let owner = TerrainOwner::spawn(world, cache.clone(), OwnerConfig::default()).unwrap();
        (cache, owner)
    }

    fn walk() -> ModeTypeGroup {
        ModeTypeGroup::of(&[ModeType::Walk])
    }

    #[test]
    fn sampling_spreads_and_ends_on_last_step() {
        assert_eq!(sample_indices(8, 4), vec![2, 4, 6, 8]);
        assert_eq!(sample_indices(5, 4), vec![2, 3, 4, 5]);
        assert_eq!(sample_indices(2, 4), vec![1, 2]);
        assert_eq!(sample_indices(0, 4), Vec::<usize>::new());
        assert_eq!(sample_indices(7, 0), Vec::<usize>::new());
        assert_eq!(sample_indices(7, 1), vec![7]);
    }

    #[tokio::test]
    async fn recorded_path_is_served_again() {
        let (terrain, _owner) = terrain(GridWorld::new().with_region(R1, RegionSpec::flat(0)));
        let store = Arc::new(MemoryStore::new());
        let cache = ResultCache::new(&ResultCacheConfig::default(), store.clone());
        let key = CacheKey::new(cell(0), Destination::from(cell(5)), walk());

        let mut view = TerrainView::new(&terrain);
        assert!(cache.lookup(key, &mut view).await.is_none());

        let path = straight(5);
        cache
            .record(key, &path, Duration::from_millis(3))
            .await
            .await
            .unwrap();
        assert_eq!(store.len(), 1);

        let hit = cache.lookup(key, &mut view).await.unwrap();
        assert_eq!(hit, path);
    }

    #[tokio::test]
    async fn store_hit_is_promoted_into_memo() {
        let (terrain, _owner) = terrain(GridWorld::new().with_region(R1, RegionSpec::flat(0)));
        let store = Arc::new(MemoryStore::new());
        let key = CacheKey::new(cell(0), Destination::from(cell(3)), walk().with(ModeType::Jump));
        store
            .save(CacheEntry::new(key.origin, key.destination, key.modes, straight(3), 1))
            .unwrap();

        let cache = ResultCache::new(&ResultCacheConfig::default(), store);
        let mut view = TerrainView::new(&terrain);

        // Narrower request served from the store by the subset rule
        let narrow = CacheKey { modes: walk(), ..key };
        assert!(cache.lookup(narrow, &mut view).await.is_some());
        cache.memo.run_pending_tasks().await;
        assert_eq!(cache.memo_len(), 1);
    }

    #[tokio::test]
    async fn stale_path_is_a_miss_but_kept() {
        let mut world = GridWorld::new().with_region(R1, RegionSpec::flat(0));
        world.fill_box(R1, [3, 0, 0], [3, 1, 0], TerrainSample::Bedrock);
        let (terrain, _owner) = terrain(world);

        let store = Arc::new(MemoryStore::new());
        let key = CacheKey::new(cell(0), Destination::from(cell(5)), walk());
        store
            .save(CacheEntry::new(key.origin, key.destination, key.modes, straight(5), 1))
            .unwrap();

        let config = ResultCacheConfig {
            validation_samples: 5,
            ..ResultCacheConfig::default()
        };
        let cache = ResultCache::new(&config, store.clone());
        let mut view = TerrainView::new(&terrain);

        assert!(cache.lookup(key, &mut view).await.is_none());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn clear_forgets_everything() {
        let (terrain, _owner) = terrain(GridWorld::new().with_region(R1, RegionSpec::flat(0)));
        let store = Arc::new(MemoryStore::new());
        let cache = ResultCache::new(&ResultCacheConfig::default(), store.clone());
        let key = CacheKey::new(cell(0), Destination::from(cell(2)), walk());

        cache
            .record(key, &straight(2), Duration::ZERO)
            .await
            .await
            .unwrap();
        cache.clear().unwrap();

        let mut view = TerrainView::new(&terrain);
        assert!(cache.lookup(key, &mut view).await.is_none());
        assert!(store.is_empty());
    }
}
