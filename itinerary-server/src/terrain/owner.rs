//! The owner thread.
//!
//! Holds the host's oracle and serves the terrain cache on a fixed tick. When
//! the thread stops for any reason, including a panic inside the oracle, the
//! cache is closed so that no worker waits forever.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{TerrainCache, TerrainOracle};

/// Timing of the owner loop.
#[derive(Debug, Clone)]
pub struct OwnerConfig {
    /// Interval between drains of the request queue.
    pub tick: Duration,

    /// Interval between TTL sweeps.
    pub sweep_interval: Duration,
}

impl Default for OwnerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(20),
            sweep_interval: Duration::from_secs(1),
        }
    }
}

/// Closes the cache when dropped, on normal exit and on unwind alike.
struct CloseOnExit(Arc<TerrainCache>);

impl Drop for CloseOnExit {
    fn drop(&mut self) {
        if std::thread::panicking() {
            warn!("terrain owner thread panicked; closing cache");
        }
        self.0.close();
    }
}

/// Handle to a running owner thread.
///
/// Dropping the handle stops the thread and closes the cache.
pub struct TerrainOwner {
    cache: Arc<TerrainCache>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TerrainOwner {
    /// Moves `oracle` onto a new owner thread serving `cache`.
    pub fn spawn<O: TerrainOracle>(
        oracle: O,
        cache: Arc<TerrainCache>,
        config: OwnerConfig,
    ) -> std::io::Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = std::thread::Builder::new()
            .name("terrain-owner".to_string())
            .spawn({
                let cache = cache.clone();
                let shutdown = shutdown.clone();
                move || run(oracle, cache, shutdown, config)
            })?;
        info!("terrain owner thread started");

        Ok(Self {
            cache,
            shutdown,
            handle: Some(handle),
        })
    }

    pub fn cache(&self) -> &Arc<TerrainCache> {
        &self.cache
    }

    /// Returns true while the owner thread is alive.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops the thread and waits for it to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("terrain owner thread exited with a panic");
            }
            debug!("terrain owner thread stopped");
        }
    }
}

impl Drop for TerrainOwner {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<O: TerrainOracle>(
    oracle: O,
    cache: Arc<TerrainCache>,
    shutdown: Arc<AtomicBool>,
    config: OwnerConfig,
) {
    let _close = CloseOnExit(cache.clone());
    let mut last_sweep = Instant::now();

    while !shutdown.load(Ordering::Acquire) {
        std::thread::sleep(config.tick);
        let now = Instant::now();
        cache.drain(&oracle, now);
        if now.saturating_duration_since(last_sweep) >= config.sweep_interval {
            cache.sweep(now);
            last_sweep = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Cell, RegionId};
    use crate::terrain::{
        ChunkKey, GridWorld, RegionSpec, Terrain, TerrainCacheConfig, TerrainError,
        TerrainSample,
    };

    const R1: RegionId = RegionId(1);

    fn fast() -> OwnerConfig {
        OwnerConfig {
            tick: Duration::from_millis(1),
            sweep_interval: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn serves_requests_from_owner_thread() {
        let cache = Arc::new(TerrainCache::new(TerrainCacheConfig::default()));
        let world = GridWorld::new().with_region(R1, RegionSpec::flat(0));
        let owner = TerrainOwner::spawn(world, cache.clone(), fast()).unwrap();
        assert!(owner.is_running());

        let key = ChunkKey::containing(&Cell::new(3, 0, 3, R1), 16);
        let snapshot = cache.request(key).await.unwrap();
        assert_eq!(snapshot.sample(Cell::new(3, -1, 3, R1)), TerrainSample::Ground);

        owner.shutdown();
        assert!(cache.is_closed());
    }

    #[tokio::test]
    async fn expired_chunks_are_swept() {
        let config = TerrainCacheConfig {
            ttl: Duration::from_millis(10),
            ..TerrainCacheConfig::default()
        };
        let cache = Arc::new(TerrainCache::new(config));
        let world = GridWorld::new().with_region(R1, RegionSpec::flat(0));
        let _owner = TerrainOwner::spawn(world, cache.clone(), fast()).unwrap();

        let key = ChunkKey::containing(&Cell::new(0, 0, 0, R1), 16);
        cache.request(key).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(cache.is_empty());
        assert!(cache.stats().evictions >= 1);
    }

    struct Exploding;

    impl Terrain for Exploding {
        fn sample(&self, _cell: Cell) -> TerrainSample {
            panic!("oracle failure");
        }
    }

    impl TerrainOracle for Exploding {
        fn vertical_bounds(&self, _region: RegionId) -> (i32, i32) {
            (0, 1)
        }
    }

    #[tokio::test]
    async fn panicking_oracle_fails_waiters() {
        let cache = Arc::new(TerrainCache::new(TerrainCacheConfig::default()));
        let _owner = TerrainOwner::spawn(Exploding, cache.clone(), fast()).unwrap();

        let key = ChunkKey::containing(&Cell::new(0, 0, 0, R1), 16);
        assert_eq!(cache.request(key).await.unwrap_err(), TerrainError::Unavailable);
    }
}
