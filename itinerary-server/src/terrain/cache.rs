//! Cross-thread terrain snapshot cache.
//!
//! Workers ask for columnar chunks with [`TerrainCache::request`] and await
//! a future. The owner thread calls [`TerrainCache::drain`] once per tick:
//! duplicate requests are coalesced into one fetch, the snapshot fulfils
//! every waiter, and the chunk is stamped for eviction. [`TerrainCache::sweep`]
//! drops snapshots older than the TTL.
//!
//! The chunk count is capped. At the cap, queued requests simply wait for a
//! later tick; nothing is evicted early.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use super::{Terrain, TerrainError, TerrainOracle, TerrainSample};
use crate::domain::{Cell, RegionId};

type Reply = oneshot::Sender<Result<Arc<ChunkSnapshot>, TerrainError>>;

/// Configuration for the terrain cache.
#[derive(Debug, Clone)]
pub struct TerrainCacheConfig {
    /// Horizontal edge length of a chunk, in cells.
    pub chunk_size: i32,

    /// How long a snapshot stays cached.
    pub ttl: Duration,

    /// Maximum number of cached chunks.
    pub max_chunks: usize,
}

impl Default for TerrainCacheConfig {
    fn default() -> Self {
        Self {
            chunk_size: 16,
            ttl: Duration::from_secs(10),
            max_chunks: 1024,
        }
    }
}

/// Identifies one column of cells: (region, chunk x, chunk z).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    pub region: RegionId,
    pub x: i32,
    pub z: i32,
}

impl ChunkKey {
    /// The chunk containing `cell`.
    pub fn containing(cell: &Cell, chunk_size: i32) -> Self {
        Self {
            region: cell.region,
            x: cell.x.div_euclid(chunk_size),
            z: cell.z.div_euclid(chunk_size),
        }
    }
}

/// Immutable copy of one chunk's samples.
#[derive(Debug)]
pub struct ChunkSnapshot {
    key: ChunkKey,
    size: i32,
    min_y: i32,
    max_y: i32,
    samples: Vec<TerrainSample>,
    fetched_at: Instant,
}

impl ChunkSnapshot {
    /// Copies a chunk out of the oracle. Owner thread only.
    pub fn capture<O: TerrainOracle + ?Sized>(
        oracle: &O,
        key: ChunkKey,
        size: i32,
        now: Instant,
    ) -> Self {
        let (min_y, max_y) = oracle.vertical_bounds(key.region);
        let height = (max_y - min_y + 1).max(0);
        let mut samples = Vec::with_capacity((size * size * height) as usize);
        for y in min_y..=max_y {
            for dz in 0..size {
                for dx in 0..size {
                    let cell = Cell::new(key.x * size + dx, y, key.z * size + dz, key.region);
                    samples.push(oracle.sample(cell));
                }
            }
        }
        Self {
            key,
            size,
            min_y,
            max_y,
            samples,
            fetched_at: now,
        }
    }

    pub fn key(&self) -> ChunkKey {
        self.key
    }

    pub fn fetched_at(&self) -> Instant {
        self.fetched_at
    }
}

impl Terrain for ChunkSnapshot {
    fn sample(&self, cell: Cell) -> TerrainSample {
        if ChunkKey::containing(&cell, self.size) != self.key {
            return TerrainSample::Unloaded;
        }
        if cell.y < self.min_y || cell.y > self.max_y {
            return TerrainSample::Bedrock;
        }
        let dx = cell.x.rem_euclid(self.size);
        let dz = cell.z.rem_euclid(self.size);
        let dy = cell.y - self.min_y;
        let index = (dy * self.size * self.size + dz * self.size + dx) as usize;
        self.samples
            .get(index)
            .copied()
            .unwrap_or(TerrainSample::Unloaded)
    }
}

/// Cache counters, for monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub cached_chunks: usize,
    pub pending_requests: usize,
    pub hits: u64,
    pub fetches: u64,
    pub coalesced: u64,
    pub evictions: u64,
}

/// What one drain pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub fetched: usize,
    pub answered: usize,
    pub deferred: usize,
}

struct PendingRequest {
    key: ChunkKey,
    reply: Reply,
}

/// Everything guarded by the single cache lock.
#[derive(Default)]
struct Inner {
    snapshots: HashMap<ChunkKey, Arc<ChunkSnapshot>>,
    eviction: VecDeque<(ChunkKey, Instant)>,
    pending: VecDeque<PendingRequest>,
    closed: bool,
    stats: CacheStats,
}

/// Snapshot cache shared between workers and the owner thread.
pub struct TerrainCache {
    config: TerrainCacheConfig,
    inner: Mutex<Inner>,
}

impl TerrainCache {
    /// Create a new cache with the given configuration.
    pub fn new(config: TerrainCacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn config(&self) -> &TerrainCacheConfig {
        &self.config
    }

    /// Horizontal chunk edge length.
    pub fn chunk_size(&self) -> i32 {
        self.config.chunk_size
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a chunk snapshot, waiting for the owner thread on a miss.
    ///
    /// Callable from any thread. Fails with [`TerrainError::Unavailable`]
    /// once the cache is closed, including for requests already waiting.
    pub async fn request(&self, key: ChunkKey) -> Result<Arc<ChunkSnapshot>, TerrainError> {
        let rx = {
            let mut inner = self.lock();
            if inner.closed {
                return Err(TerrainError::Unavailable);
            }
            if let Some(snapshot) = inner.snapshots.get(&key).cloned() {
                inner.stats.hits += 1;
                return Ok(snapshot);
            }
            let (tx, rx) = oneshot::channel();
            inner.pending.push_back(PendingRequest { key, reply: tx });
            rx
        };

        rx.await.unwrap_or(Err(TerrainError::Unavailable))
    }

    /// Serve queued requests. Owner thread only.
    ///
    /// Requests for the same chunk share one fetch. Requests that would push
    /// the cache past its cap stay queued, in order, for a later tick.
    pub fn drain<O: TerrainOracle + ?Sized>(&self, oracle: &O, now: Instant) -> DrainReport {
        let mut report = DrainReport::default();

        // Group waiters by chunk, keeping first-request order
        let mut groups: Vec<(ChunkKey, Vec<Reply>)> = Vec::new();
        let mut ready: Vec<(Arc<ChunkSnapshot>, Vec<Reply>)> = Vec::new();
        {
            let mut inner = self.lock();
            if inner.closed {
                return report;
            }
            let pending = std::mem::take(&mut inner.pending);
            let mut index: HashMap<ChunkKey, usize> = HashMap::new();
            for request in pending {
                if request.reply.is_closed() {
                    continue;
                }
                match index.get(&request.key) {
                    Some(&i) => {
                        groups[i].1.push(request.reply);
                        inner.stats.coalesced += 1;
                    }
                    None => {
                        index.insert(request.key, groups.len());
                        groups.push((request.key, vec![request.reply]));
                    }
                }
            }

            // Split into already cached, fetchable and deferred
            let mut room = self.config.max_chunks.saturating_sub(inner.snapshots.len());
            let mut to_fetch = Vec::new();
            for (key, replies) in groups.drain(..) {
                if let Some(snapshot) = inner.snapshots.get(&key) {
                    ready.push((snapshot.clone(), replies));
                } else if room > 0 {
                    room -= 1;
                    to_fetch.push((key, replies));
                } else {
                    report.deferred += replies.len();
                    for reply in replies {
                        inner.pending.push_back(PendingRequest { key, reply });
                    }
                }
            }
            groups = to_fetch;
        }

        // Fetch without holding the lock so workers can keep hitting the map
        let mut fetched = Vec::with_capacity(groups.len());
        for (key, replies) in groups {
            let snapshot = Arc::new(ChunkSnapshot::capture(
                oracle,
                key,
                self.config.chunk_size,
                now,
            ));
            fetched.push((snapshot, replies));
        }

        let closed = {
            let mut inner = self.lock();
            // Closed while fetching: the cache must stay empty
            if !inner.closed {
                for (snapshot, _) in &fetched {
                    inner.snapshots.insert(snapshot.key, snapshot.clone());
                    inner.eviction.push_back((snapshot.key, now));
                    inner.stats.fetches += 1;
                }
            }
            inner.closed
        };
        if closed {
            for (_, replies) in ready.into_iter().chain(fetched) {
                for reply in replies {
                    let _ = reply.send(Err(TerrainError::Unavailable));
                }
            }
            debug!("terrain cache closed during drain");
            return report;
        }
        report.fetched = fetched.len();

        for (snapshot, replies) in ready.into_iter().chain(fetched) {
            for reply in replies {
                report.answered += 1;
                let _ = reply.send(Ok(snapshot.clone()));
            }
        }

        if report.fetched > 0 || report.deferred > 0 {
            trace!(
                fetched = report.fetched,
                answered = report.answered,
                deferred = report.deferred,
                "drained terrain requests"
            );
        }
        report
    }

    /// Evict snapshots older than the TTL. Owner thread only.
    ///
    /// Returns the number of evicted chunks.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut inner = self.lock();
        let mut evicted = 0;
        while let Some(&(key, stamped)) = inner.eviction.front() {
            if now.saturating_duration_since(stamped) < self.config.ttl {
                break;
            }
            inner.eviction.pop_front();
            let current = inner
                .snapshots
                .get(&key)
                .is_some_and(|s| s.fetched_at == stamped);
            if current {
                inner.snapshots.remove(&key);
                evicted += 1;
            }
        }
        inner.stats.evictions += evicted as u64;
        if evicted > 0 {
            debug!(evicted, remaining = inner.snapshots.len(), "swept terrain cache");
        }
        evicted
    }

    /// Stop serving. Every waiting and future request fails with
    /// [`TerrainError::Unavailable`].
    pub fn close(&self) {
        let pending = {
            let mut inner = self.lock();
            inner.closed = true;
            inner.snapshots.clear();
            inner.eviction.clear();
            std::mem::take(&mut inner.pending)
        };
        let failed = pending.len();
        for request in pending {
            let _ = request.reply.send(Err(TerrainError::Unavailable));
        }
        debug!(failed, "terrain cache closed");
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of cached chunks.
    pub fn len(&self) -> usize {
        self.lock().snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of requests waiting for the owner thread.
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            cached_chunks: inner.snapshots.len(),
            pending_requests: inner.pending.len(),
            ..inner.stats.clone()
        }
    }
}
