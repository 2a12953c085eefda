//! Durable path result stores.

use std::io::Write;
use std::path::{Path as FsPath, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::StoreError;
use crate::domain::{Cell, Destination, Path};
use crate::modes::ModeTypeGroup;

/// A recorded path search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub origin: Cell,
    pub destination: Destination,
    /// Modes the original search was allowed to use.
    pub requested: ModeTypeGroup,
    /// Modes the path actually uses.
    pub used: ModeTypeGroup,
    pub path: Path,
    pub recorded_at: DateTime<Utc>,
    pub execution_ms: u64,
}

impl CacheEntry {
    /// Builds an entry for a freshly found path.
    pub fn new(
        origin: Cell,
        destination: Destination,
        requested: ModeTypeGroup,
        path: Path,
        execution_ms: u64,
    ) -> Self {
        Self {
            origin,
            destination,
            requested,
            used: path.modes_used(),
            path,
            recorded_at: Utc::now(),
            execution_ms,
        }
    }

    /// Returns true if this entry may answer a search restricted to `modes`.
    ///
    /// The request must be no wider than the recorded one, otherwise a
    /// cheaper path might exist with the extra modes. Every mode the path
    /// uses must still be allowed.
    pub fn serves(&self, modes: ModeTypeGroup) -> bool {
        modes.is_subset_of(self.requested) && self.used.is_subset_of(modes)
    }

    fn matches(&self, origin: &Cell, destination: &Destination) -> bool {
        self.origin == *origin && self.destination == *destination
    }
}

/// Durable storage behind the result cache.
///
/// Calls may block; the cache runs them off the async workers.
pub trait ResultStore: Send + Sync {
    /// Best stored entry for the endpoints that serves `modes`.
    fn find(
        &self,
        origin: &Cell,
        destination: &Destination,
        modes: ModeTypeGroup,
    ) -> Result<Option<CacheEntry>, StoreError>;

    /// Store an entry, replacing one with the same endpoints and requested
    /// group.
    fn save(&self, entry: CacheEntry) -> Result<(), StoreError>;

    /// Forget everything.
    fn clear(&self) -> Result<(), StoreError>;
}

fn best_match(
    entries: &[CacheEntry],
    origin: &Cell,
    destination: &Destination,
    modes: ModeTypeGroup,
) -> Option<CacheEntry> {
    entries
        .iter()
        .filter(|e| e.matches(origin, destination) && e.serves(modes))
        .min_by(|a, b| a.path.length().total_cmp(&b.path.length()))
        .cloned()
}

fn upsert(entries: &mut Vec<CacheEntry>, entry: CacheEntry) {
    match entries.iter_mut().find(|e| {
        e.matches(&entry.origin, &entry.destination) && e.requested == entry.requested
    }) {
        Some(existing) => *existing = entry,
        None => entries.push(entry),
    }
}

/// In-process store; contents die with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl ResultStore for MemoryStore {
    fn find(
        &self,
        origin: &Cell,
        destination: &Destination,
        modes: ModeTypeGroup,
    ) -> Result<Option<CacheEntry>, StoreError> {
        Ok(best_match(&self.lock(), origin, destination, modes))
    }

    fn save(&self, entry: CacheEntry) -> Result<(), StoreError> {
        upsert(&mut self.lock(), entry);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.lock().clear();
        Ok(())
    }
}

/// On-disk document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    entries: Vec<CacheEntry>,
}

/// Store keeping every entry in one JSON file.
///
/// The whole document is read and rewritten on each call. Rewrites go to a
/// temporary file that is then renamed over the store, so readers see the
/// old document or the new one, never a torn write.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    io: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io: Mutex::new(()),
        }
    }

    /// Get the store file path.
    pub fn path(&self) -> &FsPath {
        &self.path
    }

    fn read(&self) -> Result<StoreDocument, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreDocument::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Creates parent directories if they don't exist.
    fn write(&self, document: &StoreDocument) -> Result<(), StoreError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => FsPath::new("."),
        };
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(document)?;

        // Same directory, so the rename cannot cross filesystems
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|err| err.error)?;
        Ok(())
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.io.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ResultStore for JsonFileStore {
    fn find(
        &self,
        origin: &Cell,
        destination: &Destination,
        modes: ModeTypeGroup,
    ) -> Result<Option<CacheEntry>, StoreError> {
        let _guard = self.guard();
        let document = self.read()?;
        Ok(best_match(&document.entries, origin, destination, modes))
    }

    fn save(&self, entry: CacheEntry) -> Result<(), StoreError> {
        let _guard = self.guard();
        let mut document = self.read()?;
        upsert(&mut document.entries, entry);
        self.write(&document)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.guard();
        self.write(&StoreDocument::default())
    }
}
