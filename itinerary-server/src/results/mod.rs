//! Memoization of path search results.

mod cache;
mod error;
mod store;

pub use cache::{CacheKey, ResultCache, ResultCacheConfig};
pub use error::StoreError;
pub use store::{CacheEntry, JsonFileStore, MemoryStore, ResultStore};
