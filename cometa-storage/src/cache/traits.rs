//! Cache backend traits and cacheable value marker.
//!
//! This module defines the traits that must be implemented by cache backends
//! and values that can be cached.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cometa_core::CometaResult;
use serde::{de::DeserializeOwned, Serialize};

use super::watermark::Watermark;

/// Marker trait for types that can be cached.
///
/// Blanket-implemented for every `Clone + Serialize + DeserializeOwned`
/// type that is safe to share across tasks.
pub trait Cacheable: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Cacheable for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// A value together with the metadata needed to judge its freshness.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry<T> {
    pub value: T,
    /// When the value was stored.
    pub cached_at: DateTime<Utc>,
    /// Journal watermark observed before the value was computed.
    pub watermark: Watermark,
    pub tags: Vec<String>,
}

/// Cache backend trait for pluggable cache implementations.
///
/// Backends only store and return entries; freshness decisions belong to
/// the read-through layer. Implementations must be safe for concurrent use.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get an entry by key, or `None` if absent.
    async fn get<T: Cacheable>(&self, key: &str) -> CometaResult<Option<StoredEntry<T>>>;

    /// Store an entry, replacing any previous entry under the same key.
    async fn put<T: Cacheable>(&self, key: &str, entry: &StoredEntry<T>) -> CometaResult<()>;

    /// Delete a single entry. Returns true if an entry was removed.
    async fn delete(&self, key: &str) -> CometaResult<bool>;

    /// Delete every entry carrying `tag`. Returns the number removed.
    async fn delete_by_tag(&self, tag: &str) -> CometaResult<u64>;

    /// Number of entries currently stored.
    async fn entry_count(&self) -> CometaResult<u64>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Number of tag invalidations processed.
    pub invalidations: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
