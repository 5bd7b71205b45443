//! Read-through cache with tag invalidation.
//!
//! This module implements the core caching logic: serve an entry while it is
//! within its TTL and none of its tags has been invalidated since it was
//! computed, otherwise compute, store and return a fresh value.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cometa_core::CometaResult;
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};
use super::freshness::{CachePolicy, CacheRead};
use super::traits::{CacheBackend, CacheStats, Cacheable, StoredEntry};
use super::watermark::TagJournal;

/// Default lifetime of a cached entry.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Configuration for the read-through cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL used by [`ReadThroughCache::policy`].
    pub default_ttl: Duration,
    /// How long invalidations are kept in the tag journal.
    pub journal_retention: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_CACHE_TTL,
            journal_retention: Duration::from_secs(3600), // 1 hour
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the journal retention window.
    pub fn with_journal_retention(mut self, retention: Duration) -> Self {
        self.journal_retention = retention;
        self
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

/// Read-through cache keyed by string with tag-based invalidation.
///
/// # Type Parameters
///
/// - `C`: The cache backend for storing entries
/// - `J`: The tag journal for invalidation
///
/// # Example
///
/// ```ignore
/// let cache = ReadThroughCache::new(backend, journal, CacheConfig::default());
/// let policy = cache.policy().with_tags(["projects", "work-entries"]);
///
/// let read = cache
///     .get_or_compute("projects-with-progress", &policy, || async { load().await })
///     .await?;
///
/// cache.invalidate_tag("projects").await?;
/// ```
pub struct ReadThroughCache<C, J>
where
    C: CacheBackend,
    J: TagJournal,
{
    cache: Arc<C>,
    journal: Arc<J>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    counters: Arc<Counters>,
}

impl<C, J> ReadThroughCache<C, J>
where
    C: CacheBackend,
    J: TagJournal,
{
    /// Create a new read-through cache on the system clock.
    pub fn new(cache: Arc<C>, journal: Arc<J>, config: CacheConfig) -> Self {
        Self::with_clock(cache, journal, config, Arc::new(SystemClock))
    }

    /// Create a new read-through cache with an explicit time source.
    pub fn with_clock(
        cache: Arc<C>,
        journal: Arc<J>,
        config: CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cache,
            journal,
            clock,
            config,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn backend(&self) -> &C {
        &self.cache
    }

    pub fn journal(&self) -> &J {
        &self.journal
    }

    /// Policy with the configured default TTL and no tags.
    pub fn policy(&self) -> CachePolicy {
        CachePolicy::new(self.config.default_ttl)
    }

    /// Return the cached value for `key` if fresh, otherwise run `compute`,
    /// store its result under the policy's tags and return it.
    ///
    /// Errors from `compute` are returned unchanged and nothing is stored.
    /// Backend read or write failures degrade to an uncached computation.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        key: &str,
        policy: &CachePolicy,
        compute: F,
    ) -> CometaResult<CacheRead<T>>
    where
        T: Cacheable,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = CometaResult<T>> + Send,
    {
        let now = self.clock.now();

        match self.cache.get::<T>(key).await {
            Ok(Some(entry)) => {
                if policy.within_ttl(entry.cached_at, now)
                    && !self
                        .journal
                        .invalidated_since(&entry.watermark, &entry.tags)
                        .await?
                {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(key, "cache hit");
                    return Ok(CacheRead::from_cache(
                        entry.value,
                        entry.cached_at,
                        entry.watermark,
                    ));
                }
                debug!(key, "cache entry stale");
            }
            Ok(None) => {}
            Err(e) => warn!(key, error = %e, "cache read failed, recomputing"),
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        // Observed before computing so that an invalidation racing the
        // computation leaves the stored entry stale.
        let watermark = self.journal.current_watermark().await?;
        let value = compute().await?;
        let cached_at = self.clock.now();

        let entry = StoredEntry {
            value,
            cached_at,
            watermark,
            tags: policy.tags.clone(),
        };
        if let Err(e) = self.cache.put(key, &entry).await {
            warn!(key, error = %e, "cache write failed");
        }

        Ok(CacheRead::from_compute(entry.value, cached_at, watermark))
    }

    /// Invalidate every entry carrying `tag`.
    ///
    /// Returns the number of entries removed from the backend. Entries being
    /// computed while this runs are stored already stale.
    pub async fn invalidate_tag(&self, tag: &str) -> CometaResult<u64> {
        let now = self.clock.now();
        let watermark = self.journal.record_invalidation(tag, now).await?;
        let removed = self.cache.delete_by_tag(tag).await?;
        self.counters.invalidations.fetch_add(1, Ordering::Relaxed);

        let retention = chrono::Duration::from_std(self.config.journal_retention)
            .unwrap_or(chrono::Duration::hours(1));
        if let Some(cutoff) = now.checked_sub_signed(retention) {
            self.journal.prune(cutoff).await?;
        }

        debug!(tag, removed, sequence = watermark.sequence, "cache tag invalidated");
        Ok(removed)
    }

    /// Invalidate several tags in order. Returns the total entries removed.
    pub async fn invalidate_tags(&self, tags: &[&str]) -> CometaResult<u64> {
        let mut removed = 0;
        for tag in tags {
            removed += self.invalidate_tag(tag).await?;
        }
        Ok(removed)
    }

    /// Remove a single key regardless of tags.
    pub async fn invalidate_key(&self, key: &str) -> CometaResult<bool> {
        self.cache.delete(key).await
    }

    /// Current hit/miss counters and entry count.
    pub async fn stats(&self) -> CometaResult<CacheStats> {
        Ok(CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            entry_count: self.cache.entry_count().await?,
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
        })
    }
}

impl<C, J> Clone for ReadThroughCache<C, J>
where
    C: CacheBackend,
    J: TagJournal,
{
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            journal: Arc::clone(&self.journal),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
            counters: Arc::clone(&self.counters),
        }
    }
}
