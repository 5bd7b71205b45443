//! Tag-invalidated read-through cache.
//!
//! Entries are keyed by string and carry a set of tags. An entry is served
//! while it is younger than its TTL and none of its tags has been invalidated
//! since its value was computed.
//!
//! # Example
//!
//! ```ignore
//! let policy = cache.policy().with_tags([TAG_PROJECTS, TAG_WORK_ENTRIES]);
//! let read = cache.get_or_compute(key, &policy, || async { compute().await }).await?;
//!
//! if read.was_cache_hit() {
//!     tracing::debug!(age = ?read.age_at(Utc::now()), "served from cache");
//! }
//!
//! // After a write to work entries:
//! cache.invalidate_tag(TAG_WORK_ENTRIES).await?;
//! ```

pub mod clock;
pub mod freshness;
pub mod memory_backend;
pub mod read_through;
pub mod traits;
pub mod watermark;

pub use clock::{Clock, ManualClock, SystemClock};
pub use freshness::{CachePolicy, CacheRead};
pub use memory_backend::InMemoryCacheBackend;
pub use read_through::{CacheConfig, ReadThroughCache, DEFAULT_CACHE_TTL};
pub use traits::{CacheBackend, CacheStats, Cacheable, StoredEntry};
pub use watermark::{InMemoryTagJournal, TagJournal, Watermark};

/// Read-through cache over the in-process backend and journal.
pub type InMemoryCache = ReadThroughCache<InMemoryCacheBackend, InMemoryTagJournal>;

impl InMemoryCache {
    /// In-process cache with the given configuration and clock.
    pub fn in_memory(config: CacheConfig, clock: std::sync::Arc<dyn Clock>) -> Self {
        ReadThroughCache::with_clock(
            std::sync::Arc::new(InMemoryCacheBackend::new()),
            std::sync::Arc::new(InMemoryTagJournal::new()),
            config,
            clock,
        )
    }
}
