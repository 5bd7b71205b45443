//! COMETA Storage - Cache Layer and Tiered Query Execution
//!
//! Holds the tag-invalidated read-through cache, the
//! [`ProjectProgressSource`] abstraction implemented by each query tier, and
//! the [`TieredQueryExecutor`] that falls through the tiers in priority order.
//! The Postgres-backed sources live in cometa-api.

pub mod cache;
pub mod source;
pub mod tiered;

pub use cache::{
    CacheBackend, CacheConfig, CachePolicy, CacheRead, CacheStats, Cacheable, Clock,
    InMemoryCache, InMemoryCacheBackend, InMemoryTagJournal, ManualClock, ReadThroughCache,
    StoredEntry, SystemClock, TagJournal, Watermark, DEFAULT_CACHE_TTL,
};
pub use source::{compare_by_start_date_desc, MemoryProjectSource, ProjectProgressSource};
pub use tiered::{QueryOutcome, TieredQueryExecutor};
