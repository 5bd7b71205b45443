//! Freshness policy and read metadata.
//!
//! A [`CachePolicy`] states how long an entry may be served and which tags
//! invalidate it. Every read returns a [`CacheRead<T>`] that says whether
//! the value came from the cache and when it was computed.

use chrono::{DateTime, Utc};
use std::time::Duration;

use super::watermark::Watermark;

/// How long a cached value may be served and what invalidates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    /// Entries strictly younger than this are fresh.
    pub ttl: Duration,
    /// Invalidating any of these tags evicts the entry.
    pub tags: Vec<String>,
}

impl CachePolicy {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            tags: Vec::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// True if a value cached at `cached_at` is still within the TTL at `now`.
    ///
    /// An entry exactly `ttl` old is expired. So is an entry cached after
    /// `now`, which happens when the clock steps backwards.
    pub fn within_ttl(&self, cached_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match now.signed_duration_since(cached_at).to_std() {
            Ok(age) => age < self.ttl,
            Err(_) => false,
        }
    }
}

/// Result of a cache read, carrying freshness metadata.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    /// The cached value.
    value: T,
    /// When this value was computed and stored.
    cached_at: DateTime<Utc>,
    /// The watermark at the time of computing.
    watermark: Watermark,
    /// Whether this was a cache hit or miss.
    was_cache_hit: bool,
}

impl<T> CacheRead<T> {
    /// Create a new cache read from a cache hit.
    pub fn from_cache(value: T, cached_at: DateTime<Utc>, watermark: Watermark) -> Self {
        Self {
            value,
            cached_at,
            watermark,
            was_cache_hit: true,
        }
    }

    /// Create a new cache read from a fresh computation (cache miss).
    pub fn from_compute(value: T, cached_at: DateTime<Utc>, watermark: Watermark) -> Self {
        Self {
            value,
            cached_at,
            watermark,
            was_cache_hit: false,
        }
    }

    /// Consume the wrapper and return the underlying value.
    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn cached_at(&self) -> DateTime<Utc> {
        self.cached_at
    }

    pub fn watermark(&self) -> Watermark {
        self.watermark
    }

    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }

    pub fn was_cache_miss(&self) -> bool {
        !self.was_cache_hit
    }

    /// Age of the value as of `now`.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.cached_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Map the inner value to a new type.
    pub fn map<U, F>(self, f: F) -> CacheRead<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheRead {
            value: f(self.value),
            cached_at: self.cached_at,
            watermark: self.watermark,
            was_cache_hit: self.was_cache_hit,
        }
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_ttl_boundary() {
        let policy = CachePolicy::new(Duration::from_secs(300));
        let cached_at = Utc::now();

        assert!(policy.within_ttl(cached_at, cached_at));
        assert!(policy.within_ttl(cached_at, cached_at + chrono::Duration::seconds(299)));
        assert!(!policy.within_ttl(cached_at, cached_at + chrono::Duration::seconds(300)));
        assert!(!policy.within_ttl(cached_at, cached_at + chrono::Duration::seconds(301)));
    }

    #[test]
    fn test_policy_future_entry_is_expired() {
        let policy = CachePolicy::new(Duration::from_secs(300));
        let cached_at = Utc::now();
        assert!(!policy.within_ttl(cached_at, cached_at - chrono::Duration::seconds(1)));
        assert!(!policy.within_ttl(cached_at, cached_at - chrono::Duration::hours(1)));
    }

    #[test]
    fn test_policy_with_tags() {
        let policy = CachePolicy::new(Duration::from_secs(1)).with_tags(["projects", "work-entries"]);
        assert_eq!(policy.tags, vec!["projects".to_string(), "work-entries".to_string()]);
    }

    #[test]
    fn test_cache_read_hit_and_miss() {
        let now = Utc::now();
        let hit = CacheRead::from_cache("v", now, Watermark::new(2));
        assert!(hit.was_cache_hit());
        assert_eq!(hit.watermark(), Watermark::new(2));

        let miss = CacheRead::from_compute(42i32, now, Watermark::zero());
        assert!(miss.was_cache_miss());
        assert_eq!(miss.into_value(), 42);
    }

    #[test]
    fn test_cache_read_age_and_map() {
        let cached_at = Utc::now();
        let read = CacheRead::from_cache(7u32, cached_at, Watermark::zero());
        assert_eq!(
            read.age_at(cached_at + chrono::Duration::seconds(5)),
            Duration::from_secs(5)
        );
        assert_eq!(read.age_at(cached_at - chrono::Duration::seconds(5)), Duration::ZERO);

        let mapped = read.map(|v| v.to_string());
        assert!(mapped.was_cache_hit());
        assert_eq!(mapped.into_value(), "7");
    }
}
