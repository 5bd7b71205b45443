//! Watermark and tag journal for cache invalidation.
//!
//! The tag journal records every tag invalidation with a monotonically
//! increasing sequence number. A cache entry remembers the watermark observed
//! before its value was computed; the entry is stale as soon as the journal
//! holds an invalidation for one of its tags with a higher sequence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cometa_core::CometaResult;

/// A watermark representing a point in the tag journal.
///
/// Watermarks are monotonically increasing and can be compared to determine
/// if invalidations have occurred between two points in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Watermark {
    /// Each invalidation increments this value.
    pub sequence: i64,
}

impl Watermark {
    pub fn new(sequence: i64) -> Self {
        Self { sequence }
    }

    /// The watermark before any invalidation.
    pub fn zero() -> Self {
        Self { sequence: 0 }
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Self::zero()
    }
}

/// Journal of tag invalidations.
#[async_trait]
pub trait TagJournal: Send + Sync {
    /// Latest sequence number recorded.
    async fn current_watermark(&self) -> CometaResult<Watermark>;

    /// True if any of `tags` was invalidated after `watermark`.
    async fn invalidated_since(&self, watermark: &Watermark, tags: &[String]) -> CometaResult<bool>;

    /// Record an invalidation of `tag` and return the new watermark.
    async fn record_invalidation(&self, tag: &str, at: DateTime<Utc>) -> CometaResult<Watermark>;

    /// Drop journal entries recorded before `before`.
    ///
    /// Watermarks older than the pruned range can no longer be checked
    /// precisely, so implementations must report them as invalidated.
    async fn prune(&self, before: DateTime<Utc>) -> CometaResult<u64>;
}

#[derive(Debug, Clone)]
struct InvalidationEntry {
    sequence: i64,
    recorded_at: DateTime<Utc>,
    tag: String,
}

#[derive(Debug, Default)]
struct JournalState {
    sequence: i64,
    /// Highest sequence removed by `prune`.
    pruned_through: i64,
    log: Vec<InvalidationEntry>,
}

/// In-process tag journal.
///
/// Each process holds its own journal; invalidations are not shared across
/// instances.
#[derive(Debug, Default)]
pub struct InMemoryTagJournal {
    state: tokio::sync::RwLock<JournalState>,
}

impl InMemoryTagJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of invalidations currently retained.
    pub async fn len(&self) -> usize {
        self.state.read().await.log.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.log.is_empty()
    }
}

#[async_trait]
impl TagJournal for InMemoryTagJournal {
    async fn current_watermark(&self) -> CometaResult<Watermark> {
        Ok(Watermark::new(self.state.read().await.sequence))
    }

    async fn invalidated_since(&self, watermark: &Watermark, tags: &[String]) -> CometaResult<bool> {
        let state = self.state.read().await;
        if watermark.sequence < state.pruned_through {
            return Ok(true);
        }
        let hit = state
            .log
            .iter()
            .any(|e| e.sequence > watermark.sequence && tags.iter().any(|t| t == &e.tag));
        Ok(hit)
    }

    async fn record_invalidation(&self, tag: &str, at: DateTime<Utc>) -> CometaResult<Watermark> {
        let mut state = self.state.write().await;
        state.sequence += 1;
        let sequence = state.sequence;
        state.log.push(InvalidationEntry {
            sequence,
            recorded_at: at,
            tag: tag.to_string(),
        });
        Ok(Watermark::new(sequence))
    }

    async fn prune(&self, before: DateTime<Utc>) -> CometaResult<u64> {
        let mut state = self.state.write().await;
        let before_len = state.log.len();
        let pruned_max = state
            .log
            .iter()
            .filter(|e| e.recorded_at < before)
            .map(|e| e.sequence)
            .max();
        state.log.retain(|e| e.recorded_at >= before);
        if let Some(max) = pruned_max {
            state.pruned_through = state.pruned_through.max(max);
        }
        Ok((before_len - state.log.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_watermark_ordering() {
        assert!(Watermark::new(2) > Watermark::new(1));
        assert_eq!(Watermark::default(), Watermark::zero());
    }

    #[tokio::test]
    async fn test_record_advances_watermark() {
        let journal = InMemoryTagJournal::new();
        assert_eq!(journal.current_watermark().await.unwrap(), Watermark::zero());

        let w = journal.record_invalidation("projects", Utc::now()).await.unwrap();
        assert_eq!(w.sequence, 1);
        assert_eq!(journal.current_watermark().await.unwrap(), w);
    }

    #[tokio::test]
    async fn test_invalidated_since_matches_tags() {
        let journal = InMemoryTagJournal::new();
        let before = journal.current_watermark().await.unwrap();

        journal.record_invalidation("work-entries", Utc::now()).await.unwrap();

        assert!(journal
            .invalidated_since(&before, &tags(&["projects", "work-entries"]))
            .await
            .unwrap());
        assert!(!journal
            .invalidated_since(&before, &tags(&["equipment"]))
            .await
            .unwrap());

        let after = journal.current_watermark().await.unwrap();
        assert!(!journal
            .invalidated_since(&after, &tags(&["work-entries"]))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_prune_marks_old_watermarks_invalidated() {
        let journal = InMemoryTagJournal::new();
        let start = Utc::now();
        let old = journal.current_watermark().await.unwrap();

        journal
            .record_invalidation("equipment", start - chrono::Duration::hours(2))
            .await
            .unwrap();
        let recent = journal.current_watermark().await.unwrap();
        journal.record_invalidation("projects", start).await.unwrap();

        let pruned = journal.prune(start - chrono::Duration::hours(1)).await.unwrap();
        assert_eq!(pruned, 1);
        assert_eq!(journal.len().await, 1);

        // The pruned entry was for another tag, but its range is gone.
        assert!(journal.invalidated_since(&old, &tags(&["rpc-optimized"])).await.unwrap());
        assert!(!journal
            .invalidated_since(&recent, &tags(&["rpc-optimized"]))
            .await
            .unwrap());
        assert!(journal.invalidated_since(&recent, &tags(&["projects"])).await.unwrap());
    }
}
