//! In-process cache backend.
//!
//! Values are stored as `serde_json::Value` so a single map can hold entries
//! of any cacheable type. The map lives behind a tokio `RwLock`; readers never
//! block each other.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cometa_core::{CacheError, CometaResult};
use tokio::sync::RwLock;

use super::traits::{CacheBackend, Cacheable, StoredEntry};
use super::watermark::Watermark;

#[derive(Debug, Clone)]
struct RawEntry {
    payload: serde_json::Value,
    cached_at: DateTime<Utc>,
    watermark: Watermark,
    tags: Vec<String>,
}

/// Cache backend holding entries in a process-local map.
#[derive(Debug, Default)]
pub struct InMemoryCacheBackend {
    entries: RwLock<HashMap<String, RawEntry>>,
}

impl InMemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently stored, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn get<T: Cacheable>(&self, key: &str) -> CometaResult<Option<StoredEntry<T>>> {
        let raw = match self.entries.read().await.get(key) {
            Some(raw) => raw.clone(),
            None => return Ok(None),
        };

        let value: T = serde_json::from_value(raw.payload).map_err(|e| CacheError::Deserialization {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Some(StoredEntry {
            value,
            cached_at: raw.cached_at,
            watermark: raw.watermark,
            tags: raw.tags,
        }))
    }

    async fn put<T: Cacheable>(&self, key: &str, entry: &StoredEntry<T>) -> CometaResult<()> {
        let payload = serde_json::to_value(&entry.value).map_err(|e| CacheError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        let raw = RawEntry {
            payload,
            cached_at: entry.cached_at,
            watermark: entry.watermark,
            tags: entry.tags.clone(),
        };
        self.entries.write().await.insert(key.to_string(), raw);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CometaResult<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn delete_by_tag(&self, tag: &str) -> CometaResult<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, raw| !raw.tags.iter().any(|t| t == tag));
        Ok((before - entries.len()) as u64)
    }

    async fn entry_count(&self) -> CometaResult<u64> {
        Ok(self.entries.read().await.len() as u64)
    }
}
