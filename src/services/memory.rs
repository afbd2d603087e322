//! Process-local cache store
//!
//! Used for development runs without a database and as the store behind
//! coordinator tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::models::{CacheEntry, Fingerprint};
use crate::services::store::{CacheError, CacheStore};

pub struct MemoryCacheStore {
    /// Fingerprint key -> entries in insertion order
    entries: RwLock<HashMap<String, Vec<CacheEntry>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// All entries recorded for a fingerprint key, expired ones included
    pub async fn entries_for(&self, key: &str) -> Vec<CacheEntry> {
        self.entries
            .read()
            .await
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn find(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>, CacheError> {
        let now = Utc::now();
        let entries = self.entries.read().await;

        // Ties on cached_at go to the later insert
        let freshest = entries.get(&fingerprint.key).and_then(|list| {
            list.iter()
                .enumerate()
                .filter(|(_, entry)| entry.is_fresh_at(now))
                .max_by_key(|(position, entry)| (entry.cached_at, *position))
                .map(|(_, entry)| entry.clone())
        });

        Ok(freshest)
    }

    async fn insert(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        self.entries
            .write()
            .await
            .entry(entry.fingerprint.clone())
            .or_default()
            .push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FingerprintStrength, RawProviderResponse, RiskLevel};
    use chrono::Duration;

    fn fingerprint() -> Fingerprint {
        Fingerprint {
            key: "fp-1".to_string(),
            strength: FingerprintStrength::Email,
        }
    }

    fn entry(request_id: &str, cached_ago: Duration, expires_in: Duration) -> CacheEntry {
        let now = Utc::now();
        CacheEntry {
            id: uuid::Uuid::new_v4(),
            fingerprint: "fp-1".to_string(),
            person_id: "person".to_string(),
            tenant_id: "tenant".to_string(),
            raw_response: RawProviderResponse(serde_json::json!({ "results": {} })),
            request_id: Some(request_id.to_string()),
            match_count: 0,
            highest_confidence: 0.0,
            risk_level: RiskLevel::Low,
            cached_at: now - cached_ago,
            expires_at: now + expires_in,
        }
    }

    #[tokio::test]
    async fn test_find_returns_latest_fresh_entry() {
        let store = MemoryCacheStore::new();
        store
            .insert(&entry("older", Duration::hours(2), Duration::hours(22)))
            .await
            .unwrap();
        store
            .insert(&entry("newer", Duration::hours(1), Duration::hours(23)))
            .await
            .unwrap();

        let found = store.find(&fingerprint()).await.unwrap().unwrap();
        assert_eq!(found.request_id.as_deref(), Some("newer"));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_expired_entries_are_skipped_not_removed() {
        let store = MemoryCacheStore::new();
        store
            .insert(&entry("stale", Duration::hours(25), Duration::hours(-1)))
            .await
            .unwrap();

        assert!(store.find(&fingerprint()).await.unwrap().is_none());
        assert_eq!(store.entries_for("fp-1").await.len(), 1);
    }

    #[tokio::test]
    async fn test_newest_expired_does_not_hide_older_fresh() {
        let store = MemoryCacheStore::new();
        store
            .insert(&entry("fresh", Duration::hours(3), Duration::hours(21)))
            .await
            .unwrap();
        store
            .insert(&entry("expired", Duration::hours(1), Duration::seconds(-5)))
            .await
            .unwrap();

        let found = store.find(&fingerprint()).await.unwrap().unwrap();
        assert_eq!(found.request_id.as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_unknown_fingerprint_is_miss() {
        let store = MemoryCacheStore::new();
        assert!(store.find(&fingerprint()).await.unwrap().is_none());
        assert!(store.is_empty().await);
    }
}
