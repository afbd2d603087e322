use async_trait::async_trait;
use thiserror::Error;

use crate::models::{CacheEntry, Fingerprint};

/// Errors that can occur with cache store operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt cache row: {0}")]
    Corrupt(String),
}

/// Persistent, append-only store of screening outcomes
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Most recent entry for the fingerprint that has not expired yet
    async fn find(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>, CacheError>;

    /// Append an entry; earlier entries for the same fingerprint are kept
    async fn insert(&self, entry: &CacheEntry) -> Result<(), CacheError>;

    /// Whether the backing store is reachable
    async fn health_check(&self) -> bool {
        true
    }
}
