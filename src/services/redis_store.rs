use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;

use crate::models::{CacheEntry, Fingerprint};
use crate::services::store::{CacheError, CacheStore};

/// Entries kept, and scanned, per fingerprint
pub const MAX_ENTRIES_PER_KEY: isize = 16;

/// Redis-backed screening cache
///
/// Each fingerprint owns a sorted set of serialized entries scored by
/// `cached_at` in milliseconds. Entries are only ever added with `ZADD`;
/// expiry is evaluated when reading. Every append also moves the key's
/// `EXPIREAT` to the newest entry's expiry and trims the set to the
/// newest [`MAX_ENTRIES_PER_KEY`] members.
pub struct RedisCacheStore {
    redis: ConnectionManager,
}

impl RedisCacheStore {
    pub async fn new(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;

        Ok(Self { redis })
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn find(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>, CacheError> {
        let mut conn = self.redis.clone();
        let members: Vec<String> = redis::cmd("ZREVRANGE")
            .arg(CacheKey::screening(&fingerprint.key))
            .arg(0)
            .arg(MAX_ENTRIES_PER_KEY - 1)
            .query_async(&mut conn)
            .await?;

        let now = Utc::now();
        for json in members {
            let entry: CacheEntry = serde_json::from_str(&json)?;
            if entry.is_fresh_at(now) {
                tracing::trace!(fingerprint = %fingerprint, "Redis cache hit");
                return Ok(Some(entry));
            }
        }

        tracing::trace!(fingerprint = %fingerprint, "Redis cache miss");
        Ok(None)
    }

    async fn insert(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let json = serde_json::to_string(entry)?;

        let mut conn = self.redis.clone();
        let _: () = append_pipeline(entry, json).query_async(&mut conn).await?;

        tracing::trace!(fingerprint = %entry.fingerprint, "Redis cache append");
        Ok(())
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.redis.clone();
        let pong: Result<String, redis::RedisError> =
            redis::cmd("PING").query_async(&mut conn).await;
        pong.is_ok()
    }
}

/// `ZADD` the entry, trim the oldest members and push the key expiry out,
/// all inside one `MULTI`/`EXEC`
fn append_pipeline(entry: &CacheEntry, json: String) -> redis::Pipeline {
    let key = CacheKey::screening(&entry.fingerprint);

    let mut pipe = redis::pipe();
    pipe.atomic()
        .cmd("ZADD")
        .arg(&key)
        .arg(entry.cached_at.timestamp_millis())
        .arg(json)
        .ignore()
        .cmd("ZREMRANGEBYRANK")
        .arg(&key)
        .arg(0)
        .arg(-(MAX_ENTRIES_PER_KEY + 1))
        .ignore()
        .cmd("EXPIREAT")
        .arg(&key)
        .arg(entry.expires_at.timestamp())
        .ignore();
    pipe
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Build the sorted-set key holding entries for a fingerprint
    pub fn screening(fingerprint: &str) -> String {
        format!("screening:{}", fingerprint)
    }
}
