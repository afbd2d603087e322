use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;

use crate::models::{CacheEntry, Fingerprint, RawProviderResponse, RiskLevel};
use crate::services::store::{CacheError, CacheStore};

/// PostgreSQL-backed screening cache
///
/// Every live screening appends one row to `screening_cache`. Rows are
/// never updated or deleted by the service; lookups pick the newest row
/// whose `expires_at` is still in the future.
pub struct PostgresCacheStore {
    pool: PgPool,
}

impl PostgresCacheStore {
    /// Create a new store from a connection string and run migrations
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, CacheError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a new store from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
    ) -> Result<Self, CacheError> {
        tracing::info!("Connecting to PostgreSQL cache store");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            Duration::from_secs(acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(idle_timeout_secs.unwrap_or(600)),
        )
        .await
    }
}

#[async_trait]
impl CacheStore for PostgresCacheStore {
    async fn find(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>, CacheError> {
        let query = r#"
            SELECT id, fingerprint, person_id, tenant_id, raw_response, request_id,
                   match_count, highest_confidence, risk_level, cached_at, expires_at
            FROM screening_cache
            WHERE fingerprint = $1 AND expires_at > $2
            ORDER BY cached_at DESC, id DESC
            LIMIT 1
        "#;

        let row = sqlx::query(query)
            .bind(&fingerprint.key)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| entry_from_row(&row)).transpose()
    }

    async fn insert(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        // Single statement, so a cancelled caller leaves either the whole row or nothing
        let query = r#"
            INSERT INTO screening_cache (
                id, fingerprint, person_id, tenant_id, raw_response, request_id,
                match_count, highest_confidence, risk_level, cached_at, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#;

        sqlx::query(query)
            .bind(entry.id)
            .bind(&entry.fingerprint)
            .bind(&entry.person_id)
            .bind(&entry.tenant_id)
            .bind(entry.raw_response.as_value())
            .bind(&entry.request_id)
            .bind(entry.match_count as i32)
            .bind(entry.highest_confidence)
            .bind(entry.risk_level.as_str())
            .bind(entry.cached_at)
            .bind(entry.expires_at)
            .execute(&self.pool)
            .await?;

        tracing::debug!(fingerprint = %entry.fingerprint, id = %entry.id, "Appended screening cache row");

        Ok(())
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }
}

fn entry_from_row(row: &PgRow) -> Result<CacheEntry, CacheError> {
    let risk_level: String = row.try_get("risk_level")?;
    let match_count: i32 = row.try_get("match_count")?;
    let raw_response: serde_json::Value = row.try_get("raw_response")?;
    let cached_at: DateTime<Utc> = row.try_get("cached_at")?;
    let expires_at: DateTime<Utc> = row.try_get("expires_at")?;

    Ok(CacheEntry {
        id: row.try_get("id")?,
        fingerprint: row.try_get("fingerprint")?,
        person_id: row.try_get("person_id")?,
        tenant_id: row.try_get("tenant_id")?,
        raw_response: RawProviderResponse(raw_response),
        request_id: row.try_get("request_id")?,
        match_count: u32::try_from(match_count)
            .map_err(|_| CacheError::Corrupt(format!("negative match_count {}", match_count)))?,
        highest_confidence: row.try_get("highest_confidence")?,
        risk_level: risk_level.parse::<RiskLevel>().map_err(CacheError::Corrupt)?,
        cached_at,
        expires_at,
    })
}
