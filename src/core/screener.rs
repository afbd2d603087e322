use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::core::classifier::ResponseClassifier;
use crate::core::fingerprint::{normalize, QueryError};
use crate::models::{
    CacheEntry, DegradedReason, Fingerprint, RawProviderResponse, RiskNarrative, ScreeningQuery,
    ScreeningResult,
};
use crate::services::analysis::{AnalysisRequest, Enricher, EnrichmentError};
use crate::services::atlas::ScreeningProvider;
use crate::services::store::CacheStore;

/// How long a live screening outcome may be reused
pub const CACHE_TTL_HOURS: i64 = 24;

/// Upper bound on the optional enrichment step
pub const ENRICHMENT_TIMEOUT_SECS: u64 = 20;

/// Upper bound on a single cache store read or write
pub const STORE_TIMEOUT_SECS: u64 = 5;

/// The only error a screening call surfaces to its caller
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScreeningError {
    #[error("Invalid query: {0}")]
    InvalidQuery(#[from] QueryError),
}

/// Freshness and reuse policy for the screener
#[derive(Debug, Clone)]
pub struct ScreeningPolicy {
    pub cache_ttl: chrono::Duration,
    /// Reuse cached outcomes for queries that only carry a name
    pub allow_name_only_reuse: bool,
    pub enrichment_timeout: Duration,
    /// A store call running longer counts as a failed call
    pub store_timeout: Duration,
    /// Screening context passed to the analysis service
    pub enrichment_context: Option<String>,
}

impl Default for ScreeningPolicy {
    fn default() -> Self {
        Self {
            cache_ttl: chrono::Duration::hours(CACHE_TTL_HOURS),
            allow_name_only_reuse: false,
            enrichment_timeout: Duration::from_secs(ENRICHMENT_TIMEOUT_SECS),
            store_timeout: Duration::from_secs(STORE_TIMEOUT_SECS),
            enrichment_context: None,
        }
    }
}

/// Screening coordinator
///
/// # Flow
/// 1. Fingerprint the query
/// 2. Serve a fresh cache entry if one exists (no provider call)
/// 3. Otherwise run a live lookup, classify it and append a cache entry
/// 4. Attach narrative enrichment when available
///
/// Provider, store and enrichment failures never escape `screen`: they
/// turn into a degraded result, a cache miss, or a missing enrichment.
pub struct Screener {
    store: Arc<dyn CacheStore>,
    provider: Arc<dyn ScreeningProvider>,
    enricher: Option<Arc<dyn Enricher>>,
    classifier: ResponseClassifier,
    policy: ScreeningPolicy,
}

impl Screener {
    pub fn new(
        store: Arc<dyn CacheStore>,
        provider: Arc<dyn ScreeningProvider>,
        classifier: ResponseClassifier,
    ) -> Self {
        Self {
            store,
            provider,
            enricher: None,
            classifier,
            policy: ScreeningPolicy::default(),
        }
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn Enricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn with_policy(mut self, policy: ScreeningPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &ScreeningPolicy {
        &self.policy
    }

    /// Whether the cache store is reachable
    pub async fn store_healthy(&self) -> bool {
        self.store.health_check().await
    }

    /// Screen a person, reusing a cached outcome unless `bypass_cache` is set
    pub async fn screen(
        &self,
        person_id: &str,
        tenant_id: &str,
        query: &ScreeningQuery,
        bypass_cache: bool,
    ) -> Result<ScreeningResult, ScreeningError> {
        let fingerprint = normalize(query)?;

        tracing::info!(
            person_id,
            tenant_id,
            fingerprint = %fingerprint,
            strength = ?fingerprint.strength,
            bypass_cache,
            "Screening person"
        );

        if !bypass_cache {
            if let Some(result) = self.cached_result(&fingerprint).await {
                tracing::info!(
                    person_id,
                    fingerprint = %fingerprint,
                    risk_level = %result.risk_level,
                    "Using cached screening result"
                );
                return Ok(result);
            }
        }

        Ok(self.live_result(person_id, tenant_id, query, &fingerprint).await)
    }

    async fn cached_result(&self, fingerprint: &Fingerprint) -> Option<ScreeningResult> {
        if fingerprint.is_name_only() && !self.policy.allow_name_only_reuse {
            tracing::debug!(fingerprint = %fingerprint, "Name-only fingerprint, skipping cache read");
            return None;
        }

        let lookup = tokio::time::timeout(self.policy.store_timeout, self.store.find(fingerprint)).await;

        let entry = match lookup {
            Ok(Ok(Some(entry))) => entry,
            Ok(Ok(None)) => {
                tracing::debug!(fingerprint = %fingerprint, "Cache miss");
                return None;
            }
            Ok(Err(e)) => {
                tracing::warn!(fingerprint = %fingerprint, "Cache lookup failed, screening live: {}", e);
                return None;
            }
            Err(_) => {
                tracing::warn!(
                    fingerprint = %fingerprint,
                    "Cache lookup timed out after {:?}, screening live",
                    self.policy.store_timeout
                );
                return None;
            }
        };

        match self.classifier.classify(&entry.raw_response) {
            Ok(classification) => Some(ScreeningResult {
                request_id: entry
                    .request_id
                    .clone()
                    .unwrap_or_else(|| format!("cached-{}", entry.id)),
                match_count: entry.match_count,
                highest_confidence: entry.highest_confidence,
                risk_level: entry.risk_level,
                matches: classification.matches,
                cached_at: entry.cached_at,
                enrichment: None,
                degraded: false,
                degraded_reason: None,
            }),
            Err(e) => {
                tracing::warn!(
                    fingerprint = %fingerprint,
                    entry_id = %entry.id,
                    "Cached provider response no longer parses, screening live: {}",
                    e
                );
                None
            }
        }
    }

    async fn live_result(
        &self,
        person_id: &str,
        tenant_id: &str,
        query: &ScreeningQuery,
        fingerprint: &Fingerprint,
    ) -> ScreeningResult {
        let raw = match self.provider.lookup(query).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(person_id, fingerprint = %fingerprint, "Live screening failed: {}", e);
                return ScreeningResult::degraded(e.degraded_reason(), Utc::now());
            }
        };

        let classification = match self.classifier.classify(&raw) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(person_id, fingerprint = %fingerprint, "{}", e);
                return ScreeningResult::degraded(DegradedReason::MalformedResponse, Utc::now());
            }
        };

        let now = Utc::now();
        let request_id = classification
            .request_id
            .clone()
            .unwrap_or_else(|| format!("atlas-{}", uuid::Uuid::new_v4()));

        let entry = CacheEntry {
            id: uuid::Uuid::new_v4(),
            fingerprint: fingerprint.key.clone(),
            person_id: person_id.to_string(),
            tenant_id: tenant_id.to_string(),
            raw_response: raw.clone(),
            request_id: Some(request_id.clone()),
            match_count: classification.match_count,
            highest_confidence: classification.highest_confidence,
            risk_level: classification.risk_level,
            cached_at: now,
            expires_at: now + self.policy.cache_ttl,
        };

        match tokio::time::timeout(self.policy.store_timeout, self.store.insert(&entry)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(fingerprint = %fingerprint, "Failed to cache screening result: {}", e);
            }
            Err(_) => {
                tracing::warn!(
                    fingerprint = %fingerprint,
                    "Caching screening result timed out after {:?}, dropping it",
                    self.policy.store_timeout
                );
            }
        }

        let enrichment = self.enrich(query, &raw).await;

        tracing::info!(
            person_id,
            fingerprint = %fingerprint,
            match_count = classification.match_count,
            risk_level = %classification.risk_level,
            enriched = enrichment.is_some(),
            "Live screening complete"
        );

        ScreeningResult {
            request_id,
            match_count: classification.match_count,
            highest_confidence: classification.highest_confidence,
            risk_level: classification.risk_level,
            matches: classification.matches,
            cached_at: now,
            enrichment,
            degraded: false,
            degraded_reason: None,
        }
    }

    async fn enrich(&self, query: &ScreeningQuery, raw: &RawProviderResponse) -> Option<RiskNarrative> {
        let enricher = self.enricher.as_ref()?;
        let request = AnalysisRequest::new(query, raw, self.policy.enrichment_context.clone());

        let outcome = tokio::time::timeout(self.policy.enrichment_timeout, enricher.analyze(&request))
            .await
            .unwrap_or(Err(EnrichmentError::Timeout(self.policy.enrichment_timeout)));

        match outcome {
            Ok(narrative) => Some(narrative),
            Err(e) => {
                tracing::warn!("Enrichment unavailable: {}", e);
                None
            }
        }
    }
}
