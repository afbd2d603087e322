use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, Validation};
use moka::future::Cache;
use moka::Expiry;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::core::fingerprint::display_name;
use crate::models::{DegradedReason, RawProviderResponse, ScreeningQuery};

/// Tokens are treated as expired this long before their `exp` claim
const TOKEN_EXPIRY_SKEW_SECS: i64 = 30;

/// Errors that can occur when talking to the screening provider
#[derive(Debug, Clone, Error)]
pub enum AtlasError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("Provider request failed: {0}")]
    Transport(String),

    #[error("Provider did not answer the {0} request in time")]
    Timeout(&'static str),

    #[error("Invalid provider response: {0}")]
    MalformedResponse(String),
}

impl AtlasError {
    fn from_reqwest(stage: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AtlasError::Timeout(stage)
        } else {
            AtlasError::Transport(format!("{} request: {}", stage, err))
        }
    }

    /// How this failure is reported on a degraded result
    pub fn degraded_reason(&self) -> DegradedReason {
        match self {
            AtlasError::Authentication(_) => DegradedReason::Authentication,
            AtlasError::MalformedResponse(_) => DegradedReason::MalformedResponse,
            AtlasError::Provider { .. } | AtlasError::Transport(_) | AtlasError::Timeout(_) => {
                DegradedReason::Provider
            }
        }
    }
}

/// Source of raw screening data for a query
#[async_trait]
pub trait ScreeningProvider: Send + Sync {
    async fn lookup(&self, query: &ScreeningQuery) -> Result<RawProviderResponse, AtlasError>;
}

/// Bearer credential issued by the provider's login endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl BearerToken {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Build a token from a login response
    ///
    /// JWTs are trusted for their `exp` claim (minus a small skew); opaque
    /// tokens get the fallback TTL.
    pub fn issued(value: String, fallback_ttl: Duration) -> Self {
        let now = Utc::now();
        let expires_at = jwt_expiry(&value)
            .map(|exp| exp - chrono::Duration::seconds(TOKEN_EXPIRY_SKEW_SECS))
            .unwrap_or_else(|| {
                now + chrono::Duration::from_std(fallback_ttl)
                    .unwrap_or_else(|_| chrono::Duration::seconds(0))
            });

        Self { value, expires_at }
    }

    fn remaining(&self) -> Duration {
        (self.expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    exp: Option<i64>,
}

fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    // Only the expiry is read; the provider is the one verifying signatures
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = jsonwebtoken::decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation).ok()?;
    DateTime::from_timestamp(data.claims.exp?, 0)
}

struct TokenExpiry;

impl Expiry<String, BearerToken> for TokenExpiry {
    fn expire_after_create(&self, _account: &String, token: &BearerToken, _created_at: Instant) -> Option<Duration> {
        Some(token.remaining())
    }
}

/// Shared bearer-token cache for the provider client
///
/// Tokens live until their own expiry. Concurrent callers that find no
/// valid token share a single in-flight login.
pub struct TokenCache {
    tokens: Cache<String, BearerToken>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self {
            tokens: Cache::builder().max_capacity(16).expire_after(TokenExpiry).build(),
        }
    }

    /// Cached token for the account, or the result of `login`
    pub async fn get_or_login<F>(&self, account: &str, login: F) -> Result<BearerToken, AtlasError>
    where
        F: Future<Output = Result<BearerToken, AtlasError>>,
    {
        self.tokens
            .try_get_with(account.to_string(), login)
            .await
            .map_err(|e| (*e).clone())
    }

    pub async fn current(&self, account: &str) -> Option<BearerToken> {
        self.tokens.get(account).await
    }

    pub async fn insert(&self, account: &str, token: BearerToken) {
        self.tokens.insert(account.to_string(), token).await;
    }

    /// Drop the rejected token unless another caller already replaced it
    pub async fn invalidate_if_current(&self, account: &str, rejected: &BearerToken) {
        if self.tokens.get(account).await.as_ref() == Some(rejected) {
            self.tokens.invalidate(account).await;
        }
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Service account used for the login step
#[derive(Clone, Serialize)]
pub struct AtlasCredentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for AtlasCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtlasCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

/// Body of the provider's risk-check endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskCheckRequest {
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthday: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub checks: Vec<String>,
}

impl RiskCheckRequest {
    /// First whitespace token is the first name, the remainder the last name
    pub fn from_query(query: &ScreeningQuery, check_type: &str) -> Self {
        let name = display_name(&query.name);
        let (first_name, last_name) = match name.split_once(' ') {
            Some((first, rest)) => (first.to_string(), rest.to_string()),
            None => (name, String::new()),
        };

        Self {
            first_name,
            last_name,
            birthday: query.date_of_birth.map(|d| d.format("%Y-%m-%d").to_string()),
            country: query.nationality.clone(),
            checks: vec![check_type.to_string()],
        }
    }
}

enum RiskCheckReply {
    Accepted(RawProviderResponse),
    Rejected { status: u16, body: String },
}

/// Atlas screening API client
///
/// Handles the two-step protocol:
/// - logging in with the service account to obtain a bearer token
/// - submitting risk checks with that token, re-authenticating once on 401
pub struct AtlasClient {
    base_url: String,
    credentials: AtlasCredentials,
    check_type: String,
    token_ttl: Duration,
    client: Client,
    tokens: Arc<TokenCache>,
}

impl AtlasClient {
    /// Create a new client; `timeout` bounds every HTTP call
    pub fn new(
        base_url: String,
        credentials: AtlasCredentials,
        check_type: String,
        timeout: Duration,
        token_ttl: Duration,
    ) -> Result<Self, AtlasError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AtlasError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            check_type,
            token_ttl,
            client,
            tokens: Arc::new(TokenCache::new()),
        })
    }

    /// Use a shared token cache instead of the client's own
    pub fn with_token_cache(mut self, tokens: Arc<TokenCache>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn token_cache(&self) -> &Arc<TokenCache> {
        &self.tokens
    }

    pub fn account(&self) -> &str {
        &self.credentials.email
    }

    async fn login(&self) -> Result<BearerToken, AtlasError> {
        let url = format!("{}/api/auth/login", self.base_url);

        tracing::info!("Logging in to screening provider as {}", self.credentials.email);

        let response = self
            .client
            .post(&url)
            .json(&self.credentials)
            .send()
            .await
            .map_err(|e| AtlasError::from_reqwest("login", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unable to read body".to_string());
            tracing::error!("Screening provider login failed: {} - {}", status, body);
            return Err(AtlasError::Authentication(format!(
                "login returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        let login: LoginResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                AtlasError::Timeout("login")
            } else {
                AtlasError::Authentication(format!("unusable login response: {}", e))
            }
        })?;

        Ok(BearerToken::issued(login.token, self.token_ttl))
    }

    async fn bearer_token(&self) -> Result<BearerToken, AtlasError> {
        self.tokens.get_or_login(&self.credentials.email, self.login()).await
    }

    async fn send_risk_check(
        &self,
        token: &BearerToken,
        request: &RiskCheckRequest,
    ) -> Result<RiskCheckReply, AtlasError> {
        let url = format!("{}/api/risk-checks", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&token.value)
            .json(request)
            .send()
            .await
            .map_err(|e| AtlasError::from_reqwest("risk check", e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Ok(RiskCheckReply::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unable to read body".to_string());
            return Err(AtlasError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                AtlasError::Timeout("risk check")
            } else {
                AtlasError::MalformedResponse(format!("risk check body is not JSON: {}", e))
            }
        })?;

        Ok(RiskCheckReply::Accepted(RawProviderResponse(json)))
    }
}

#[async_trait]
impl ScreeningProvider for AtlasClient {
    async fn lookup(&self, query: &ScreeningQuery) -> Result<RawProviderResponse, AtlasError> {
        let request = RiskCheckRequest::from_query(query, &self.check_type);

        let token = self.bearer_token().await?;
        match self.send_risk_check(&token, &request).await? {
            RiskCheckReply::Accepted(raw) => return Ok(raw),
            RiskCheckReply::Rejected { status, .. } => {
                tracing::warn!("Risk check rejected the bearer token ({}), re-authenticating", status);
                self.tokens.invalidate_if_current(&self.credentials.email, &token).await;
            }
        }

        // Exactly one re-login and one retry
        let token = self.bearer_token().await?;
        match self.send_risk_check(&token, &request).await? {
            RiskCheckReply::Accepted(raw) => Ok(raw),
            RiskCheckReply::Rejected { status, body } => {
                tracing::error!("Risk check rejected a freshly issued token ({})", status);
                Err(AtlasError::Provider { status, body })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use jsonwebtoken::{encode, EncodingKey, Header};

    #[test]
    fn test_risk_check_request_from_query() {
        let query = ScreeningQuery::new("  Ryan   van Scott ")
            .with_date_of_birth(NaiveDate::from_ymd_opt(1969, 9, 3).unwrap())
            .with_nationality("US");

        let request = RiskCheckRequest::from_query(&query, "atlascompass_v3");
        assert_eq!(request.first_name, "Ryan");
        assert_eq!(request.last_name, "van Scott");
        assert_eq!(request.birthday.as_deref(), Some("1969-09-03"));

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["checks"], serde_json::json!(["atlascompass_v3"]));
        assert_eq!(body["firstName"], "Ryan");
        assert_eq!(body["country"], "US");
    }

    #[test]
    fn test_single_word_name_has_empty_last_name() {
        let request = RiskCheckRequest::from_query(&ScreeningQuery::new("Cher"), "atlascompass_v3");
        assert_eq!(request.first_name, "Cher");
        assert_eq!(request.last_name, "");
        assert!(!serde_json::to_value(&request).unwrap().as_object().unwrap().contains_key("birthday"));
    }

    #[test]
    fn test_jwt_expiry_is_honoured() {
        let exp = Utc::now().timestamp() + 3600;
        let jwt = encode(
            &Header::default(),
            &serde_json::json!({ "sub": "svc", "exp": exp }),
            &EncodingKey::from_secret(b"provider-secret"),
        )
        .unwrap();

        let token = BearerToken::issued(jwt, Duration::from_secs(60));
        assert_eq!(token.expires_at.timestamp(), exp - TOKEN_EXPIRY_SKEW_SECS);
    }

    #[test]
    fn test_opaque_token_uses_fallback_ttl() {
        let before = Utc::now();
        let token = BearerToken::issued("opaque-token".to_string(), Duration::from_secs(600));
        let ttl = token.expires_at - before;
        assert!(ttl <= chrono::Duration::seconds(601));
        assert!(ttl >= chrono::Duration::seconds(599));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let credentials = AtlasCredentials {
            email: "svc@example.com".to_string(),
            password: "hunter2".to_string(),
        };
        let token = BearerToken::new("secret-token", Utc::now());
        assert!(!format!("{:?}", credentials).contains("hunter2"));
        assert!(!format!("{:?}", token).contains("secret-token"));
    }

    #[test]
    fn test_error_degraded_reasons() {
        assert_eq!(
            AtlasError::Authentication("nope".into()).degraded_reason(),
            DegradedReason::Authentication
        );
        assert_eq!(AtlasError::Timeout("login").degraded_reason(), DegradedReason::Provider);
        assert_eq!(
            AtlasError::Provider { status: 503, body: String::new() }.degraded_reason(),
            DegradedReason::Provider
        );
        assert_eq!(
            AtlasError::MalformedResponse("x".into()).degraded_reason(),
            DegradedReason::MalformedResponse
        );
    }

    #[tokio::test]
    async fn test_invalidate_keeps_replacement_token() {
        let cache = TokenCache::new();
        let expires = Utc::now() + chrono::Duration::hours(1);
        let stale = BearerToken::new("stale", expires);
        let fresh = BearerToken::new("fresh", expires);

        cache.insert("svc", fresh.clone()).await;
        cache.invalidate_if_current("svc", &stale).await;
        assert_eq!(cache.current("svc").await, Some(fresh.clone()));

        cache.invalidate_if_current("svc", &fresh).await;
        assert_eq!(cache.current("svc").await, None);
    }

    #[tokio::test]
    async fn test_cached_token_skips_login() {
        let cache = TokenCache::new();
        let token = BearerToken::new("cached", Utc::now() + chrono::Duration::hours(1));
        cache.insert("svc", token.clone()).await;

        let got = cache
            .get_or_login("svc", async { Err(AtlasError::Authentication("should not run".into())) })
            .await
            .unwrap();
        assert_eq!(got, token);
    }

    #[tokio::test]
    async fn test_failed_login_is_not_cached() {
        let cache = TokenCache::new();
        let first = cache
            .get_or_login("svc", async { Err(AtlasError::Authentication("bad credentials".into())) })
            .await;
        assert!(matches!(first, Err(AtlasError::Authentication(_))));

        let token = BearerToken::new("ok", Utc::now() + chrono::Duration::hours(1));
        let second = cache.get_or_login("svc", async { Ok(token.clone()) }).await.unwrap();
        assert_eq!(second, token);
    }
}
