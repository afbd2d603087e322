use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Person lookup submitted for screening
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningQuery {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub nationality: Option<String>,
}

impl ScreeningQuery {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_date_of_birth(mut self, date_of_birth: NaiveDate) -> Self {
        self.date_of_birth = Some(date_of_birth);
        self
    }

    pub fn with_nationality(mut self, nationality: impl Into<String>) -> Self {
        self.nationality = Some(nationality.into());
        self
    }
}

/// Which secondary discriminator a fingerprint was bound on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintStrength {
    Email,
    DateOfBirth,
    /// No discriminator besides the name; weakest key
    NameOnly,
}

/// Cache key derived from a normalized [`ScreeningQuery`]
///
/// The key is a hex SHA-256 digest, so it can be stored and logged without
/// exposing the underlying identity fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub key: String,
    pub strength: FingerprintStrength,
}

impl Fingerprint {
    pub fn is_name_only(&self) -> bool {
        self.strength == FingerprintStrength::NameOnly
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Risk tier derived from the highest match confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[serde(alias = "LOW")]
    Low,
    #[serde(alias = "MEDIUM")]
    Medium,
    #[serde(alias = "HIGH")]
    High,
    #[serde(alias = "CRITICAL")]
    Critical,
}

impl RiskLevel {
    /// Thresholds are inclusive at the lower bound of each tier
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.90 {
            RiskLevel::Critical
        } else if confidence >= 0.80 {
            RiskLevel::High
        } else if confidence >= 0.70 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            other => Err(format!("unknown risk level: {}", other)),
        }
    }
}

/// Severity tier the provider attaches to a risk factor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Structured risk factor on a match profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    #[serde(default)]
    pub severity: Severity,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub description: String,
}

/// One candidate identity returned by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchProfile {
    /// Normalized to 0-1
    pub confidence: f64,
    pub risk_factors: Vec<RiskFactor>,
    /// Biographical and contextual fields, passed through unvalidated
    pub details: Map<String, Value>,
}

/// Provider payload kept verbatim for storage and re-classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawProviderResponse(pub Value);

impl RawProviderResponse {
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for RawProviderResponse {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Stored outcome of a live screening
///
/// Entries are append-only: a newer entry for the same fingerprint
/// supersedes an older one, nothing is updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub id: uuid::Uuid,
    pub fingerprint: String,
    pub person_id: String,
    pub tenant_id: String,
    pub raw_response: RawProviderResponse,
    pub request_id: Option<String>,
    pub match_count: u32,
    pub highest_confidence: f64,
    pub risk_level: RiskLevel,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Why a result was degraded instead of computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedReason {
    Authentication,
    Provider,
    MalformedResponse,
}

impl fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DegradedReason::Authentication => "authentication",
            DegradedReason::Provider => "provider",
            DegradedReason::MalformedResponse => "malformed_response",
        };
        f.write_str(label)
    }
}

/// Narrative analysis returned by the enrichment collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RiskNarrative {
    pub risk_assessment: NarrativeAssessment,
    pub match_analysis: NarrativeMatchAnalysis,
    pub miss_analysis: NarrativeMissAnalysis,
    pub actionable_insights: NarrativeInsights,
    pub contextual_factors: NarrativeContext,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NarrativeAssessment {
    pub overall_risk: Option<RiskLevel>,
    pub confidence: f64,
    pub summary: String,
    pub reasoning: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NarrativeMatchAnalysis {
    pub primary_match: Option<NarrativePrimaryMatch>,
    pub additional_matches: NarrativeAdditionalMatches,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NarrativePrimaryMatch {
    pub significance: String,
    pub concerns: Vec<String>,
    pub positives: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NarrativeAdditionalMatches {
    pub count: u32,
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NarrativeMissAnalysis {
    pub why_not_flagged: Vec<String>,
    pub data_gaps: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NarrativeInsights {
    pub immediate_actions: Vec<String>,
    pub monitoring_recommendations: Vec<String>,
    pub documentation_needed: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NarrativeContext {
    pub time_factors: Vec<String>,
    pub geographic_factors: Vec<String>,
    pub industry_context: Vec<String>,
}

/// Externally visible screening outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningResult {
    pub request_id: String,
    pub match_count: u32,
    pub highest_confidence: f64,
    pub risk_level: RiskLevel,
    pub matches: Vec<MatchProfile>,
    pub cached_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<RiskNarrative>,
    #[serde(default)]
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded_reason: Option<DegradedReason>,
}

impl ScreeningResult {
    /// Prefix carried by the request id of every degraded result
    pub const DEGRADED_PREFIX: &'static str = "degraded-";

    /// Well-formed zero-match result returned in place of a failure
    pub fn degraded(reason: DegradedReason, now: DateTime<Utc>) -> Self {
        Self {
            request_id: format!("{}{}", Self::DEGRADED_PREFIX, uuid::Uuid::new_v4()),
            match_count: 0,
            highest_confidence: 0.0,
            risk_level: RiskLevel::Low,
            matches: Vec::new(),
            cached_at: now,
            enrichment: None,
            degraded: true,
            degraded_reason: Some(reason),
        }
    }
}
