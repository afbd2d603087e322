use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{MatchProfile, RawProviderResponse, RiskFactor, RiskLevel};

/// Check type requested from the provider unless configured otherwise
pub const DEFAULT_CHECK_TYPE: &str = "atlascompass_v3";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("Malformed provider payload: {0}")]
    Malformed(String),
}

/// Top level of a risk-check response
#[derive(Debug, Deserialize)]
struct RiskCheckPayload {
    results: Map<String, Value>,
}

/// Result block for a single check type
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckResult {
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    profiles: Vec<ProviderProfile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderProfile {
    /// 0-100 scale
    #[serde(default)]
    match_confidence: Option<f64>,
    #[serde(default)]
    risk_assessment: Option<ProviderRiskAssessment>,
    #[serde(flatten)]
    details: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderRiskAssessment {
    #[serde(default)]
    risk_factors: Vec<RiskFactor>,
}

/// What the provider said about the requested check type
#[derive(Debug)]
enum CheckOutcome {
    /// The check type key is missing: no data for this check
    Absent,
    Present(CheckResult),
}

/// Canonical match data extracted from a provider response
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub request_id: Option<String>,
    pub match_count: u32,
    pub highest_confidence: f64,
    pub risk_level: RiskLevel,
    pub matches: Vec<MatchProfile>,
}

impl Classification {
    fn empty(request_id: Option<String>) -> Self {
        Self {
            request_id,
            match_count: 0,
            highest_confidence: 0.0,
            risk_level: RiskLevel::Low,
            matches: Vec::new(),
        }
    }
}

/// Converts raw provider payloads into match data and a risk tier
#[derive(Debug, Clone)]
pub struct ResponseClassifier {
    check_type: String,
}

impl ResponseClassifier {
    pub fn new(check_type: impl Into<String>) -> Self {
        Self {
            check_type: check_type.into(),
        }
    }

    pub fn check_type(&self) -> &str {
        &self.check_type
    }

    /// Classify a raw provider response
    ///
    /// Pure over the payload: the same input always yields the same
    /// classification, with profiles kept in provider order.
    pub fn classify(&self, raw: &RawProviderResponse) -> Result<Classification, ClassifyError> {
        let check = match self.extract(raw)? {
            CheckOutcome::Absent => return Ok(Classification::empty(None)),
            CheckOutcome::Present(check) => check,
        };

        let matches: Vec<MatchProfile> = check
            .profiles
            .into_iter()
            .map(|profile| MatchProfile {
                confidence: normalize_confidence(profile.match_confidence.unwrap_or(0.0)),
                risk_factors: profile
                    .risk_assessment
                    .map(|assessment| assessment.risk_factors)
                    .unwrap_or_default(),
                details: profile.details,
            })
            .collect();

        let highest_confidence = matches
            .iter()
            .map(|m| m.confidence)
            .fold(0.0_f64, f64::max);

        Ok(Classification {
            request_id: check.request_id,
            match_count: matches.len() as u32,
            highest_confidence,
            risk_level: RiskLevel::from_confidence(highest_confidence),
            matches,
        })
    }

    fn extract(&self, raw: &RawProviderResponse) -> Result<CheckOutcome, ClassifyError> {
        let payload = RiskCheckPayload::deserialize(raw.as_value())
            .map_err(|e| ClassifyError::Malformed(format!("invalid response envelope: {}", e)))?;

        match payload.results.get(&self.check_type) {
            None => Ok(CheckOutcome::Absent),
            Some(block) => CheckResult::deserialize(block)
                .map(CheckOutcome::Present)
                .map_err(|e| {
                    ClassifyError::Malformed(format!(
                        "invalid {} result block: {}",
                        self.check_type, e
                    ))
                }),
        }
    }
}

impl Default for ResponseClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_CHECK_TYPE)
    }
}

/// Provider scores are 0-100; anything outside maps onto the 0-1 bounds
#[inline]
fn normalize_confidence(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    (score / 100.0).clamp(0.0, 1.0)
}
