use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::models::{RawProviderResponse, RiskNarrative, ScreeningQuery};

/// Errors that can occur when requesting narrative analysis
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Analysis service returned {status}: {body}")]
    ApiError { status: u16, body: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Analysis did not complete within {0:?}")]
    Timeout(Duration),
}

/// Person fields shared with the analysis service
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonData {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
    /// e.g. "cruise passenger", "crew member", "vendor"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub person_data: PersonData,
    pub atlas_results: RawProviderResponse,
}

impl AnalysisRequest {
    pub fn new(query: &ScreeningQuery, raw: &RawProviderResponse, context: Option<String>) -> Self {
        Self {
            person_data: PersonData {
                name: query.name.trim().to_string(),
                email: query.email.clone(),
                date_of_birth: query.date_of_birth.map(|d| d.format("%Y-%m-%d").to_string()),
                nationality: query.nationality.clone(),
                context,
            },
            atlas_results: raw.clone(),
        }
    }
}

/// Optional narrative enrichment of provider results
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<RiskNarrative, EnrichmentError>;
}

#[derive(Debug, Deserialize)]
struct AnalysisEnvelope {
    analysis: RiskNarrative,
}

/// HTTP client for the narrative analysis service
pub struct AnalysisClient {
    endpoint: String,
    client: Client,
}

impl AnalysisClient {
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self, EnrichmentError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { endpoint, client })
    }
}

#[async_trait]
impl Enricher for AnalysisClient {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<RiskNarrative, EnrichmentError> {
        let response = self.client.post(&self.endpoint).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unable to read body".to_string());
            return Err(EnrichmentError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: AnalysisEnvelope = response
            .json()
            .await
            .map_err(|e| EnrichmentError::InvalidResponse(e.to_string()))?;

        tracing::debug!("Received narrative analysis from {}", self.endpoint);

        Ok(envelope.analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_request_shape() {
        let query = ScreeningQuery::new(" Ryan Scott ")
            .with_date_of_birth(NaiveDate::from_ymd_opt(1969, 9, 3).unwrap());
        let raw = RawProviderResponse(serde_json::json!({ "results": {} }));

        let body = serde_json::to_value(AnalysisRequest::new(
            &query,
            &raw,
            Some("cruise passenger".to_string()),
        ))
        .unwrap();

        assert_eq!(body["personData"]["name"], "Ryan Scott");
        assert_eq!(body["personData"]["dateOfBirth"], "1969-09-03");
        assert_eq!(body["personData"]["context"], "cruise passenger");
        assert!(body["personData"].get("email").is_none());
        assert_eq!(body["atlasResults"], serde_json::json!({ "results": {} }));
    }

    #[test]
    fn test_partial_narrative_parses() {
        let envelope: AnalysisEnvelope = serde_json::from_value(serde_json::json!({
            "analysis": {
                "riskAssessment": { "overallRisk": "high", "confidence": 85, "summary": "Review" }
            }
        }))
        .unwrap();

        assert_eq!(envelope.analysis.risk_assessment.summary, "Review");
        assert_eq!(
            envelope.analysis.risk_assessment.overall_risk,
            Some(crate::models::RiskLevel::High)
        );
        assert!(envelope.analysis.miss_analysis.data_gaps.is_empty());
    }
}
