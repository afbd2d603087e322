// HTTP-level tests for the narrative analysis client

use atlas_screening::models::{RawProviderResponse, RiskLevel, ScreeningQuery};
use atlas_screening::services::{AnalysisClient, AnalysisRequest, Enricher, EnrichmentError};
use mockito::{Matcher, Server};
use serde_json::json;
use std::time::Duration;

fn request() -> AnalysisRequest {
    AnalysisRequest::new(
        &ScreeningQuery::new("Ryan Scott"),
        &RawProviderResponse(json!({ "results": {} })),
        Some("cruise passenger".to_string()),
    )
}

#[tokio::test]
async fn test_narrative_is_returned() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("POST", "/analyze")
        .match_body(Matcher::PartialJson(json!({
            "personData": { "name": "Ryan Scott", "context": "cruise passenger" }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "analysis": {
                    "riskAssessment": { "overallRisk": "CRITICAL", "confidence": 92, "summary": "Escalate" },
                    "actionableInsights": { "immediateActions": ["Hold boarding"] }
                }
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let client = AnalysisClient::new(format!("{}/analyze", server.url()), Duration::from_secs(5)).unwrap();
    let narrative = client.analyze(&request()).await.unwrap();

    assert_eq!(narrative.risk_assessment.overall_risk, Some(RiskLevel::Critical));
    assert_eq!(narrative.actionable_insights.immediate_actions, vec!["Hold boarding".to_string()]);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_error_status_is_api_error() {
    let mut server = Server::new_async().await;

    server
        .mock("POST", "/analyze")
        .with_status(503)
        .with_body("model overloaded")
        .create_async()
        .await;

    let client = AnalysisClient::new(format!("{}/analyze", server.url()), Duration::from_secs(5)).unwrap();
    let err = client.analyze(&request()).await.unwrap_err();

    assert!(matches!(err, EnrichmentError::ApiError { status: 503, .. }));
}

#[tokio::test]
async fn test_missing_envelope_is_invalid_response() {
    let mut server = Server::new_async().await;

    server
        .mock("POST", "/analyze")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "result": "ok" }).to_string())
        .create_async()
        .await;

    let client = AnalysisClient::new(format!("{}/analyze", server.url()), Duration::from_secs(5)).unwrap();
    let err = client.analyze(&request()).await.unwrap_err();

    assert!(matches!(err, EnrichmentError::InvalidResponse(_)));
}
