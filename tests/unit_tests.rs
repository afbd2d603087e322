// Unit tests for Atlas Screening

use atlas_screening::core::{normalize, QueryError, ResponseClassifier, ScreeningStatus, StatusSummary};
use atlas_screening::models::{
    DegradedReason, FingerprintStrength, RawProviderResponse, RiskLevel, ScreeningQuery,
    ScreeningResult, Severity,
};
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};

fn dob(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn atlas_response(profiles: Value) -> RawProviderResponse {
    RawProviderResponse(json!({
        "results": {
            "atlascompass_v3": {
                "requestId": "req-123",
                "profiles": profiles
            }
        }
    }))
}

#[test]
fn test_fingerprint_ignores_case_and_spacing() {
    let a = normalize(&ScreeningQuery::new("Ryan  Scott").with_date_of_birth(dob(1969, 9, 3))).unwrap();
    let b = normalize(&ScreeningQuery::new("  ryan scott ").with_date_of_birth(dob(1969, 9, 3))).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.strength, FingerprintStrength::DateOfBirth);
}

#[test]
fn test_fingerprint_email_takes_precedence() {
    let with_both = normalize(
        &ScreeningQuery::new("Ryan Scott")
            .with_email("Ryan@Example.com")
            .with_date_of_birth(dob(1969, 9, 3)),
    )
    .unwrap();
    let email_only = normalize(&ScreeningQuery::new("Ryan Scott").with_email("ryan@example.com")).unwrap();

    assert_eq!(with_both.key, email_only.key);
    assert_eq!(with_both.strength, FingerprintStrength::Email);
}

#[test]
fn test_fingerprint_discriminators_separate_people() {
    let one = normalize(&ScreeningQuery::new("Ryan Scott").with_date_of_birth(dob(1969, 9, 3))).unwrap();
    let two = normalize(&ScreeningQuery::new("Ryan Scott").with_date_of_birth(dob(1971, 2, 14))).unwrap();
    let bare = normalize(&ScreeningQuery::new("Ryan Scott")).unwrap();

    assert_ne!(one.key, two.key);
    assert_ne!(one.key, bare.key);
    assert!(bare.is_name_only());
}

#[test]
fn test_fingerprint_ignores_nationality_and_phone() {
    let plain = normalize(&ScreeningQuery::new("Ryan Scott")).unwrap();
    let mut query = ScreeningQuery::new("Ryan Scott").with_nationality("US");
    query.phone = Some("+1 555 0100".to_string());

    assert_eq!(normalize(&query).unwrap(), plain);
}

#[test]
fn test_fingerprint_rejects_blank_name() {
    assert_eq!(normalize(&ScreeningQuery::new(" \t ")), Err(QueryError::EmptyName));
}

#[test]
fn test_classify_mixed_confidences() {
    let classifier = ResponseClassifier::default();
    let c = classifier
        .classify(&atlas_response(json!([
            { "matchConfidence": 95 },
            { "matchConfidence": 81 },
            { "matchConfidence": 60 }
        ])))
        .unwrap();

    assert_eq!(c.match_count, 3);
    assert!((c.highest_confidence - 0.95).abs() < 1e-9);
    assert_eq!(c.risk_level, RiskLevel::Critical);
    assert_eq!(c.request_id.as_deref(), Some("req-123"));
}

#[test]
fn test_classify_keeps_risk_factors() {
    let classifier = ResponseClassifier::default();
    let c = classifier
        .classify(&atlas_response(json!([{
            "matchConfidence": 74,
            "riskAssessment": {
                "riskFactors": [
                    { "severity": "HIGH", "type": "PEP", "description": "Former minister" },
                    { "type": "ADVERSE_MEDIA", "description": "Press coverage" }
                ]
            }
        }])))
        .unwrap();

    assert_eq!(c.risk_level, RiskLevel::Medium);
    let factors = &c.matches[0].risk_factors;
    assert_eq!(factors.len(), 2);
    assert_eq!(factors[0].severity, Severity::High);
    assert_eq!(factors[1].severity, Severity::Unknown);
}

#[test]
fn test_classify_other_check_types_are_ignored() {
    let classifier = ResponseClassifier::default();
    let raw = RawProviderResponse(json!({
        "results": {
            "legacy_check": { "profiles": [{ "matchConfidence": 99 }] }
        }
    }));

    let c = classifier.classify(&raw).unwrap();
    assert_eq!(c.match_count, 0);
    assert_eq!(c.risk_level, RiskLevel::Low);
}

#[test]
fn test_classify_rejects_missing_results() {
    let classifier = ResponseClassifier::default();
    assert!(classifier.classify(&RawProviderResponse(json!({ "status": "ok" }))).is_err());
    assert!(classifier.classify(&RawProviderResponse(json!("nope"))).is_err());
}

#[test]
fn test_status_summary_for_live_and_degraded() {
    let classifier = ResponseClassifier::default();
    let c = classifier
        .classify(&atlas_response(json!([{ "matchConfidence": 92 }])))
        .unwrap();

    let result = ScreeningResult {
        request_id: "req-123".to_string(),
        match_count: c.match_count,
        highest_confidence: c.highest_confidence,
        risk_level: c.risk_level,
        matches: c.matches,
        cached_at: Utc::now(),
        enrichment: None,
        degraded: false,
        degraded_reason: None,
    };
    assert_eq!(StatusSummary::from_result(&result).status, ScreeningStatus::Flagged);

    let degraded = ScreeningResult::degraded(DegradedReason::Authentication, Utc::now());
    assert_eq!(StatusSummary::from_result(&degraded).status, ScreeningStatus::Clear);
    assert!(degraded.request_id.starts_with(ScreeningResult::DEGRADED_PREFIX));
}
