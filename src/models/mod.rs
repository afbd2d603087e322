// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    CacheEntry, DegradedReason, Fingerprint, FingerprintStrength, MatchProfile, RawProviderResponse,
    RiskFactor, RiskLevel, RiskNarrative, ScreeningQuery, ScreeningResult, Severity,
};
pub use requests::{validation_summary, ScreenRequest};
pub use responses::{ErrorResponse, HealthResponse, ScreenResponse};
