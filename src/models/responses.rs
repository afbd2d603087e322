use serde::{Deserialize, Serialize};

use crate::core::summary::StatusSummary;
use crate::models::domain::ScreeningResult;

/// Response for the screen endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenResponse {
    pub result: ScreeningResult,
    pub status: StatusSummary,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
