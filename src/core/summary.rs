use serde::{Deserialize, Serialize};

use crate::models::{RiskLevel, ScreeningResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreeningStatus {
    Clear,
    Attention,
    Flagged,
}

/// Display status and one-line summary for a screening result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub status: ScreeningStatus,
    pub summary: String,
}

impl StatusSummary {
    pub fn from_result(result: &ScreeningResult) -> Self {
        if result.match_count == 0 {
            return Self {
                status: ScreeningStatus::Clear,
                summary: "No matches found".to_string(),
            };
        }

        let count = result.match_count;
        let percent = (result.highest_confidence * 100.0).round() as u32;

        match result.risk_level {
            RiskLevel::Critical => Self {
                status: ScreeningStatus::Flagged,
                summary: format!("{} high-risk matches ({}% confidence)", count, percent),
            },
            RiskLevel::High => Self {
                status: ScreeningStatus::Flagged,
                summary: format!("{} matches ({}% confidence)", count, percent),
            },
            RiskLevel::Medium => Self {
                status: ScreeningStatus::Attention,
                summary: format!("{} potential matches ({}% confidence)", count, percent),
            },
            RiskLevel::Low => Self {
                status: ScreeningStatus::Clear,
                summary: format!("{} low-confidence matches", count),
            },
        }
    }
}
