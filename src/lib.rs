//! Atlas Screening - screening cache and lookup coordination service
//!
//! This library decides whether a person lookup needs a live call to the
//! external screening provider or can be served from a previously cached
//! outcome, and classifies provider matches into risk tiers.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{normalize, ResponseClassifier, Screener, ScreeningError, ScreeningPolicy, StatusSummary};
pub use crate::models::{CacheEntry, Fingerprint, MatchProfile, RiskLevel, ScreeningQuery, ScreeningResult};
