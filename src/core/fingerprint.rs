use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::models::{Fingerprint, FingerprintStrength, ScreeningQuery};

/// Marker bound into fingerprints that carry no secondary discriminator
const NAME_ONLY_MARKER: &str = "name-only";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("name must not be empty")]
    EmptyName,
}

/// Compute the cache fingerprint for a query
///
/// The normalized name is combined with the first available discriminator:
/// email, then date of birth, then an explicit name-only marker. Matching is
/// exact on the normalized material; spelling variants of a name produce
/// different fingerprints.
pub fn normalize(query: &ScreeningQuery) -> Result<Fingerprint, QueryError> {
    let name = normalize_name(&query.name);
    if name.is_empty() {
        return Err(QueryError::EmptyName);
    }

    let email = query
        .email
        .as_deref()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty());

    let (material, strength) = match (email, query.date_of_birth) {
        (Some(email), _) => (format!("{}|email:{}", name, email), FingerprintStrength::Email),
        (None, Some(dob)) => (
            format!("{}|dob:{}", name, dob.format("%Y-%m-%d")),
            FingerprintStrength::DateOfBirth,
        ),
        (None, None) => (
            format!("{}|{}", name, NAME_ONLY_MARKER),
            FingerprintStrength::NameOnly,
        ),
    };

    let key = format!("{:x}", Sha256::digest(material.as_bytes()));

    Ok(Fingerprint { key, strength })
}

/// Lowercased, trimmed name with internal whitespace collapsed
pub fn normalize_name(name: &str) -> String {
    display_name(name).to_lowercase()
}

/// Trimmed name with internal whitespace collapsed, case preserved
pub fn display_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}
