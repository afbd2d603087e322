use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use crate::models::domain::ScreeningQuery;

/// Request to screen a person
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ScreenRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "person_id", rename = "personId")]
    pub person_id: String,
    #[validate(length(min = 1))]
    #[serde(alias = "tenant_id", rename = "tenantId")]
    pub tenant_id: String,
    pub name: String,
    #[validate(email)]
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, alias = "date_of_birth", rename = "dateOfBirth")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default, alias = "bypass_cache", rename = "bypassCache")]
    pub bypass_cache: bool,
}

impl ScreenRequest {
    /// Identity fields of the request; blank optional strings count as absent
    pub fn to_query(&self) -> ScreeningQuery {
        ScreeningQuery {
            name: self.name.clone(),
            email: non_blank(&self.email),
            phone: non_blank(&self.phone),
            date_of_birth: self.date_of_birth,
            nationality: non_blank(&self.nationality),
        }
    }
}

/// Failed fields and their rule codes, e.g. `email: email`
///
/// Never includes the rejected values, so the result is safe to log and return.
pub fn validation_summary(errors: &ValidationErrors) -> String {
    let mut failures: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| errs.iter().map(move |e| format!("{}: {}", field, e.code)))
        .collect();
    failures.sort();
    failures.join("; ")
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
