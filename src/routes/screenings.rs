use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use validator::Validate;

use crate::core::{Screener, ScreeningError, StatusSummary};
use crate::models::{validation_summary, ErrorResponse, HealthResponse, ScreenRequest, ScreenResponse};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub screener: Arc<Screener>,
}

/// Configure all screening routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/screenings", web::post().to(screen_person));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let store_healthy = state.screener.store_healthy().await;

    let status = if store_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Screen a person
///
/// POST /api/v1/screenings
///
/// Request body:
/// ```json
/// {
///   "personId": "string",
///   "tenantId": "string",
///   "name": "string",
///   "email": "string",
///   "dateOfBirth": "YYYY-MM-DD",
///   "bypassCache": false
/// }
/// ```
///
/// Provider outages do not change the status code: the body carries a
/// degraded result instead.
async fn screen_person(
    state: web::Data<AppState>,
    req: web::Json<ScreenRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        let summary = validation_summary(&errors);
        tracing::info!(person_id = %req.person_id, fields = %summary, "Validation failed for screening request");
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: summary,
            status_code: 400,
        });
    }

    let query = req.to_query();

    match state
        .screener
        .screen(&req.person_id, &req.tenant_id, &query, req.bypass_cache)
        .await
    {
        Ok(result) => {
            let status = StatusSummary::from_result(&result);
            HttpResponse::Ok().json(ScreenResponse { result, status })
        }
        Err(ScreeningError::InvalidQuery(e)) => HttpResponse::BadRequest().json(ErrorResponse {
            error: "Invalid query".to_string(),
            message: e.to_string(),
            status_code: 400,
        }),
    }
}
