use std::time::Instant;

use actix_web::{web, HttpResponse, Responder};
use serde_json::json;
use tracing::{error, warn};

use crate::app_state::AppState;
use crate::error::{AppError, Result};
use crate::models::MatchRequest;

/// POST /match: rank the candidate pool for one requester.
///
/// Latency is observed for every outcome and every error increments the
/// typed error counter before it propagates into the HTTP error body.
pub async fn match_drivers(
    state: web::Data<AppState>,
    request: web::Json<MatchRequest>,
) -> Result<HttpResponse> {
    let started = Instant::now();

    let result = match state.matching.as_ref() {
        Some(matching) => matching.rank(&request).await,
        None => Err(AppError::InitializationError(
            "Service started without a model; matching is unavailable".to_string(),
        )),
    };
    state
        .metrics
        .request_latency
        .observe(started.elapsed().as_secs_f64());

    match result {
        Ok(response) => Ok(HttpResponse::Ok().json(response)),
        Err(e) => {
            state.metrics.record_error(e.kind());
            match &e {
                AppError::InvalidRequest(_) => warn!(error = %e, "Rejected match request"),
                _ => error!(error = %e, kind = e.kind(), "Match request failed"),
            }
            Err(e)
        }
    }
}

pub async fn metrics_handler(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(state.metrics.gather())
}

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "match-api"
    }))
}

pub async fn ready(state: web::Data<AppState>) -> impl Responder {
    if state.matching.is_some() {
        HttpResponse::Ok().json(json!({ "status": "ready" }))
    } else {
        HttpResponse::ServiceUnavailable().json(json!({
            "status": "degraded",
            "reason": "model not loaded"
        }))
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/match", web::post().to(match_drivers))
        .route("/metrics", web::get().to(metrics_handler))
        .route("/health", web::get().to(health))
        .route("/ready", web::get().to(ready));
}
