use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

use crate::core::{MatchError, MatchingEngine};
use crate::models::{
    ErrorResponse, FindMatchesRequest, FindMatchesResponse, HealthResponse, MatchSummary,
    SaveMatchRequest, SaveMatchResponse,
};
use crate::services::ProfileStore;

/// Engine over whichever store the process was configured with
pub type SharedEngine = Arc<MatchingEngine<Arc<dyn ProfileStore>>>;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: SharedEngine,
    pub request_timeout: Duration,
}

/// Configure all match-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/matches/find", web::post().to(find_matches))
        .route("/matches/save", web::post().to(save_match));
}

fn error_body(status_code: u16, error: &str, message: String) -> ErrorResponse {
    ErrorResponse {
        error: error.to_string(),
        message,
        status_code,
    }
}

/// Map an engine error onto its HTTP status
fn match_error_response(err: &MatchError) -> HttpResponse {
    match err {
        MatchError::InvalidFilter(msg) => {
            HttpResponse::BadRequest().json(error_body(400, "Invalid filter", msg.clone()))
        }
        MatchError::ProfileNotFound(id) => HttpResponse::NotFound().json(error_body(
            404,
            "Profile not found",
            format!("No profile for user {}", id),
        )),
        MatchError::DependencyUnavailable(e) => {
            tracing::error!("Profile store unavailable: {}", e);
            HttpResponse::ServiceUnavailable().json(error_body(
                503,
                "Dependency unavailable",
                e.to_string(),
            ))
        }
        MatchError::Ranking(e) => {
            tracing::error!("Ranking task failed: {}", e);
            HttpResponse::InternalServerError().json(error_body(
                500,
                "Internal error",
                "Ranking failed".to_string(),
            ))
        }
    }
}

fn timeout_response(timeout: Duration) -> HttpResponse {
    HttpResponse::GatewayTimeout().json(error_body(
        504,
        "Request timed out",
        format!("Ranking did not finish within {} ms", timeout.as_millis()),
    ))
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let healthy = state.engine.store().health_check().await.unwrap_or(false);

    let status = if healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Find matches endpoint
///
/// POST /api/v1/matches/find
///
/// Request body:
/// ```json
/// {
///   "userId": "string",
///   "limit": 20,
///   "maxDistanceKm": 25.0,
///   "onlineOnly": false,
///   "newUsersOnly": false,
///   "save": false
/// }
/// ```
async fn find_matches(state: web::Data<AppState>, req: web::Json<FindMatchesRequest>) -> impl Responder {
    // Validate request
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for find_matches request: {:?}", errors);
        return HttpResponse::BadRequest().json(error_body(
            400,
            "Validation failed",
            errors.to_string(),
        ));
    }

    let user_id = &req.user_id;
    let filters = req.filters();
    // Negative limits become zero and are rejected by the engine
    let limit = req.limit.map(|l| usize::try_from(l).unwrap_or(0));

    tracing::info!("Finding matches for user: {}, limit: {:?}", user_id, limit);

    let ranked = tokio::time::timeout(
        state.request_timeout,
        state.engine.rank(user_id, &filters, limit),
    )
    .await;

    let result = match ranked {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => return match_error_response(&e),
        Err(_) => {
            tracing::warn!("Ranking timed out for {}", user_id);
            return timeout_response(state.request_timeout);
        }
    };

    if req.save {
        let saved = state.engine.save_top_matches(user_id, &result.matches).await;
        tracing::debug!("Saved {} of {} matches for {}", saved, result.matches.len(), user_id);
    }

    let response = FindMatchesResponse {
        matches: result
            .matches
            .iter()
            .map(|m| MatchSummary::new(m, state.engine.weights()))
            .collect(),
        total_results: result.matches.len(),
        total_candidates: result.total_candidates,
    };

    tracing::info!(
        "Returning {} matches for user {} (from {} candidates)",
        response.total_results,
        user_id,
        response.total_candidates
    );

    HttpResponse::Ok().json(response)
}

/// Save match endpoint
///
/// POST /api/v1/matches/save
///
/// Request body:
/// ```json
/// {
///   "userId": "string",
///   "targetUserId": "string",
///   "score": 72.5
/// }
/// ```
async fn save_match(state: web::Data<AppState>, req: web::Json<SaveMatchRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return HttpResponse::BadRequest().json(error_body(
            400,
            "Validation failed",
            errors.to_string(),
        ));
    }

    match state
        .engine
        .save_match(&req.user_id, &req.target_user_id, req.score)
        .await
    {
        Ok(()) => {
            tracing::debug!("Saved match {} -> {}", req.user_id, req.target_user_id);
            HttpResponse::Ok().json(SaveMatchResponse { success: true })
        }
        Err(e) => match_error_response(&e),
    }
}
