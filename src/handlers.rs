use crate::analysis;
use crate::config::Config;
use crate::errors::AppError;
use crate::models::{AddressRecord, AnalyzeRequest, PropertyReport};
use crate::scoring::ScoringPolicy;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use moka::future::Cache;
use serde_json::json;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Finished reports keyed by their deterministic report id.
    pub report_cache: Cache<String, PropertyReport>,
    /// Lower-cased query string -> report id, so repeated searches for the
    /// same text skip the whole workflow.
    pub query_cache: Cache<String, String>,
    /// Geocoding results keyed by lower-cased query. `None` means the
    /// geocoder was asked and had no match (negative caching).
    pub geocode_cache: Cache<String, Option<AddressRecord>>,
}

/// Health check endpoint.
///
/// Returns the service status, version, and health information.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "vacancy-radar",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /api/v1/analyze
///
/// Runs the full cross-referencing workflow for one free-text address and
/// returns the property report with its vacancy score and insights.
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<PropertyReport>, AppError> {
    tracing::info!("POST /analyze - address: {:?}", request.address);

    let report = analysis::analyze_address(&state, &request.address).await?;

    tracing::info!(
        "Analysis complete for '{}': score {}",
        report.address.label,
        report.vacancy_score
    );

    Ok(Json(report))
}

/// GET /api/v1/reports/:id
///
/// Replays a previously computed report by its deterministic id. Reports
/// live in an in-memory cache only, so an expired or unknown id is a 404;
/// callers re-analyze the address in that case.
pub async fn get_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PropertyReport>, AppError> {
    tracing::info!("GET /reports/{}", id);

    let report = state
        .report_cache
        .get(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Report {} not found or expired", id)))?;

    Ok(Json(report))
}

/// GET /api/v1/policy
///
/// Exposes the active scoring weights and thresholds so the policy behind
/// the scores stays auditable.
pub async fn get_policy(State(state): State<Arc<AppState>>) -> Json<ScoringPolicy> {
    Json(state.config.policy.clone())
}
