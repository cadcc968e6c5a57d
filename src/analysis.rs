//! Shared analysis workflow for the HTTP handlers.
//!
//! One address in, one report out:
//! 1. Geocode the free-text address (required anchor step)
//! 2. Fetch transaction / diagnostic / consumption / owner data concurrently
//! 3. Collapse adapter failures to absent records
//! 4. Run the scoring engine
//! 5. Cache and return the report

use crate::errors::{AppError, ResultExt};
use crate::handlers::AppState;
use crate::models::{OwnerRecord, PropertyReport, SourceRecords};
use crate::scoring;
use crate::services::{
    ConsumptionService, EnergyService, GeocodingService, RegistryService, TransactionService,
};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Deterministic report identifier: SHA-256 of the normalized address label.
/// The same address always maps to the same id, so report links survive
/// cache expiry and re-analysis.
pub fn report_id_for(label: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(label.trim().to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}

/// Complete analysis workflow for one address.
pub async fn analyze_address(
    state: &Arc<AppState>,
    query: &str,
) -> Result<PropertyReport, AppError> {
    let query = query.trim();
    if query.len() < 4 {
        return Err(AppError::BadRequest(
            "Address query too short to resolve".to_string(),
        ));
    }
    let query_key = query.to_lowercase();

    // Check cache first: a known query maps to a report id, and the report
    // may still be live.
    if let Some(report_id) = state.query_cache.get(&query_key).await {
        if let Some(report) = state.report_cache.get(&report_id).await {
            tracing::debug!("Report cache HIT for '{}'", query);
            return Ok(report);
        }
    }

    tracing::info!("Starting analysis for: {}", query);

    // Step 1: geocode. Everything downstream hangs off this record, so an
    // unresolvable address is a hard stop. Negative results are cached too.
    let address = match state.geocode_cache.get(&query_key).await {
        Some(cached) => cached,
        None => {
            let geocoder = GeocodingService::new(&state.config);
            let resolved = geocoder
                .search(query)
                .await
                .context("Address resolution failed")?;
            state
                .geocode_cache
                .insert(query_key.clone(), resolved.clone())
                .await;
            resolved
        }
    }
    .ok_or_else(|| AppError::NotFound(format!("Address not found: {}", query)))?;

    tracing::info!(
        "Step 1 done: '{}' -> '{}' in {}",
        query,
        address.label,
        address.city
    );

    // Steps 2-5: the four remaining lookups are independent, so issue them
    // concurrently.
    let transactions = TransactionService::new(&state.config);
    let energy_service = EnergyService::new(&state.config);
    let consumption_service = ConsumptionService::new(&state.config);
    let registry = RegistryService::new(&state.config);

    let (transaction_result, energy_result, consumption_result, owner_result) = tokio::join!(
        transactions.most_recent(
            address.latitude,
            address.longitude,
            state.config.transaction_radius_m,
        ),
        energy_service.lookup(query),
        consumption_service.lookup(
            &address.city,
            address.house_number.as_deref(),
            address.street.as_deref(),
        ),
        registry.find_owner(&address.label),
    );

    // Adapter failures are collapsed to absent records before the engine
    // sees them; the engine only knows present or absent.
    let last_transaction = transaction_result.unwrap_or_else(|e| {
        tracing::warn!("Transaction lookup failed, treating as no data: {}", e);
        None
    });
    let energy = energy_result.unwrap_or_else(|e| {
        tracing::warn!("Diagnostic lookup failed, treating as no data: {}", e);
        None
    });
    let consumption = consumption_result.unwrap_or_else(|e| {
        tracing::warn!("Consumption lookup failed, treating as no data: {}", e);
        None
    });
    // The owner record is never absent: lookup errors get the same
    // placeholder as a no-match.
    let owner = owner_result.unwrap_or_else(|e| {
        tracing::warn!("Registry lookup failed, assuming individual owner: {}", e);
        OwnerRecord::unknown_individual()
    });

    // Step 6: score.
    let now = Utc::now();
    let assessment = scoring::assess(
        energy.as_ref(),
        consumption.as_ref(),
        last_transaction.as_ref(),
        &state.config.policy,
        now,
    );

    tracing::info!(
        "Scored '{}': {} point(s), {} insight(s)",
        address.label,
        assessment.score,
        assessment.insights.len()
    );

    let report = PropertyReport {
        report_id: report_id_for(&address.label),
        address,
        vacancy_score: assessment.score,
        insights: assessment.insights,
        theoretical_consumption_mwh: assessment.theoretical_consumption_mwh,
        multi_unit_building: assessment.multi_unit_building,
        sources: SourceRecords {
            last_transaction,
            energy,
            consumption,
            owner,
        },
        analyzed_at: now,
    };

    state
        .report_cache
        .insert(report.report_id.clone(), report.clone())
        .await;
    state
        .query_cache
        .insert(query_key, report.report_id.clone())
        .await;

    Ok(report)
}
