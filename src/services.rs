//! Clients for the five upstream open-data sources.
//!
//! Each client wraps one lookup and returns `Ok(None)` when the source has
//! no data for the address. Transport, HTTP and parse failures surface as
//! `AppError::ExternalApiError`; the analysis workflow decides whether to
//! absorb them. Base URLs come from `Config` so tests can point every client
//! at a mock server.

use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::models::*;
use crate::normalize;
use reqwest::Client;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// BAN-style geocoding client: free-text address to normalized record.
pub struct GeocodingService {
    client: Client,
    base_url: String,
    default_city: String,
}

impl GeocodingService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.geocoding_base_url.clone(),
            default_city: config.default_city.clone(),
        }
    }

    /// Resolves a free-text address to its best match. `Ok(None)` when the
    /// geocoder knows nothing about it.
    pub async fn search(&self, query: &str) -> Result<Option<AddressRecord>, AppError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/search/", self.base_url),
            &[("q", query), ("limit", "1")],
        )
        .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))?;

        tracing::info!("Geocoding address: {}", query);

        let response = self
            .client
            .get(url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .context("Geocoding request failed")?;

        if !response.status().is_success() {
            return Err(AppError::ExternalApiError(format!(
                "Geocoding service returned status {}",
                response.status()
            )));
        }

        let result: GeocodeResponse = response
            .json()
            .await
            .context("Failed to parse geocoding response")?;

        let Some(feature) = result.features.into_iter().next() else {
            tracing::warn!("No geocoding match for: {}", query);
            return Ok(None);
        };

        // GeoJSON coordinates come as [lon, lat].
        let (longitude, latitude) = match feature.geometry.coordinates.as_slice() {
            [lon, lat, ..] => (*lon, *lat),
            _ => {
                return Err(AppError::ExternalApiError(
                    "Geocoder returned malformed coordinates".to_string(),
                ))
            }
        };

        let props = feature.properties;
        tracing::debug!(
            "Geocoded '{}' -> '{}' ({}, {})",
            query,
            props.label,
            latitude,
            longitude
        );

        Ok(Some(AddressRecord {
            label: props.label,
            city: props.city.unwrap_or_else(|| self.default_city.clone()),
            postcode: props.postcode,
            house_number: props.house_number,
            street: props.street,
            latitude,
            longitude,
        }))
    }
}

/// DVF-style transaction-history client: coordinates to nearby sale records.
pub struct TransactionService {
    client: Client,
    base_url: String,
}

impl TransactionService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.transaction_base_url.clone(),
        }
    }

    /// Returns the most recent sale near the point, if any. The upstream
    /// orders features most-recent-first, so the first one wins.
    pub async fn most_recent(
        &self,
        latitude: f64,
        longitude: f64,
        radius_m: u32,
    ) -> Result<Option<TransactionRecord>, AppError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/dvf", self.base_url),
            &[
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("dist", radius_m.to_string()),
            ],
        )
        .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))?;

        tracing::info!(
            "Searching transactions at {}, {} (radius: {}m)",
            latitude,
            longitude,
            radius_m
        );

        let response = self
            .client
            .get(url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalApiError(format!("Transaction request failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(AppError::ExternalApiError(format!(
                "Transaction service returned status {}",
                response.status()
            )));
        }

        let result: TransactionResponse = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse transaction response: {}", e))
        })?;

        tracing::debug!("Found {} transaction(s)", result.features.len());

        Ok(result
            .features
            .into_iter()
            .next()
            .map(|f| f.properties.into()))
    }
}

/// Energy-diagnostic (DPE) client: address to energy-performance rating.
pub struct EnergyService {
    client: Client,
    base_url: String,
}

impl EnergyService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.diagnostic_base_url.clone(),
        }
    }

    /// Full-text search over the diagnostics dataset; first line wins.
    /// Lines without an energy class are treated as no data.
    pub async fn lookup(&self, address: &str) -> Result<Option<EnergyDiagnostic>, AppError> {
        let url = reqwest::Url::parse_with_params(
            &format!(
                "{}/data-fair/api/v1/datasets/dpe03existant/lines",
                self.base_url
            ),
            &[
                ("q", address),
                ("size", "1"),
                (
                    "select",
                    "etiquette_dpe,conso_5_usages_par_m2_ep,etiquette_ges",
                ),
            ],
        )
        .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))?;

        tracing::info!("Fetching energy diagnostic for: {}", address);

        let response = self
            .client
            .get(url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Diagnostic request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalApiError(format!(
                "Diagnostic service returned status {}",
                response.status()
            )));
        }

        let result: DiagnosticResponse = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse diagnostic response: {}", e))
        })?;

        let Some(line) = result.results.into_iter().next() else {
            return Ok(None);
        };

        let Some(energy_class) = line.energy_class.filter(|c| !c.is_empty()) else {
            tracing::warn!("Diagnostic line without an energy class for: {}", address);
            return Ok(None);
        };

        Ok(Some(EnergyDiagnostic::from_class(
            energy_class,
            line.ges_class,
            line.consumption_kwh_m2,
        )))
    }
}

/// Annual-consumption client: city + street to metered electricity figures.
pub struct ConsumptionService {
    client: Client,
    base_url: String,
}

impl ConsumptionService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.consumption_base_url.clone(),
        }
    }

    /// Matches the address against the consumption dataset's upper-cased,
    /// accent-free syntax. First record wins.
    pub async fn lookup(
        &self,
        city: &str,
        house_number: Option<&str>,
        street: Option<&str>,
    ) -> Result<Option<ConsumptionRecord>, AppError> {
        let address = normalize::consumption_query_address(house_number, street);
        if address.is_empty() {
            tracing::warn!("No street component to match consumption data on");
            return Ok(None);
        }

        let where_clause = format!(
            r#"nom_commune="{}" AND adresse LIKE "{}""#,
            city.to_uppercase(),
            address
        );

        let url = reqwest::Url::parse_with_params(
            &format!(
                "{}/api/explore/v2.1/catalog/datasets/consommation-annuelle-residentielle-par-adresse/records",
                self.base_url
            ),
            &[("where", where_clause.as_str()), ("limit", "5")],
        )
        .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))?;

        tracing::info!("Fetching consumption for '{}' in {}", address, city);

        let response = self
            .client
            .get(url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalApiError(format!("Consumption request failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(AppError::ExternalApiError(format!(
                "Consumption service returned status {}",
                response.status()
            )));
        }

        let result: ConsumptionResponse = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse consumption response: {}", e))
        })?;

        Ok(result.results.into_iter().next().map(|r| r.into()))
    }
}

/// Corporate-registry client: normalized address to owner entity.
pub struct RegistryService {
    client: Client,
    base_url: String,
}

impl RegistryService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.registry_base_url.clone(),
        }
    }

    /// Searches companies registered at the address. Prefers a real-estate
    /// holding (name contains "SCI", or legal-nature code starting with
    /// "65") among the candidates, else takes the first. No match falls back
    /// to the individual placeholder, so the owner record is never absent.
    pub async fn find_owner(&self, normalized_address: &str) -> Result<OwnerRecord, AppError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/search", self.base_url),
            &[("q", normalized_address), ("limit", "5")],
        )
        .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))?;

        tracing::info!("Searching registry for owner at: {}", normalized_address);

        let response = self
            .client
            .get(url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Registry request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalApiError(format!(
                "Registry service returned status {}",
                response.status()
            )));
        }

        let result: RegistrySearchResponse = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse registry response: {}", e))
        })?;

        if result.results.is_empty() {
            tracing::debug!("No company at this address, assuming individual owner");
            return Ok(OwnerRecord::unknown_individual());
        }

        let mut candidates = result.results;
        let holding = candidates
            .iter()
            .position(|r| {
                r.full_name.as_deref().is_some_and(|n| n.contains("SCI"))
                    || r.legal_nature.as_deref().is_some_and(|n| n.starts_with("65"))
            })
            .unwrap_or(0);
        let company = candidates.swap_remove(holding);

        let status = company.administrative_state.as_deref().map(|s| {
            if s == "A" {
                OwnerStatus::Active
            } else {
                OwnerStatus::Inactive
            }
        });

        Ok(OwnerRecord {
            kind: OwnerKind::Company,
            name: company
                .full_name
                .unwrap_or_else(|| "Unnamed company".to_string()),
            registry_id: company.siren,
            activity_code: company.activity_code,
            status,
        })
    }
}
