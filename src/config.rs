use crate::scoring::ScoringPolicy;
use serde::Deserialize;

/// Runtime configuration, loaded from the environment.
///
/// All five upstream base URLs default to the public endpoints but stay
/// overridable so tests can point the clients at a mock server.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// BAN-style geocoding endpoint.
    pub geocoding_base_url: String,
    /// DVF-style transaction-history endpoint.
    pub transaction_base_url: String,
    /// Energy-diagnostic (DPE) dataset endpoint.
    pub diagnostic_base_url: String,
    /// Annual-consumption dataset endpoint.
    pub consumption_base_url: String,
    /// Corporate-registry search endpoint.
    pub registry_base_url: String,
    /// City used when the geocoder does not report one.
    pub default_city: String,
    /// Search radius in meters for the transaction lookup.
    pub transaction_radius_m: u32,
    /// Scoring weights and thresholds.
    pub policy: ScoringPolicy,
}

fn env_url(name: &str, default: &str) -> anyhow::Result<String> {
    let url = std::env::var(name).unwrap_or_else(|_| default.to_string());
    let url = url.trim();
    if url.is_empty() {
        anyhow::bail!("{} cannot be empty", name);
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(url.trim_end_matches('/').to_string())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            geocoding_base_url: env_url("GEOCODING_BASE_URL", "https://api-adresse.data.gouv.fr")?,
            transaction_base_url: env_url("TRANSACTION_BASE_URL", "https://api.cquest.org")?,
            diagnostic_base_url: env_url("DIAGNOSTIC_BASE_URL", "https://data.ademe.fr")?,
            consumption_base_url: env_url("CONSUMPTION_BASE_URL", "https://data.enedis.fr")?,
            registry_base_url: env_url(
                "REGISTRY_BASE_URL",
                "https://recherche-entreprises.api.gouv.fr",
            )?,
            default_city: std::env::var("DEFAULT_CITY")
                .unwrap_or_else(|_| "Paris".to_string())
                .trim()
                .to_string(),
            transaction_radius_m: std::env::var("TRANSACTION_RADIUS_M")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("TRANSACTION_RADIUS_M must be a valid number"))?,
            policy: ScoringPolicy::from_env()?,
        };

        if config.default_city.is_empty() {
            anyhow::bail!("DEFAULT_CITY cannot be empty");
        }

        // Log successful configuration load
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Geocoding base URL: {}", config.geocoding_base_url);
        tracing::debug!("Transaction base URL: {}", config.transaction_base_url);
        tracing::debug!("Diagnostic base URL: {}", config.diagnostic_base_url);
        tracing::debug!("Consumption base URL: {}", config.consumption_base_url);
        tracing::debug!("Registry base URL: {}", config.registry_base_url);
        tracing::debug!("Server port: {}", config.port);

        Ok(config)
    }

    /// Configuration pointing every upstream client at the given base URL.
    /// Used by the mocked integration tests.
    pub fn for_tests(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        Self {
            port: 3000,
            geocoding_base_url: base.clone(),
            transaction_base_url: base.clone(),
            diagnostic_base_url: base.clone(),
            consumption_base_url: base.clone(),
            registry_base_url: base,
            default_city: "Paris".to_string(),
            transaction_radius_m: 50,
            policy: ScoringPolicy::default(),
        }
    }
}
