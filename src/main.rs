mod analysis;
mod config;
mod errors;
mod handlers;
mod models;
mod normalize;
mod scoring;
mod services;

use axum::{
    routing::{get, post},
    Router,
};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Main entry point for the application.
///
/// Initializes logging, configuration and the in-memory caches, wires up
/// the HTTP routes and middleware (CORS, rate limiting, body size limit),
/// then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vacancy_radar=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Finished reports, keyed by deterministic report id (1 hour TTL).
    // Upstream datasets change slowly, so re-analyzing within the hour
    // would only repeat the same five lookups.
    let report_cache = Cache::builder()
        .time_to_live(Duration::from_secs(3600))
        .max_capacity(10_000)
        .build();
    tracing::info!("Report cache initialized (1h TTL, 10k capacity)");

    // Query string -> report id alias cache, same lifetime as the reports.
    let query_cache = Cache::builder()
        .time_to_live(Duration::from_secs(3600))
        .max_capacity(10_000)
        .build();

    // Geocoding results (24 hour TTL). Address normalization is stable,
    // and negative results are cached too.
    let geocode_cache = Cache::builder()
        .time_to_live(Duration::from_secs(86400))
        .max_capacity(50_000)
        .build();
    tracing::info!("Geocode cache initialized (24h TTL, 50k capacity)");

    // Build application state
    let app_state = Arc::new(handlers::AppState {
        config: config.clone(),
        report_cache,
        query_cache,
        geocode_cache,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .unwrap(),
    );

    // Build protected routes with security layers
    let protected_routes = Router::new()
        .route("/api/v1/analyze", post(handlers::analyze))
        .route("/api/v1/reports/:id", get(handlers::get_report))
        .route("/api/v1/policy", get(handlers::get_policy))
        .layer(
            ServiceBuilder::new()
                // Request size limit: analyze payloads are one address line
                .layer(RequestBodyLimitLayer::new(64 * 1024))
                // Rate limiting also protects the upstream open-data APIs
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Build final app with health check (bypasses rate limiting)
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
