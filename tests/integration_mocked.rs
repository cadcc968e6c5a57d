/// Integration tests with mocked external APIs
/// Tests the five data-source clients and the complete analysis workflow
/// without hitting the real open-data services.
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use vacancy_radar::analysis::analyze_address;
use vacancy_radar::config::Config;
use vacancy_radar::handlers::AppState;
use vacancy_radar::models::{OwnerKind, OwnerStatus};
use vacancy_radar::services::{
    ConsumptionService, EnergyService, GeocodingService, RegistryService, TransactionService,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to build application state pointing every client at a mock server
fn test_state(base_url: &str) -> Arc<AppState> {
    Arc::new(AppState {
        config: Config::for_tests(base_url),
        report_cache: Cache::builder()
            .time_to_live(Duration::from_secs(60))
            .max_capacity(100)
            .build(),
        query_cache: Cache::builder()
            .time_to_live(Duration::from_secs(60))
            .max_capacity(100)
            .build(),
        geocode_cache: Cache::builder()
            .time_to_live(Duration::from_secs(60))
            .max_capacity(100)
            .build(),
    })
}

fn geocode_body(label: &str, city: &str) -> serde_json::Value {
    serde_json::json!({
        "features": [{
            "properties": {
                "label": label,
                "city": city,
                "postcode": "75015",
                "housenumber": "10",
                "street": "Rue de l'Ingénieur Robert Keller",
                "score": 0.97
            },
            "geometry": {
                "type": "Point",
                "coordinates": [2.2847, 48.8466]
            }
        }]
    })
}

#[tokio::test]
async fn test_geocoding_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/"))
        .and(query_param("q", "10 rue de l'ingénieur robert keller paris"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(geocode_body(
            "10 Rue de l'Ingénieur Robert Keller 75015 Paris",
            "Paris",
        )))
        .mount(&mock_server)
        .await;

    let config = Config::for_tests(&mock_server.uri());
    let service = GeocodingService::new(&config);
    let result = service
        .search("10 rue de l'ingénieur robert keller paris")
        .await
        .unwrap();

    let address = result.expect("address should resolve");
    assert_eq!(
        address.label,
        "10 Rue de l'Ingénieur Robert Keller 75015 Paris"
    );
    assert_eq!(address.city, "Paris");
    assert_eq!(address.house_number.as_deref(), Some("10"));
    // GeoJSON order is [lon, lat]; the record must unswap it.
    assert_eq!(address.latitude, 48.8466);
    assert_eq!(address.longitude, 2.2847);
}

#[tokio::test]
async fn test_geocoding_no_match_is_none() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"features": []})))
        .mount(&mock_server)
        .await;

    let config = Config::for_tests(&mock_server.uri());
    let service = GeocodingService::new(&config);
    let result = service.search("nowhere at all").await.unwrap();

    assert!(result.is_none());
}

#[tokio::test]
async fn test_geocoding_missing_city_falls_back_to_default() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "features": [{
                "properties": { "label": "Somewhere" },
                "geometry": { "coordinates": [2.0, 48.0] }
            }]
        })))
        .mount(&mock_server)
        .await;

    let config = Config::for_tests(&mock_server.uri());
    let service = GeocodingService::new(&config);
    let address = service.search("somewhere").await.unwrap().unwrap();

    assert_eq!(address.city, "Paris");
}

#[tokio::test]
async fn test_geocoding_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let config = Config::for_tests(&mock_server.uri());
    let service = GeocodingService::new(&config);
    let result = service.search("10 rue de la paix paris").await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_geocoding_malformed_payload_keeps_context() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json at all"))
        .mount(&mock_server)
        .await;

    let config = Config::for_tests(&mock_server.uri());
    let service = GeocodingService::new(&config);
    let err = service
        .search("10 rue de la paix paris")
        .await
        .expect_err("malformed payload should fail");

    // The context chain names the failing step, on top of the transport
    // detail.
    assert!(err.to_string().contains("Failed to parse geocoding response"));
}

#[tokio::test]
async fn test_transaction_most_recent_wins() {
    let mock_server = MockServer::start().await;

    let body = serde_json::json!({
        "features": [
            { "properties": {
                "id_mutation": "2021-100",
                "date_mutation": "2021-03-14",
                "valeur_fonciere": 420000.0,
                "type_local": "Appartement",
                "surface_relle_batiment": 61.0
            }},
            { "properties": {
                "id_mutation": "2015-200",
                "date_mutation": "2015-09-02",
                "valeur_fonciere": 310000.0,
                "type_local": "Appartement",
                "surface_relle_batiment": 61.0
            }}
        ]
    });

    Mock::given(method("GET"))
        .and(path("/dvf"))
        .and(query_param("lat", "48.8466"))
        .and(query_param("lon", "2.2847"))
        .and(query_param("dist", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&mock_server)
        .await;

    let config = Config::for_tests(&mock_server.uri());
    let service = TransactionService::new(&config);
    let result = service.most_recent(48.8466, 2.2847, 50).await.unwrap();

    let record = result.expect("should find a transaction");
    assert_eq!(record.mutation_id.as_deref(), Some("2021-100"));
    assert_eq!(record.mutation_year(), Some(2021));
}

#[tokio::test]
async fn test_transaction_empty_is_none() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/dvf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"features": []})))
        .mount(&mock_server)
        .await;

    let config = Config::for_tests(&mock_server.uri());
    let service = TransactionService::new(&config);
    let result = service.most_recent(48.0, 2.0, 50).await.unwrap();

    assert!(result.is_none());
}

#[tokio::test]
async fn test_diagnostic_derives_sieve_flag() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data-fair/api/v1/datasets/dpe03existant/lines"))
        .and(query_param("size", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{
                "etiquette_dpe": "F",
                "etiquette_ges": "E",
                "conso_5_usages_par_m2_ep": 331.5
            }]
        })))
        .mount(&mock_server)
        .await;

    let config = Config::for_tests(&mock_server.uri());
    let service = EnergyService::new(&config);
    let result = service.lookup("10 rue de la paix paris").await.unwrap();

    let diagnostic = result.expect("should find a diagnostic");
    assert_eq!(diagnostic.energy_class, "F");
    assert!(diagnostic.is_energy_sieve);
    assert_eq!(diagnostic.estimated_consumption_kwh_m2, Some(331.5));
}

#[tokio::test]
async fn test_diagnostic_mid_class_is_not_sieve() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data-fair/api/v1/datasets/dpe03existant/lines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{ "etiquette_dpe": "C", "conso_5_usages_par_m2_ep": 120.0 }]
        })))
        .mount(&mock_server)
        .await;

    let config = Config::for_tests(&mock_server.uri());
    let service = EnergyService::new(&config);
    let diagnostic = service.lookup("somewhere").await.unwrap().unwrap();

    assert!(!diagnostic.is_energy_sieve);
}

#[tokio::test]
async fn test_consumption_query_uses_folded_address() {
    let mock_server = MockServer::start().await;

    // The accent-stripped, apostrophe-free, upper-cased form must reach the
    // dataset's where clause.
    Mock::given(method("GET"))
        .and(path(
            "/api/explore/v2.1/catalog/datasets/consommation-annuelle-residentielle-par-adresse/records",
        ))
        .and(query_param(
            "where",
            r#"nom_commune="PARIS" AND adresse LIKE "10 RUE DE L INGENIEUR ROBERT KELLER""#,
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{
                "adresse": "10 RUE DE L INGENIEUR ROBERT KELLER",
                "consommation_annuelle_totale_de_l_adresse_mwh": 42.0,
                "nombre_de_logements": 28,
                "consommation_annuelle_moyenne_par_site_de_l_adresse_mwh": 1.5,
                "segment_de_client": "Résidentiel"
            }]
        })))
        .mount(&mock_server)
        .await;

    let config = Config::for_tests(&mock_server.uri());
    let service = ConsumptionService::new(&config);
    let result = service
        .lookup(
            "Paris",
            Some("10"),
            Some("Rue de l'Ingénieur Robert Keller"),
        )
        .await
        .unwrap();

    let record = result.expect("should find consumption data");
    assert_eq!(record.average_annual_mwh, Some(1.5));
    assert_eq!(record.dwelling_count, Some(28));
}

#[tokio::test]
async fn test_consumption_without_street_skips_lookup() {
    // No street component, nothing to match on: the client must not call
    // the upstream at all.
    let mock_server = MockServer::start().await;

    let config = Config::for_tests(&mock_server.uri());
    let service = ConsumptionService::new(&config);
    let result = service.lookup("Paris", None, None).await.unwrap();

    assert!(result.is_none());
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_registry_prefers_holding_company() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [
                {
                    "nom_complet": "BOULANGERIE DUPONT",
                    "siren": "111111111",
                    "activite_principale": "10.71C",
                    "nature_juridique": "5499",
                    "etat_administratif": "A"
                },
                {
                    "nom_complet": "SCI DES LILAS",
                    "siren": "222222222",
                    "activite_principale": "68.20B",
                    "nature_juridique": "6540",
                    "etat_administratif": "A"
                }
            ]
        })))
        .mount(&mock_server)
        .await;

    let config = Config::for_tests(&mock_server.uri());
    let service = RegistryService::new(&config);
    let owner = service.find_owner("10 Rue des Lilas 75019 Paris").await.unwrap();

    assert_eq!(owner.kind, OwnerKind::Company);
    assert_eq!(owner.name, "SCI DES LILAS");
    assert_eq!(owner.registry_id.as_deref(), Some("222222222"));
    assert_eq!(owner.status, Some(OwnerStatus::Active));
}

#[tokio::test]
async fn test_registry_falls_back_to_first_candidate() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [
                {
                    "nom_complet": "GARAGE MARTIN",
                    "siren": "333333333",
                    "activite_principale": "45.20A",
                    "nature_juridique": "5499",
                    "etat_administratif": "C"
                },
                {
                    "nom_complet": "PRESSING DU CENTRE",
                    "siren": "444444444",
                    "nature_juridique": "5499",
                    "etat_administratif": "A"
                }
            ]
        })))
        .mount(&mock_server)
        .await;

    let config = Config::for_tests(&mock_server.uri());
    let service = RegistryService::new(&config);
    let owner = service.find_owner("somewhere").await.unwrap();

    assert_eq!(owner.name, "GARAGE MARTIN");
    assert_eq!(owner.status, Some(OwnerStatus::Inactive));
}

#[tokio::test]
async fn test_registry_no_match_is_individual_placeholder() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"results": []})))
        .mount(&mock_server)
        .await;

    let config = Config::for_tests(&mock_server.uri());
    let service = RegistryService::new(&config);
    let owner = service.find_owner("a purely residential address").await.unwrap();

    assert_eq!(owner.kind, OwnerKind::Individual);
    assert!(owner.registry_id.is_none());
}

// ============ Full workflow ============

#[tokio::test]
async fn test_workflow_reproduces_reference_scenario() {
    // Diagnostic F at 150 kWh/m² with a 60 m² assumption gives a 9.0 MWh
    // theoretical; a 1.5 MWh average is 16% of it (+40); no sale history
    // defaults past the staleness threshold (+20); class F is a sieve (+10).
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(geocode_body(
            "10 Rue de l'Ingénieur Robert Keller 75015 Paris",
            "Paris",
        )))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dvf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"features": []})))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data-fair/api/v1/datasets/dpe03existant/lines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{ "etiquette_dpe": "F", "conso_5_usages_par_m2_ep": 150.0 }]
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(
            "/api/explore/v2.1/catalog/datasets/consommation-annuelle-residentielle-par-adresse/records",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{
                "consommation_annuelle_moyenne_par_site_de_l_adresse_mwh": 1.5,
                "nombre_de_logements": 1
            }]
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{
                "nom_complet": "SCI KELLER",
                "siren": "555555555",
                "nature_juridique": "6540",
                "etat_administratif": "A"
            }]
        })))
        .mount(&mock_server)
        .await;

    let state = test_state(&mock_server.uri());
    let report = analyze_address(&state, "10 rue de l'ingénieur robert keller paris")
        .await
        .unwrap();

    assert_eq!(report.vacancy_score, 70);
    assert_eq!(report.theoretical_consumption_mwh, 9.0);
    assert_eq!(report.insights.len(), 3);
    assert!(report.insights[0].contains("very low consumption (16% of theory)"));
    assert!(report.insights[1].contains("no transaction in over 10 years"));
    assert!(report.insights[2].contains("energy sieve (class F)"));
    assert_eq!(report.sources.owner.kind, OwnerKind::Company);
    assert_eq!(report.sources.owner.name, "SCI KELLER");
    assert!(report.sources.last_transaction.is_none());
}

#[tokio::test]
async fn test_workflow_degrades_when_side_sources_fail() {
    // Geocoding succeeds; the four other lookups all error out. The report
    // must still come back with the recency default and the owner
    // placeholder; adapter failures never reach the caller.
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(geocode_body(
            "5 Avenue du Prado 13006 Marseille",
            "Marseille",
        )))
        .mount(&mock_server)
        .await;
    for failing in [
        "/dvf",
        "/data-fair/api/v1/datasets/dpe03existant/lines",
        "/api/explore/v2.1/catalog/datasets/consommation-annuelle-residentielle-par-adresse/records",
        "/search",
    ] {
        Mock::given(method("GET"))
            .and(path(failing))
            .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
            .mount(&mock_server)
            .await;
    }

    let state = test_state(&mock_server.uri());
    let report = analyze_address(&state, "5 avenue du prado marseille")
        .await
        .unwrap();

    assert_eq!(report.vacancy_score, 20);
    assert_eq!(report.insights.len(), 1);
    assert!(report.insights[0].contains("no transaction in over 10 years"));
    assert_eq!(report.sources.owner.kind, OwnerKind::Individual);
    assert!(report.sources.energy.is_none());
    assert!(report.sources.consumption.is_none());
}

#[tokio::test]
async fn test_workflow_unresolvable_address_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"features": []})))
        .mount(&mock_server)
        .await;

    let state = test_state(&mock_server.uri());
    let result = analyze_address(&state, "complete gibberish query").await;

    assert!(matches!(
        result,
        Err(vacancy_radar::errors::AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_workflow_short_query_is_rejected() {
    let state = test_state("http://127.0.0.1:9");
    let result = analyze_address(&state, "ab").await;

    assert!(matches!(
        result,
        Err(vacancy_radar::errors::AppError::BadRequest(_))
    ));
}

#[tokio::test]
async fn test_workflow_caches_repeat_queries() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(geocode_body(
            "3 Place des Terreaux 69001 Lyon",
            "Lyon",
        )))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dvf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"features": []})))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data-fair/api/v1/datasets/dpe03existant/lines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"results": []})))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(
            "/api/explore/v2.1/catalog/datasets/consommation-annuelle-residentielle-par-adresse/records",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"results": []})))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"results": []})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let state = test_state(&mock_server.uri());
    let first = analyze_address(&state, "3 place des terreaux lyon").await.unwrap();
    let second = analyze_address(&state, "3 Place des Terreaux Lyon").await.unwrap();

    // Same report id, and the expect(1) mocks verify no second round of
    // upstream calls happened.
    assert_eq!(first.report_id, second.report_id);
    assert_eq!(first.vacancy_score, second.vacancy_score);
}
