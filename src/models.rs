use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============ Domain Records ============

/// Normalized address produced by the geocoding lookup.
///
/// This is the anchor record: coordinates feed the transaction lookup, the
/// city/house-number/street triple feeds the consumption lookup, and the
/// normalized label feeds the registry lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressRecord {
    /// Normalized address label (e.g. "10 Rue de la Paix 75002 Paris").
    pub label: String,
    /// City name. Falls back to the configured default when the geocoder
    /// omits it.
    pub city: String,
    /// Postal code, when known.
    pub postcode: Option<String>,
    /// House number component of the normalized address.
    pub house_number: Option<String>,
    /// Street component of the normalized address.
    pub street: Option<String>,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
}

/// A single real-estate sale record near the geocoded point.
///
/// Only the most recent transaction matters to scoring; the rest of the sale
/// metadata is carried for traceability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Upstream mutation identifier.
    pub mutation_id: Option<String>,
    /// Mutation date, "YYYY-MM-DD" or a partial prefix of it.
    pub mutation_date: Option<String>,
    /// Sale value in euros.
    pub sale_value: Option<f64>,
    /// Local type as reported upstream (dwelling, commercial unit, ...).
    pub local_type: Option<String>,
    /// Built surface in square meters.
    pub built_surface_m2: Option<f64>,
}

impl TransactionRecord {
    /// Year component of the mutation date, if the date is parseable.
    /// Partial dates ("2019", "2019-03") still yield a year.
    pub fn mutation_year(&self) -> Option<i32> {
        self.mutation_date
            .as_deref()?
            .split('-')
            .next()?
            .trim()
            .parse()
            .ok()
    }
}

/// Energy-performance diagnostic for a dwelling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyDiagnostic {
    /// Energy class, "A" (best) through "G" (worst).
    pub energy_class: String,
    /// Greenhouse-gas class, when reported.
    pub ges_class: Option<String>,
    /// Estimated consumption in kWh/m²/yr. Per-area: must be scaled by an
    /// assumed surface to yield an annual total.
    pub estimated_consumption_kwh_m2: Option<f64>,
    /// True when the dwelling is rated in the worst two classes (F or G).
    pub is_energy_sieve: bool,
}

impl EnergyDiagnostic {
    /// Builds a diagnostic from its wire fields, deriving the sieve flag
    /// from the energy class.
    pub fn from_class(
        energy_class: String,
        ges_class: Option<String>,
        estimated_consumption_kwh_m2: Option<f64>,
    ) -> Self {
        let is_energy_sieve = matches!(energy_class.as_str(), "F" | "G");
        Self {
            energy_class,
            ges_class,
            estimated_consumption_kwh_m2,
            is_energy_sieve,
        }
    }
}

/// Annual metered electricity consumption aggregated at one address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    /// Address label as matched by the consumption dataset.
    pub address_label: Option<String>,
    /// Total annual consumption for the whole address, MWh/yr.
    pub total_annual_mwh: Option<f64>,
    /// Average annual consumption per dwelling, MWh/yr. `None` means the
    /// dataset matched the address but carries no usable figure.
    pub average_annual_mwh: Option<f64>,
    /// Number of dwellings metered at the address.
    pub dwelling_count: Option<i64>,
    /// Client segment as reported upstream (residential, professional, ...).
    pub client_segment: Option<String>,
}

/// Kind of owner entity identified at the address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OwnerKind {
    /// A registered company (possibly a real-estate holding).
    Company,
    /// A private individual, or the fallback when no company matches.
    Individual,
}

/// Administrative status of a registered owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OwnerStatus {
    Active,
    Inactive,
}

/// Owner entity for an address. Never absent: the registry lookup falls back
/// to an individual placeholder on error or no match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerRecord {
    /// Whether the owner is a company or an individual.
    pub kind: OwnerKind,
    /// Company legal name, or a generic placeholder for individuals.
    pub name: String,
    /// Registry identifier (SIREN), companies only.
    pub registry_id: Option<String>,
    /// Principal activity code (NAF), companies only.
    pub activity_code: Option<String>,
    /// Administrative status, companies only.
    pub status: Option<OwnerStatus>,
}

impl OwnerRecord {
    /// Placeholder returned when no company matches the address. Likely an
    /// individual owner.
    pub fn unknown_individual() -> Self {
        Self {
            kind: OwnerKind::Individual,
            name: "Private owner (non-commercial)".to_string(),
            registry_id: None,
            activity_code: None,
            status: None,
        }
    }
}

// ============ Scoring Output ============

/// Result of the scoring engine: a bounded score with ordered textual
/// justifications. Insight order follows the fixed evaluation order
/// (consumption, transaction recency, energy class); downstream consumers
/// treat the list positionally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VacancyAssessment {
    /// Vacancy likelihood, 0 (occupied) to 100 (very likely vacant).
    pub score: u8,
    /// Human-readable justifications, in evaluation order.
    pub insights: Vec<String>,
    /// Theoretical annual consumption used as the comparison baseline,
    /// MWh/yr.
    pub theoretical_consumption_mwh: f64,
    /// Informational: the consumption dataset reports more than one dwelling
    /// at the address. Does not affect the score.
    pub multi_unit_building: bool,
}

// ============ Service-level Report ============

/// Raw per-source inputs kept alongside the assessment for traceability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecords {
    pub last_transaction: Option<TransactionRecord>,
    pub energy: Option<EnergyDiagnostic>,
    pub consumption: Option<ConsumptionRecord>,
    pub owner: OwnerRecord,
}

/// Full analysis result for one address: the assessment plus everything that
/// went into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyReport {
    /// Deterministic identifier derived from the normalized address, stable
    /// across re-analyses of the same address.
    pub report_id: String,
    /// The geocoded address the analysis ran against.
    pub address: AddressRecord,
    /// Vacancy likelihood score, 0-100.
    pub vacancy_score: u8,
    /// Ordered justifications for the score.
    pub insights: Vec<String>,
    /// Theoretical annual consumption baseline, MWh/yr.
    pub theoretical_consumption_mwh: f64,
    /// The consumption dataset reports a multi-unit building.
    pub multi_unit_building: bool,
    /// Raw source records for traceability.
    pub sources: SourceRecords,
    /// When the analysis ran.
    pub analyzed_at: DateTime<Utc>,
}

// ============ API Request Models ============

/// Request payload for the analyze endpoint.
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    /// Free-text address to analyze.
    pub address: String,
}

// ============ Upstream Wire Formats ============
// Typed response shapes for the five external sources. Field names follow
// the upstream JSON; serde renames keep the Rust side readable.

/// Geocoding search response (GeoJSON FeatureCollection).
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeResponse {
    #[serde(default)]
    pub features: Vec<GeocodeFeature>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeFeature {
    pub properties: GeocodeProperties,
    pub geometry: GeocodeGeometry,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeProperties {
    pub label: String,
    pub city: Option<String>,
    pub postcode: Option<String>,
    #[serde(rename = "housenumber")]
    pub house_number: Option<String>,
    pub street: Option<String>,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeGeometry {
    /// GeoJSON order: [longitude, latitude].
    pub coordinates: Vec<f64>,
}

/// Transaction-history response (GeoJSON FeatureCollection).
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionResponse {
    #[serde(default)]
    pub features: Vec<TransactionFeature>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionFeature {
    pub properties: TransactionProperties,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionProperties {
    #[serde(rename = "id_mutation")]
    pub mutation_id: Option<String>,
    #[serde(rename = "date_mutation")]
    pub mutation_date: Option<String>,
    #[serde(rename = "valeur_fonciere")]
    pub sale_value: Option<f64>,
    #[serde(rename = "type_local")]
    pub local_type: Option<String>,
    // Upstream really spells it this way.
    #[serde(rename = "surface_relle_batiment")]
    pub built_surface_m2: Option<f64>,
}

impl From<TransactionProperties> for TransactionRecord {
    fn from(p: TransactionProperties) -> Self {
        Self {
            mutation_id: p.mutation_id,
            mutation_date: p.mutation_date,
            sale_value: p.sale_value,
            local_type: p.local_type,
            built_surface_m2: p.built_surface_m2,
        }
    }
}

/// Energy-diagnostic dataset response.
#[derive(Debug, Clone, Deserialize)]
pub struct DiagnosticResponse {
    #[serde(default)]
    pub results: Vec<DiagnosticLine>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiagnosticLine {
    #[serde(rename = "etiquette_dpe")]
    pub energy_class: Option<String>,
    #[serde(rename = "etiquette_ges")]
    pub ges_class: Option<String>,
    #[serde(rename = "conso_5_usages_par_m2_ep")]
    pub consumption_kwh_m2: Option<f64>,
}

/// Annual-consumption dataset response.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumptionResponse {
    #[serde(default)]
    pub results: Vec<ConsumptionRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsumptionRow {
    #[serde(rename = "adresse")]
    pub address: Option<String>,
    #[serde(rename = "consommation_annuelle_totale_de_l_adresse_mwh")]
    pub total_annual_mwh: Option<f64>,
    #[serde(rename = "nombre_de_logements")]
    pub dwelling_count: Option<i64>,
    #[serde(rename = "consommation_annuelle_moyenne_par_site_de_l_adresse_mwh")]
    pub average_annual_mwh: Option<f64>,
    #[serde(rename = "segment_de_client")]
    pub client_segment: Option<String>,
}

impl From<ConsumptionRow> for ConsumptionRecord {
    fn from(r: ConsumptionRow) -> Self {
        Self {
            address_label: r.address,
            total_annual_mwh: r.total_annual_mwh,
            average_annual_mwh: r.average_annual_mwh,
            dwelling_count: r.dwelling_count,
            client_segment: r.client_segment,
        }
    }
}

/// Corporate-registry search response.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrySearchResponse {
    #[serde(default)]
    pub results: Vec<RegistryCompany>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryCompany {
    #[serde(rename = "nom_complet")]
    pub full_name: Option<String>,
    pub siren: Option<String>,
    #[serde(rename = "activite_principale")]
    pub activity_code: Option<String>,
    #[serde(rename = "nature_juridique")]
    pub legal_nature: Option<String>,
    #[serde(rename = "etat_administratif")]
    pub administrative_state: Option<String>,
}
