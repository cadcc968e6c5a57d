//! Vacancy scoring engine.
//!
//! Pure data-fusion core: takes the (possibly absent) records gathered from
//! the upstream sources and derives a deterministic, explainable score in
//! `[0, 100]`. No I/O, no errors, no hidden state: the same inputs and the
//! same `now` always produce the same assessment.
//!
//! Evaluation order is fixed (consumption, transaction recency, energy
//! class) and insight order follows it; consumers display the list
//! positionally.

use crate::models::{ConsumptionRecord, EnergyDiagnostic, TransactionRecord, VacancyAssessment};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Scoring weights and thresholds, grouped so the policy is auditable and
/// overridable instead of buried in literals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringPolicy {
    /// Dwelling surface assumed when converting a per-m² diagnostic figure
    /// to an annual total, m².
    pub assumed_surface_m2: f64,
    /// Theoretical annual consumption assumed when no diagnostic estimate is
    /// available, MWh/yr.
    pub baseline_annual_consumption_mwh: f64,
    /// Real/theoretical ratio below which consumption is "very low".
    pub very_low_consumption_ratio: f64,
    /// Real/theoretical ratio below which consumption is "markedly low".
    pub low_consumption_ratio: f64,
    /// Points for very low consumption.
    pub very_low_consumption_points: u32,
    /// Points for marked under-consumption.
    pub low_consumption_points: u32,
    /// Years without a sale after which an address scores as stale.
    pub stale_transaction_years: i64,
    /// Years-since-transaction assumed when no sale history exists. Set
    /// above `stale_transaction_years` on purpose: absence of sale history
    /// is itself treated as a mild vacancy signal.
    pub default_years_since_transaction: i64,
    /// Points for transaction staleness.
    pub stale_transaction_points: u32,
    /// Points for an energy-sieve rating (class F or G).
    pub energy_sieve_points: u32,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            assumed_surface_m2: 60.0,
            baseline_annual_consumption_mwh: 4.5,
            very_low_consumption_ratio: 0.2,
            low_consumption_ratio: 0.5,
            very_low_consumption_points: 40,
            low_consumption_points: 20,
            stale_transaction_years: 5,
            default_years_since_transaction: 10,
            stale_transaction_points: 20,
            energy_sieve_points: 10,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number", name)),
        Err(_) => Ok(default),
    }
}

impl ScoringPolicy {
    /// Loads the policy with per-field environment overrides on top of the
    /// defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let d = Self::default();
        Ok(Self {
            assumed_surface_m2: env_parse("ASSUMED_SURFACE_M2", d.assumed_surface_m2)?,
            baseline_annual_consumption_mwh: env_parse(
                "BASELINE_ANNUAL_CONSUMPTION_MWH",
                d.baseline_annual_consumption_mwh,
            )?,
            very_low_consumption_ratio: env_parse(
                "VERY_LOW_CONSUMPTION_RATIO",
                d.very_low_consumption_ratio,
            )?,
            low_consumption_ratio: env_parse("LOW_CONSUMPTION_RATIO", d.low_consumption_ratio)?,
            very_low_consumption_points: env_parse(
                "VERY_LOW_CONSUMPTION_POINTS",
                d.very_low_consumption_points,
            )?,
            low_consumption_points: env_parse("LOW_CONSUMPTION_POINTS", d.low_consumption_points)?,
            stale_transaction_years: env_parse(
                "STALE_TRANSACTION_YEARS",
                d.stale_transaction_years,
            )?,
            default_years_since_transaction: env_parse(
                "DEFAULT_YEARS_SINCE_TRANSACTION",
                d.default_years_since_transaction,
            )?,
            stale_transaction_points: env_parse(
                "STALE_TRANSACTION_POINTS",
                d.stale_transaction_points,
            )?,
            energy_sieve_points: env_parse("ENERGY_SIEVE_POINTS", d.energy_sieve_points)?,
        })
    }
}

/// Derives the vacancy assessment from the gathered source records.
///
/// Total over its input domain: any combination of present/absent records
/// yields a complete assessment. Absent data degrades to the policy's
/// baseline assumptions, never to a failure.
///
/// `now` is injected so tests stay deterministic.
pub fn assess(
    energy: Option<&EnergyDiagnostic>,
    consumption: Option<&ConsumptionRecord>,
    last_transaction: Option<&TransactionRecord>,
    policy: &ScoringPolicy,
    now: DateTime<Utc>,
) -> VacancyAssessment {
    let mut score: u32 = 0;
    let mut insights: Vec<String> = Vec::new();

    // Step 1: theoretical consumption baseline. A diagnostic with a positive
    // per-m² estimate scales to an annual total; anything else falls back to
    // the configured typical-dwelling figure.
    let theoretical_consumption_mwh = match energy
        .and_then(|e| e.estimated_consumption_kwh_m2)
        .filter(|v| *v > 0.0)
    {
        Some(per_m2) => per_m2 * policy.assumed_surface_m2 / 1000.0,
        None => policy.baseline_annual_consumption_mwh,
    };

    // Step 2: real vs theoretical consumption. Skipped entirely when no
    // average figure exists, distinct from a present-but-unremarkable
    // ratio, even though both leave score and insights untouched.
    let mut multi_unit_building = false;
    if let Some(record) = consumption {
        if let Some(average) = record.average_annual_mwh {
            let ratio = average / theoretical_consumption_mwh;
            let percent = (ratio * 100.0) as i64;
            if ratio < policy.very_low_consumption_ratio {
                score += policy.very_low_consumption_points;
                insights.push(format!(
                    "very low consumption ({}% of theory) (+{})",
                    percent, policy.very_low_consumption_points
                ));
            } else if ratio < policy.low_consumption_ratio {
                score += policy.low_consumption_points;
                insights.push(format!(
                    "marked under-consumption ({}% of theory) (+{})",
                    percent, policy.low_consumption_points
                ));
            }
        }
        multi_unit_building = record.dwelling_count.is_some_and(|n| n > 1);
    }

    // Step 3: transaction recency. No parseable sale history defaults to
    // the configured constant, which exceeds the staleness threshold, so
    // addresses with no recorded sale score as stale.
    let years_since = last_transaction
        .and_then(|t| t.mutation_year())
        .map(|year| i64::from(now.year()) - i64::from(year))
        .unwrap_or(policy.default_years_since_transaction);
    if years_since > policy.stale_transaction_years {
        score += policy.stale_transaction_points;
        insights.push(format!(
            "no transaction in over {} years (+{})",
            years_since, policy.stale_transaction_points
        ));
    }

    // Step 4: energy sieve flag.
    if let Some(diag) = energy {
        if diag.is_energy_sieve {
            score += policy.energy_sieve_points;
            insights.push(format!(
                "energy sieve (class {}) (+{})",
                diag.energy_class, policy.energy_sieve_points
            ));
        }
    }

    // Step 5: clamp. Contributions are non-negative so 0 is implicit.
    VacancyAssessment {
        score: score.min(100) as u8,
        insights,
        theoretical_consumption_mwh,
        multi_unit_building,
    }
}
