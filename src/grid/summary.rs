//! City-level aggregation of per-transformer health.

use std::fmt;

use serde::Serialize;

use crate::bghi::HealthStatus;
use crate::clock::UnixTime;

/// Fraction of transformers in a stressed load state that escalates the
/// city status to Warning.
const ESCALATION_FRACTION: f64 = 0.3;
/// Load percentage that marks a transformer as stressed for escalation.
const STRESSED_LOAD_PCT: f64 = 70.0;

/// Per-transformer inputs to the city aggregation.
#[derive(Debug, Clone)]
pub struct TransformerDigest {
    pub bghi_score: f64,
    pub status: HealthStatus,
    /// Downstream buildings (weights are floored at 1).
    pub buildings: u32,
    pub load_pct: f64,
    pub load_kw: f64,
}

/// City-level health summary.
#[derive(Debug, Clone, Serialize)]
pub struct CitySummary {
    pub city: String,
    /// Weighted city BGHI in [0, 100].
    pub bghi_score: f64,
    pub status: HealthStatus,
    pub color: &'static str,
    pub transformer_count: usize,
    pub total_buildings: u32,
    pub total_load_kw: f64,
    pub average_load_pct: f64,
    pub critical_count: usize,
    pub warning_count: usize,
    pub updated_at: UnixTime,
}

impl fmt::Display for CitySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: BGHI {:.2} ({}) | {} transformers, {:.1} kW, avg load {:.1}% | {} critical, {} warning",
            self.city,
            self.bghi_score,
            self.status,
            self.transformer_count,
            self.total_load_kw,
            self.average_load_pct,
            self.critical_count,
            self.warning_count,
        )
    }
}

/// Urgency multiplier: unhealthy transformers drag the city score harder.
fn urgency(status: HealthStatus) -> f64 {
    match status {
        HealthStatus::Critical => 3.0,
        HealthStatus::Warning => 1.5,
        HealthStatus::Good => 1.0,
    }
}

/// Aggregates per-transformer digests into a city summary.
///
/// The city score is NOT a plain average:
/// `Σ(bghi · buildings · urgency) / Σ(buildings · urgency)`, so large and
/// unhealthy zones dominate. Independently, when at least 30% of
/// transformers sit in a stressed load state the city status escalates to
/// at least Warning even if the weighted score tiers as Good.
pub fn summarize(city: &str, digests: &[TransformerDigest], now: UnixTime) -> CitySummary {
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    let mut total_load_kw = 0.0;
    let mut load_pct_sum = 0.0;
    let mut total_buildings = 0_u32;
    let mut critical_count = 0_usize;
    let mut warning_count = 0_usize;
    let mut stressed = 0_usize;

    for d in digests {
        let weight = f64::from(d.buildings.max(1)) * urgency(d.status);
        weighted_sum += d.bghi_score * weight;
        weight_total += weight;
        total_load_kw += d.load_kw;
        load_pct_sum += d.load_pct;
        total_buildings += d.buildings;
        match d.status {
            HealthStatus::Critical => critical_count += 1,
            HealthStatus::Warning => warning_count += 1,
            HealthStatus::Good => {}
        }
        if d.load_pct >= STRESSED_LOAD_PCT {
            stressed += 1;
        }
    }

    let bghi_score = if weight_total > 0.0 {
        weighted_sum / weight_total
    } else {
        100.0
    };

    let mut status = HealthStatus::from_score(bghi_score);
    let stressed_fraction = if digests.is_empty() {
        0.0
    } else {
        stressed as f64 / digests.len() as f64
    };
    if stressed_fraction >= ESCALATION_FRACTION && status == HealthStatus::Good {
        status = HealthStatus::Warning;
    }

    CitySummary {
        city: city.to_string(),
        bghi_score: round2(bghi_score),
        status,
        color: status.color(),
        transformer_count: digests.len(),
        total_buildings,
        total_load_kw: round2(total_load_kw),
        average_load_pct: if digests.is_empty() {
            0.0
        } else {
            round2(load_pct_sum / digests.len() as f64)
        },
        critical_count,
        warning_count,
        updated_at: now,
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
