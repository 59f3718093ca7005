//! Barangay Grid Health Index (BGHI): composite 0-100 health scoring.
//!
//! Six independently computed stress components, each clamped to [0, 100],
//! combine through a configurable weight vector into a deterioration figure;
//! the health score is its inverse.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Load percentage where stress begins.
const LOAD_SAFE_PCT: f64 = 70.0;
/// Load percentage at maximum stress.
const LOAD_CRITICAL_PCT: f64 = 100.0;
/// Outage minutes in 24 h that map to a full score.
const MAX_OUTAGE_MINUTES: f64 = 60.0;
/// Anomaly events in 24 h that map to a full score.
const MAX_ANOMALY_EVENTS: f64 = 10.0;
/// Temperature where environmental stress begins.
const TEMP_SAFE_C: f64 = 30.0;
/// Temperature at maximum environmental stress.
const TEMP_CRITICAL_C: f64 = 45.0;
/// Mismatch ratio that maps to a full score.
const MAX_MISMATCH_RATIO: f64 = 0.3;

/// Weight vector for the six BGHI components. Must sum to 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BghiWeights {
    pub load_stress: f64,
    pub outage_score: f64,
    pub power_quality: f64,
    pub anomaly_frequency: f64,
    pub environmental_stress: f64,
    pub mismatch_score: f64,
}

impl Default for BghiWeights {
    fn default() -> Self {
        Self {
            load_stress: 0.35,
            outage_score: 0.25,
            power_quality: 0.15,
            anomaly_frequency: 0.10,
            environmental_stress: 0.10,
            mismatch_score: 0.05,
        }
    }
}

impl BghiWeights {
    /// Sum of all six weights.
    pub fn sum(&self) -> f64 {
        self.load_stress
            + self.outage_score
            + self.power_quality
            + self.anomaly_frequency
            + self.environmental_stress
            + self.mismatch_score
    }

    /// Returns `true` when the weights sum to 1.0 within 1e-9.
    pub fn is_normalized(&self) -> bool {
        (self.sum() - 1.0).abs() <= 1e-9
    }
}

/// Health status tier derived from the BGHI score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    Good,
    Warning,
    Critical,
}

impl HealthStatus {
    /// Tier for a 0-100 score: >= 80 Good, >= 60 Warning, else Critical.
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Self::Good
        } else if score >= 60.0 {
            Self::Warning
        } else {
            Self::Critical
        }
    }

    /// Dashboard color code for the tier.
    pub fn color(&self) -> &'static str {
        match self {
            Self::Good => "green",
            Self::Warning => "amber",
            Self::Critical => "red",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Good => "Good",
            Self::Warning => "Warning",
            Self::Critical => "Critical",
        };
        write!(f, "{s}")
    }
}

/// The six component scores feeding the composite.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BghiComponents {
    pub load_stress: f64,
    pub outage_score: f64,
    pub power_quality: f64,
    pub anomaly_frequency: f64,
    pub environmental_stress: f64,
    pub mismatch_score: f64,
}

/// Composite scoring result. Pure derived value, recomputed every tick.
#[derive(Debug, Clone, Serialize)]
pub struct BghiResult {
    /// Health score in [0, 100]; higher is healthier.
    pub bghi_score: f64,
    /// Weighted deterioration the score is the inverse of.
    pub deterioration: f64,
    pub status: HealthStatus,
    pub color: &'static str,
    pub components: BghiComponents,
}

fn clamp_score(v: f64) -> f64 {
    v.clamp(0.0, 100.0)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Load stress: 0 up to the safe threshold, linear ramp to 100 at critical.
pub fn load_stress(transformer_load_pct: f64) -> f64 {
    if transformer_load_pct <= LOAD_SAFE_PCT {
        return 0.0;
    }
    let ramp = (transformer_load_pct - LOAD_SAFE_PCT) / (LOAD_CRITICAL_PCT - LOAD_SAFE_PCT);
    clamp_score(ramp * 100.0)
}

/// Outage score: minutes of outage in the last 24 h against a 60-minute cap.
pub fn outage_score(outage_minutes_24h: f64) -> f64 {
    clamp_score(outage_minutes_24h / MAX_OUTAGE_MINUTES * 100.0)
}

/// Power quality: explicit voltage deviation when available, otherwise a
/// spike-count proxy (5 points per event, capped).
pub fn power_quality(voltage_deviation: Option<f64>, spike_events_24h: usize) -> f64 {
    let pq = match voltage_deviation {
        Some(dev) => dev * 100.0,
        None => (spike_events_24h as f64 * 5.0).min(100.0),
    };
    clamp_score(pq)
}

/// Anomaly frequency: events in the last 24 h against a 10-event cap.
pub fn anomaly_frequency(events_24h: usize) -> f64 {
    clamp_score(events_24h as f64 / MAX_ANOMALY_EVENTS * 100.0)
}

/// Environmental stress: temperature ramp above 30 degC, amplified when
/// humidity exceeds 70%.
pub fn environmental_stress(ambient_temp_c: f64, humidity_pct: Option<f64>) -> f64 {
    let mut score = if ambient_temp_c <= TEMP_SAFE_C {
        0.0
    } else {
        (ambient_temp_c - TEMP_SAFE_C) / (TEMP_CRITICAL_C - TEMP_SAFE_C) * 100.0
    };
    if let Some(humidity) = humidity_pct {
        score *= 1.0 + (humidity - 70.0).max(0.0) / 100.0;
    }
    clamp_score(score)
}

/// Mismatch score: relative feeder/node gap against a 30% cap.
pub fn mismatch_score(mismatch_ratio: f64) -> f64 {
    clamp_score(mismatch_ratio.abs() / MAX_MISMATCH_RATIO * 100.0)
}

/// Combines component scores into the final BGHI.
///
/// Components are re-clamped to [0, 100] first, so arbitrary inputs still
/// produce a score in [0, 100].
pub fn calculate(components: &BghiComponents, weights: &BghiWeights) -> BghiResult {
    let clamped = BghiComponents {
        load_stress: clamp_score(components.load_stress),
        outage_score: clamp_score(components.outage_score),
        power_quality: clamp_score(components.power_quality),
        anomaly_frequency: clamp_score(components.anomaly_frequency),
        environmental_stress: clamp_score(components.environmental_stress),
        mismatch_score: clamp_score(components.mismatch_score),
    };

    let deterioration = weights.load_stress * clamped.load_stress
        + weights.outage_score * clamped.outage_score
        + weights.power_quality * clamped.power_quality
        + weights.anomaly_frequency * clamped.anomaly_frequency
        + weights.environmental_stress * clamped.environmental_stress
        + weights.mismatch_score * clamped.mismatch_score;

    let score = clamp_score(100.0 - deterioration);
    let status = HealthStatus::from_score(score);

    BghiResult {
        bghi_score: round2(score),
        deterioration: round2(deterioration),
        status,
        color: status.color(),
        components: clamped,
    }
}
