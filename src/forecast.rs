//! EWMA-based 24-hour load forecasting with overload risk assessment.

use std::fmt;

use serde::Serialize;

use crate::clock::{HOUR_SECS, UnixTime};

/// Floor applied to capacity to keep risk ratios finite.
const MIN_CAPACITY_KW: f64 = 1e-6;

/// Projected load risk tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Critical,
    High,
    Moderate,
    Low,
}

impl RiskLevel {
    /// Tier for a load/capacity ratio.
    pub fn from_ratio(risk_ratio: f64) -> Self {
        if risk_ratio >= 0.95 {
            Self::Critical
        } else if risk_ratio >= 0.85 {
            Self::High
        } else if risk_ratio >= 0.75 {
            Self::Moderate
        } else {
            Self::Low
        }
    }
}

/// One hourly projection out of 24, regenerated every tick.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastPoint {
    /// Hour of day (0-23) this point lands on.
    pub hour: u32,
    /// Hours ahead of the forecast origin (0-23).
    pub offset_hours: u32,
    /// Projected timestamp.
    pub timestamp: UnixTime,
    pub predicted_load_kw: f64,
    pub baseline_load_kw: f64,
    /// Decayed EWMA adjustment applied on top of the baseline.
    pub adjustment_kw: f64,
    /// Predicted load over capacity.
    pub risk_ratio: f64,
    pub risk_level: RiskLevel,
    pub confidence_lower: f64,
    pub confidence_upper: f64,
    /// Accuracy proxy decaying linearly with horizon.
    pub forecast_accuracy: f64,
}

/// Predictive overload alert derived from a forecast.
#[derive(Debug, Clone, Serialize)]
pub struct OverloadAlert {
    pub alert_type: &'static str,
    /// Hour of day of the earliest critical point.
    pub first_critical_hour: u32,
    pub hours_ahead: u32,
    pub predicted_load_kw: f64,
    pub risk_ratio: f64,
    pub confidence: f64,
    /// How many forecast points breach the critical threshold.
    pub critical_hours_count: usize,
    pub recommended_action: String,
}

/// Forecasting requested before a baseline was configured.
///
/// A missing baseline is a caller bug; the forecaster never papers over it
/// with an empty projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineNotSet;

impl fmt::Display for BaselineNotSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hourly baseline not set; call set_baseline() or synthesize_baseline() first"
        )
    }
}

impl std::error::Error for BaselineNotSet {}

/// Exponentially weighted moving-average forecaster.
///
/// Blends an hourly baseline curve with the recent deviation from it; the
/// deviation's influence decays exponentially with forecast horizon.
#[derive(Debug, Clone)]
pub struct EwmaForecaster {
    alpha: f64,
    hourly_baseline: Option<[f64; 24]>,
}

impl EwmaForecaster {
    /// Creates a forecaster with the given smoothing factor. Higher `alpha`
    /// gives more weight to recent readings.
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            hourly_baseline: None,
        }
    }

    /// Installs an externally supplied hourly-average baseline.
    pub fn set_baseline(&mut self, hourly_averages: [f64; 24]) {
        self.hourly_baseline = Some(hourly_averages);
    }

    /// Synthesizes a cosine-hump baseline peaking at `peak_hour`.
    ///
    /// `baseline[h] = base + (peak - base)/2 * (1 + cos(phase))` with the
    /// phase mapping the hour's distance from the peak onto a full cycle.
    pub fn synthesize_baseline(&mut self, peak_hour: u32, peak_load_kw: f64, base_load_kw: f64) {
        let variation = (peak_load_kw - base_load_kw) / 2.0;
        let mut baseline = [0.0; 24];
        for (hour, slot) in baseline.iter_mut().enumerate() {
            let phase = (hour as f64 - peak_hour as f64) * 2.0 * std::f64::consts::PI / 24.0;
            *slot = base_load_kw + variation * (1.0 + phase.cos());
        }
        self.hourly_baseline = Some(baseline);
    }

    /// Returns `true` once a baseline is available.
    pub fn has_baseline(&self) -> bool {
        self.hourly_baseline.is_some()
    }

    /// Produces 24 hourly projections starting at `current_hour`.
    ///
    /// # Arguments
    ///
    /// * `current_hour` - Hour of day at the forecast origin (0-23)
    /// * `recent_mean_kw` - Recent average load, e.g. a last-hour rolling mean
    /// * `capacity_kw` - Transformer capacity for risk ratios
    /// * `now` - Forecast origin timestamp
    ///
    /// # Errors
    ///
    /// Returns [`BaselineNotSet`] when no baseline has been configured.
    pub fn forecast_24h(
        &self,
        current_hour: u32,
        recent_mean_kw: f64,
        capacity_kw: f64,
        now: UnixTime,
    ) -> Result<Vec<ForecastPoint>, BaselineNotSet> {
        let baseline = self.hourly_baseline.as_ref().ok_or(BaselineNotSet)?;
        let capacity = capacity_kw.max(MIN_CAPACITY_KW);

        let origin_hour = current_hour as usize % 24;
        let adjustment = self.alpha * (recent_mean_kw - baseline[origin_hour]);
        // The confidence band's sigma anchors on the origin prediction, so
        // the interval width depends only on horizon, not on where the
        // baseline curve happens to sit at each future hour.
        let band_anchor_kw = (baseline[origin_hour] + adjustment).max(0.0);

        let mut points = Vec::with_capacity(24);
        for offset in 0..24_u32 {
            let future_hour = (current_hour + offset) % 24;
            let baseline_load = baseline[future_hour as usize];

            // The recent deviation's influence halves roughly every 8 hours.
            let decay = (-(offset as f64) / 12.0).exp();
            let decayed_adjustment = adjustment * decay;
            let predicted = (baseline_load + decayed_adjustment).max(0.0);

            let risk_ratio = predicted / capacity;

            // Confidence band widens linearly with horizon.
            let uncertainty = 0.05 + 0.01 * offset as f64;
            let half_width = 1.96 * uncertainty * band_anchor_kw;

            points.push(ForecastPoint {
                hour: future_hour,
                offset_hours: offset,
                timestamp: now + offset as i64 * HOUR_SECS,
                predicted_load_kw: round2(predicted),
                baseline_load_kw: round2(baseline_load),
                adjustment_kw: round2(decayed_adjustment),
                risk_ratio: round3(risk_ratio),
                risk_level: RiskLevel::from_ratio(risk_ratio),
                confidence_lower: round2((predicted - half_width).max(0.0)),
                confidence_upper: round2(predicted + half_width),
                forecast_accuracy: round3(1.0 - uncertainty),
            });
        }
        Ok(points)
    }

    /// The point with the highest risk ratio, if any.
    pub fn peak_risk<'a>(&self, points: &'a [ForecastPoint]) -> Option<&'a ForecastPoint> {
        points
            .iter()
            .max_by(|a, b| a.risk_ratio.total_cmp(&b.risk_ratio))
    }

    /// Raises a predictive overload alert when a point at or beyond the
    /// minimum lead time breaches the critical threshold.
    ///
    /// Picks the earliest qualifying point; confidence scales with how far
    /// the ratio sits above the threshold. Deterministic for identical
    /// inputs.
    pub fn assess_overload(
        &self,
        points: &[ForecastPoint],
        critical_threshold: f64,
        min_lead_time_hours: u32,
    ) -> Option<OverloadAlert> {
        let critical: Vec<&ForecastPoint> = points
            .iter()
            .filter(|p| p.risk_ratio >= critical_threshold && p.offset_hours >= min_lead_time_hours)
            .collect();

        let first = critical.iter().min_by_key(|p| p.offset_hours)?;

        let excess = first.risk_ratio - critical_threshold;
        let confidence = (0.6 + excess / 0.2).min(0.95);

        Some(OverloadAlert {
            alert_type: "PREDICTIVE_OVERLOAD",
            first_critical_hour: first.hour,
            hours_ahead: first.offset_hours,
            predicted_load_kw: first.predicted_load_kw,
            risk_ratio: first.risk_ratio,
            confidence: round3(confidence),
            critical_hours_count: critical.len(),
            recommended_action: recommendation(first.risk_ratio, first.offset_hours),
        })
    }
}

/// Advisory text for an overload alert, keyed on risk magnitude and on how
/// soon the critical hour lands.
fn recommendation(risk_ratio: f64, hours_ahead: u32) -> String {
    let action = if risk_ratio >= 0.98 {
        "Urgent: pre-stage a crew for immediate intervention."
    } else if risk_ratio >= 0.92 {
        "Warning: monitor closely and prepare load management."
    } else {
        "Advisory: voluntary load reduction recommended."
    };

    let timing = if hours_ahead <= 2 {
        format!("Expected in {hours_ahead} hours; immediate action required.")
    } else if hours_ahead >= 6 {
        format!("Expected in {hours_ahead} hours; sufficient time for a planned response.")
    } else {
        format!("Expected in {hours_ahead} hours; coordinate load management ahead of the peak.")
    };

    format!("{action} {timing}")
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}
