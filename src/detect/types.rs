//! Anomaly records shared by all detectors.

use serde::Serialize;

use crate::clock::UnixTime;

/// Anomaly severity tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    High,
    Medium,
    Low,
}

/// Detector that produced an anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyType {
    Spike,
    SustainedOverdraw,
    Outage,
    MeterMismatch,
}

/// Statistical evidence supporting a detection.
#[derive(Debug, Clone, Serialize)]
pub struct AnomalyEvidence {
    /// Mean relevant to the detector (rolling mean, reading, or ratio).
    pub mean: f64,
    /// Rolling standard deviation, `0.0` where not applicable.
    pub std: f64,
    /// Z-score of the triggering reading, `0.0` where not applicable.
    pub z_score: f64,
    /// Wall-clock duration of the condition in seconds.
    pub duration_seconds: f64,
    /// Threshold the reading breached.
    pub threshold: f64,
    /// Number of samples behind the statistics.
    pub samples_analyzed: usize,
}

/// Immutable detected-anomaly record.
///
/// Appended to the owning transformer's anomaly log and pruned by age.
#[derive(Debug, Clone, Serialize)]
pub struct Anomaly {
    pub anomaly_type: AnomalyType,
    pub zone_id: String,
    pub timestamp: UnixTime,
    pub severity: Severity,
    /// Detection confidence in [0, 1].
    pub confidence: f64,
    pub evidence: AnomalyEvidence,
    pub recommended_action: &'static str,
}
