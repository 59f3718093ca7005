//! Feeder-to-node power mismatch detection.

use crate::clock::UnixTime;

use super::types::{Anomaly, AnomalyEvidence, AnomalyType, Severity};

/// Detects a persistent relative gap between the feeder reading and the
/// summed node loads, a signature of non-technical losses or meter drift.
///
/// Readings with feeder power below `min_feeder_kw` are ignored entirely to
/// avoid the ratio blowing up at near-zero load.
#[derive(Debug, Clone)]
pub struct MismatchDetector {
    mismatch_threshold: f64,
    min_duration_secs: i64,
    min_feeder_kw: f64,
    pending_since: Option<UnixTime>,
}

impl Default for MismatchDetector {
    fn default() -> Self {
        Self::new(0.12, 1_800, 0.5)
    }
}

impl MismatchDetector {
    /// Creates a detector firing at `mismatch_threshold` relative gap
    /// sustained for `min_duration_secs`.
    pub fn new(mismatch_threshold: f64, min_duration_secs: i64, min_feeder_kw: f64) -> Self {
        Self {
            mismatch_threshold,
            min_duration_secs,
            min_feeder_kw,
            pending_since: None,
        }
    }

    /// Relative mismatch `|feeder - sum| / feeder`, or `None` below the
    /// feeder floor.
    pub fn ratio(&self, feeder_kw: f64, sum_node_kw: f64) -> Option<f64> {
        if feeder_kw < self.min_feeder_kw {
            return None;
        }
        Some((feeder_kw - sum_node_kw).abs() / feeder_kw)
    }

    /// Observes one feeder/sum reading pair.
    pub fn observe(
        &mut self,
        feeder_kw: f64,
        sum_node_kw: f64,
        zone_id: &str,
        now: UnixTime,
    ) -> Option<Anomaly> {
        let Some(ratio) = self.ratio(feeder_kw, sum_node_kw) else {
            return None;
        };

        if ratio < self.mismatch_threshold {
            self.pending_since = None;
            return None;
        }

        let since = *self.pending_since.get_or_insert(now);
        let duration = (now - since) as f64;
        if duration < self.min_duration_secs as f64 {
            return None;
        }

        let severity = if ratio >= 0.25 {
            Severity::High
        } else if ratio >= 0.18 {
            Severity::Medium
        } else {
            Severity::Low
        };
        let confidence = (0.5 + duration / 7200.0).min(0.85);

        Some(Anomaly {
            anomaly_type: AnomalyType::MeterMismatch,
            zone_id: zone_id.to_string(),
            timestamp: now,
            severity,
            confidence,
            evidence: AnomalyEvidence {
                mean: ratio,
                std: 0.0,
                z_score: 0.0,
                duration_seconds: duration,
                threshold: self.mismatch_threshold,
                samples_analyzed: 0,
            },
            recommended_action: "Significant feeder/node mismatch. Possible non-technical \
                                 loss or meter calibration issue; schedule an inspection.",
        })
    }
}
