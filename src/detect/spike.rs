//! Sudden consumption-spike detection.

use crate::clock::UnixTime;
use crate::stats::RollingWindowStats;

use super::types::{Anomaly, AnomalyEvidence, AnomalyType, Severity};

/// Detects readings significantly above the rolling mean.
///
/// The threshold is `max(absolute_min_kw, mean + z_threshold * std)`; a
/// breach must persist for `persistence_samples` consecutive observations
/// before the detector fires, after which the counter resets.
#[derive(Debug, Clone)]
pub struct SpikeDetector {
    z_threshold: f64,
    persistence_samples: u32,
    absolute_min_kw: f64,
    breach_count: u32,
    breach_since: Option<UnixTime>,
}

impl Default for SpikeDetector {
    fn default() -> Self {
        Self::new(3.0, 2, 10.0)
    }
}

impl SpikeDetector {
    /// Creates a detector.
    ///
    /// # Arguments
    ///
    /// * `z_threshold` - Z-score above the rolling mean that counts as a breach
    /// * `persistence_samples` - Consecutive breaches required to fire
    /// * `absolute_min_kw` - Floor below which no reading is a spike
    ///
    /// # Panics
    ///
    /// Panics if `persistence_samples` is zero.
    pub fn new(z_threshold: f64, persistence_samples: u32, absolute_min_kw: f64) -> Self {
        assert!(persistence_samples > 0, "persistence_samples must be > 0");
        Self {
            z_threshold,
            persistence_samples,
            absolute_min_kw,
            breach_count: 0,
            breach_since: None,
        }
    }

    /// Observes one reading against the current rolling statistics.
    ///
    /// Must be called every tick; the persistence counter depends on
    /// continuous observation.
    pub fn observe(
        &mut self,
        current_kw: f64,
        stats: &RollingWindowStats,
        zone_id: &str,
        now: UnixTime,
    ) -> Option<Anomaly> {
        let mean = stats.mean();
        let std = stats.std();
        let threshold = (mean + self.z_threshold * std).max(self.absolute_min_kw);

        if current_kw > threshold {
            self.breach_count += 1;
            self.breach_since.get_or_insert(now);
        } else {
            self.breach_count = 0;
            self.breach_since = None;
        }

        if self.breach_count < self.persistence_samples {
            return None;
        }

        let z_score = if std > 0.0 {
            (current_kw - mean) / std
        } else {
            0.0
        };

        let severity = if z_score >= 5.0 {
            Severity::High
        } else if z_score >= 3.5 {
            Severity::Medium
        } else {
            Severity::Low
        };

        let confidence = (0.5 + z_score / 10.0).min(0.95);
        let duration = self.breach_since.map_or(0.0, |t| (now - t) as f64);
        self.breach_count = 0;
        self.breach_since = None;

        Some(Anomaly {
            anomaly_type: AnomalyType::Spike,
            zone_id: zone_id.to_string(),
            timestamp: now,
            severity,
            confidence,
            evidence: AnomalyEvidence {
                mean,
                std,
                z_score,
                duration_seconds: duration,
                threshold,
                samples_analyzed: stats.len(),
            },
            recommended_action: "Investigate sudden load increase. Check for equipment \
                                 malfunction or an unauthorized connection.",
        })
    }
}
