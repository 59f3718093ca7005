//! Supply-loss (outage) detection.

use crate::clock::UnixTime;

use super::types::{Anomaly, AnomalyEvidence, AnomalyType, Severity};

/// Detects instantaneous load below a near-zero threshold sustained for a
/// minimum wall-clock duration.
///
/// Fires exactly once per sustained episode: after the alert the `alerted`
/// latch stays set until the load recovers, so continued low readings do
/// not re-alert.
#[derive(Debug, Clone)]
pub struct OutageDetector {
    outage_threshold_kw: f64,
    min_duration_secs: i64,
    pending_since: Option<UnixTime>,
    alerted: bool,
}

impl Default for OutageDetector {
    fn default() -> Self {
        Self::new(0.1, 60)
    }
}

impl OutageDetector {
    /// Creates a detector firing below `outage_threshold_kw` sustained for
    /// `min_duration_secs`.
    pub fn new(outage_threshold_kw: f64, min_duration_secs: i64) -> Self {
        Self {
            outage_threshold_kw,
            min_duration_secs,
            pending_since: None,
            alerted: false,
        }
    }

    /// Observes one instantaneous reading.
    pub fn observe(&mut self, current_kw: f64, zone_id: &str, now: UnixTime) -> Option<Anomaly> {
        if current_kw >= self.outage_threshold_kw {
            // Power restored: new episode may alert again later.
            self.pending_since = None;
            self.alerted = false;
            return None;
        }

        let since = *self.pending_since.get_or_insert(now);
        let duration = (now - since) as f64;
        if duration < self.min_duration_secs as f64 || self.alerted {
            return None;
        }
        self.alerted = true;

        Some(Anomaly {
            anomaly_type: AnomalyType::Outage,
            zone_id: zone_id.to_string(),
            timestamp: now,
            severity: Severity::High,
            confidence: 0.95,
            evidence: AnomalyEvidence {
                mean: current_kw,
                std: 0.0,
                z_score: 0.0,
                duration_seconds: duration,
                threshold: self.outage_threshold_kw,
                samples_analyzed: 0,
            },
            recommended_action: "Power outage detected. Dispatch a crew and notify \
                                 affected residents.",
        })
    }

    /// Seconds since the current low-power episode began, if one is active.
    pub fn pending_duration(&self, now: UnixTime) -> Option<i64> {
        self.pending_since.map(|t| now - t)
    }
}
