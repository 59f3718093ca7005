//! Sustained baseline-overdraw detection.

use crate::clock::UnixTime;

use super::types::{Anomaly, AnomalyEvidence, AnomalyType, Severity};

/// Floor applied to the hourly baseline to keep the ratio finite.
const MIN_BASELINE_KW: f64 = 1e-6;

/// Detects a short rolling mean sitting above the same-hour historical
/// baseline for a sustained wall-clock duration.
///
/// The condition's start time is recorded on first breach; the detector
/// fires once elapsed time reaches `min_duration_secs` and keeps firing
/// while the overdraw persists. The start time resets the moment the
/// condition clears.
#[derive(Debug, Clone)]
pub struct OverdrawDetector {
    overdraw_threshold: f64,
    min_duration_secs: i64,
    pending_since: Option<UnixTime>,
}

impl Default for OverdrawDetector {
    fn default() -> Self {
        Self::new(1.2, 600)
    }
}

impl OverdrawDetector {
    /// Creates a detector firing at `overdraw_threshold` times the hourly
    /// baseline sustained for `min_duration_secs`.
    pub fn new(overdraw_threshold: f64, min_duration_secs: i64) -> Self {
        Self {
            overdraw_threshold,
            min_duration_secs,
            pending_since: None,
        }
    }

    /// Observes the current 10-minute rolling mean against the baseline.
    ///
    /// # Arguments
    ///
    /// * `rolling_mean_10min` - Short rolling mean of the transformer load
    /// * `baseline_hourly_kw` - Historical average for the current hour
    /// * `zone_id` - Transformer identity for the anomaly record
    /// * `now` - Explicit current time
    pub fn observe(
        &mut self,
        rolling_mean_10min: f64,
        baseline_hourly_kw: f64,
        zone_id: &str,
        now: UnixTime,
    ) -> Option<Anomaly> {
        let baseline = baseline_hourly_kw.max(MIN_BASELINE_KW);
        let threshold = baseline * self.overdraw_threshold;

        if rolling_mean_10min <= threshold {
            self.pending_since = None;
            return None;
        }

        let since = *self.pending_since.get_or_insert(now);
        let duration = (now - since) as f64;
        if duration < self.min_duration_secs as f64 {
            return None;
        }

        let ratio = rolling_mean_10min / baseline;
        let severity = if ratio >= 1.5 {
            Severity::High
        } else if ratio >= 1.3 {
            Severity::Medium
        } else {
            Severity::Low
        };
        let confidence = (0.6 + duration / 3600.0).min(0.9);

        Some(Anomaly {
            anomaly_type: AnomalyType::SustainedOverdraw,
            zone_id: zone_id.to_string(),
            timestamp: now,
            severity,
            confidence,
            evidence: AnomalyEvidence {
                mean: rolling_mean_10min,
                std: 0.0,
                z_score: 0.0,
                duration_seconds: duration,
                threshold,
                samples_analyzed: 0,
            },
            recommended_action: "Sustained high load detected. Consider load management \
                                 or a capacity upgrade.",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn does_not_fire_before_min_duration() {
        let mut detector = OverdrawDetector::default();
        // 130% of baseline, but only 9 minutes in
        assert!(detector.observe(130.0, 100.0, "T-1", 0).is_none());
        assert!(detector.observe(130.0, 100.0, "T-1", 540).is_none());
    }

    #[test]
    fn fires_after_sustained_duration() {
        let mut detector = OverdrawDetector::default();
        assert!(detector.observe(130.0, 100.0, "T-1", 0).is_none());
        let anomaly = detector
            .observe(130.0, 100.0, "T-1", 600)
            .expect("10 minutes sustained should fire");
        assert_eq!(anomaly.anomaly_type, AnomalyType::SustainedOverdraw);
        assert_eq!(anomaly.severity, Severity::Medium);
        assert!((anomaly.evidence.duration_seconds - 600.0).abs() < 1e-9);
    }

    #[test]
    fn clearing_resets_the_start_time() {
        let mut detector = OverdrawDetector::default();
        assert!(detector.observe(130.0, 100.0, "T-1", 0).is_none());
        // Condition clears at t=300
        assert!(detector.observe(110.0, 100.0, "T-1", 300).is_none());
        // Re-breach: the clock starts over, so t=700 is only 300s in
        assert!(detector.observe(130.0, 100.0, "T-1", 400).is_none());
        assert!(detector.observe(130.0, 100.0, "T-1", 700).is_none());
        assert!(detector.observe(130.0, 100.0, "T-1", 1_000).is_some());
    }

    #[test]
    fn severity_scales_with_ratio() {
        let mut detector = OverdrawDetector::default();
        detector.observe(160.0, 100.0, "T-1", 0);
        let anomaly = detector
            .observe(160.0, 100.0, "T-1", 600)
            .expect("should fire");
        assert_eq!(anomaly.severity, Severity::High);
    }

    #[test]
    fn near_zero_baseline_does_not_divide_by_zero() {
        let mut detector = OverdrawDetector::default();
        detector.observe(5.0, 0.0, "T-1", 0);
        let anomaly = detector.observe(5.0, 0.0, "T-1", 600).expect("should fire");
        assert!(anomaly.confidence.is_finite());
        assert_eq!(anomaly.severity, Severity::High);
    }
}
