//! Streaming anomaly detection over rolling load statistics.
//!
//! Four independently stateful detectors, each reinvoked every tick even
//! when silent: internal persistence counters and timers depend on
//! continuous observation. All "sustained" semantics compare an explicitly
//! passed current time against a recorded `pending_since` timestamp, so the
//! detectors stay deterministic and tick-rate independent.

/// Feeder-to-node mismatch detection.
pub mod mismatch;
/// Supply-loss detection.
pub mod outage;
/// Sustained baseline-overdraw detection.
pub mod overdraw;
/// Sudden consumption-spike detection.
pub mod spike;
pub mod types;

pub use mismatch::MismatchDetector;
pub use outage::OutageDetector;
pub use overdraw::OverdrawDetector;
pub use spike::SpikeDetector;
pub use types::{Anomaly, AnomalyEvidence, AnomalyType, Severity};
