//! Barangay-scale electrical grid health simulation and monitoring engine.
//!
//! Synthetic smart meters feed per-transformer rolling statistics, anomaly
//! detectors, a composite health index (BGHI), and a 24-hour load
//! forecaster; the [`grid::GridStore`] orchestrates it all per city and
//! serves the dashboard payload on demand.

#[cfg(feature = "api")]
pub mod api;
pub mod bghi;
pub mod clock;
pub mod config;
pub mod detect;
pub mod forecast;
/// Topology, per-city state, disasters, and the tick orchestrator.
pub mod grid;
pub mod io;
pub mod meter;
pub mod stats;
pub mod weather;
