//! TOML-based scenario configuration and preset definitions.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::bghi::BghiWeights;

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the baseline scenario. Load from
/// TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Simulation timing and global parameters.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Household smart-meter generation parameters.
    #[serde(default)]
    pub generator: GeneratorConfig,
    /// Consumption-spike detector parameters.
    #[serde(default)]
    pub spike: SpikeConfig,
    /// Sustained-overdraw detector parameters.
    #[serde(default)]
    pub overdraw: OverdrawConfig,
    /// Outage detector parameters.
    #[serde(default)]
    pub outage: OutageConfig,
    /// Feeder/node mismatch detector parameters.
    #[serde(default)]
    pub mismatch: MismatchConfig,
    /// Health-index component weights.
    #[serde(default)]
    pub bghi: BghiWeights,
    /// Load forecaster parameters.
    #[serde(default)]
    pub forecast: ForecastConfig,
    /// Synthetic topology parameters.
    #[serde(default)]
    pub topology: TopologyConfig,
}

/// Simulation timing and global parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Bucket width for instantaneous readings (seconds, must be > 0).
    pub tick_bucket_seconds: i64,
    /// Suggested dashboard refresh interval (seconds).
    pub refresh_interval_seconds: u64,
    /// Master random seed.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_bucket_seconds: 30,
            refresh_interval_seconds: 15,
            seed: 42,
        }
    }
}

/// Household smart-meter generation parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Baseline consumption per household (kW).
    pub base_kw: f64,
    /// Lower clamp for generated readings (kW).
    pub min_kw: f64,
    /// Upper clamp for generated readings (kW, must be > min_kw).
    pub max_kw: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_kw: 0.6,
            min_kw: 0.0,
            max_kw: 20.0,
        }
    }
}

/// Consumption-spike detector parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpikeConfig {
    /// Z-score above the rolling mean that counts as a breach.
    pub z_threshold: f64,
    /// Consecutive breaches required to fire (must be > 0).
    pub persistence_samples: u32,
    /// Absolute floor below which no reading is a spike (kW).
    pub absolute_min_kw: f64,
}

impl Default for SpikeConfig {
    fn default() -> Self {
        Self {
            z_threshold: 3.0,
            persistence_samples: 2,
            absolute_min_kw: 10.0,
        }
    }
}

/// Sustained-overdraw detector parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OverdrawConfig {
    /// Multiple of the hourly baseline that counts as overdraw.
    pub threshold_ratio: f64,
    /// Wall-clock duration the condition must hold (seconds).
    pub min_duration_seconds: i64,
}

impl Default for OverdrawConfig {
    fn default() -> Self {
        Self {
            threshold_ratio: 1.2,
            min_duration_seconds: 600,
        }
    }
}

/// Outage detector parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutageConfig {
    /// Load below this is treated as loss of supply (kW).
    pub threshold_kw: f64,
    /// Wall-clock duration the condition must hold (seconds).
    pub min_duration_seconds: i64,
}

impl Default for OutageConfig {
    fn default() -> Self {
        Self {
            threshold_kw: 0.1,
            min_duration_seconds: 60,
        }
    }
}

/// Feeder/node mismatch detector parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MismatchConfig {
    /// Relative feeder/node gap that counts as a mismatch.
    pub threshold_ratio: f64,
    /// Wall-clock duration the gap must hold (seconds).
    pub min_duration_seconds: i64,
    /// Feeder readings below this are ignored (kW).
    pub min_feeder_kw: f64,
    /// Relative noise injected on the simulated feeder reading (0.0-1.0).
    pub feeder_noise: f64,
}

impl Default for MismatchConfig {
    fn default() -> Self {
        Self {
            threshold_ratio: 0.12,
            min_duration_seconds: 1_800,
            min_feeder_kw: 0.5,
            feeder_noise: 0.05,
        }
    }
}

/// Load forecaster parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForecastConfig {
    /// EWMA smoothing factor (0.0-1.0).
    pub alpha: f64,
    /// Peak hour for synthesized baselines (0-23).
    pub peak_hour: u32,
    /// Risk ratio treated as critical for overload alerts.
    pub critical_threshold: f64,
    /// Minimum lead time before an overload alert is raised (hours).
    pub min_lead_time_hours: u32,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            peak_hour: 19,
            critical_threshold: 0.9,
            min_lead_time_hours: 2,
        }
    }
}

/// Synthetic topology parameters for cities without a CSV layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TopologyConfig {
    /// Distribution transformers per synthesized city (must be > 0).
    pub transformers_per_city: u32,
    /// Minimum buildings per transformer (must be > 0).
    pub buildings_min: u32,
    /// Maximum buildings per transformer (must be >= buildings_min).
    pub buildings_max: u32,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            transformers_per_city: 8,
            buildings_min: 20,
            buildings_max: 60,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"simulation.tick_bucket_seconds"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {} — {}", self.field, self.message)
    }
}

impl ScenarioConfig {
    /// Returns the baseline scenario.
    pub fn baseline() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            generator: GeneratorConfig::default(),
            spike: SpikeConfig::default(),
            overdraw: OverdrawConfig::default(),
            outage: OutageConfig::default(),
            mismatch: MismatchConfig::default(),
            bghi: BghiWeights::default(),
            forecast: ForecastConfig::default(),
            topology: TopologyConfig::default(),
        }
    }

    /// Returns the heat-stress preset: hungrier households and twitchier
    /// detectors, for exercising the alerting path.
    pub fn heat_stress() -> Self {
        Self {
            generator: GeneratorConfig {
                base_kw: 1.0,
                max_kw: 25.0,
                ..GeneratorConfig::default()
            },
            spike: SpikeConfig {
                z_threshold: 2.5,
                ..SpikeConfig::default()
            },
            overdraw: OverdrawConfig {
                threshold_ratio: 1.1,
                min_duration_seconds: 300,
            },
            forecast: ForecastConfig {
                critical_threshold: 0.85,
                ..ForecastConfig::default()
            },
            ..Self::baseline()
        }
    }

    /// Returns the dense-city preset: more, larger transformer zones.
    pub fn dense_city() -> Self {
        Self {
            topology: TopologyConfig {
                transformers_per_city: 16,
                buildings_min: 40,
                buildings_max: 120,
            },
            mismatch: MismatchConfig {
                feeder_noise: 0.08,
                ..MismatchConfig::default()
            },
            ..Self::baseline()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "heat_stress", "dense_city"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "heat_stress" => Ok(Self::heat_stress()),
            "dense_city" => Ok(Self::dense_city()),
            _ => Err(ConfigError {
                field: "preset".to_string(),
                message: format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            }),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "scenario".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.simulation.tick_bucket_seconds <= 0 {
            errors.push(ConfigError {
                field: "simulation.tick_bucket_seconds".into(),
                message: "must be > 0".into(),
            });
        }

        let g = &self.generator;
        if g.min_kw >= g.max_kw {
            errors.push(ConfigError {
                field: "generator.min_kw".into(),
                message: "must be < generator.max_kw".into(),
            });
        }
        if g.base_kw <= 0.0 {
            errors.push(ConfigError {
                field: "generator.base_kw".into(),
                message: "must be > 0".into(),
            });
        }

        if self.spike.persistence_samples == 0 {
            errors.push(ConfigError {
                field: "spike.persistence_samples".into(),
                message: "must be > 0".into(),
            });
        }
        if self.spike.z_threshold <= 0.0 {
            errors.push(ConfigError {
                field: "spike.z_threshold".into(),
                message: "must be > 0".into(),
            });
        }

        if self.overdraw.threshold_ratio <= 1.0 {
            errors.push(ConfigError {
                field: "overdraw.threshold_ratio".into(),
                message: "must be > 1.0".into(),
            });
        }

        if self.outage.threshold_kw <= 0.0 {
            errors.push(ConfigError {
                field: "outage.threshold_kw".into(),
                message: "must be > 0".into(),
            });
        }

        let m = &self.mismatch;
        if !(0.0..1.0).contains(&m.threshold_ratio) || m.threshold_ratio == 0.0 {
            errors.push(ConfigError {
                field: "mismatch.threshold_ratio".into(),
                message: "must be in (0.0, 1.0)".into(),
            });
        }
        if !(0.0..1.0).contains(&m.feeder_noise) {
            errors.push(ConfigError {
                field: "mismatch.feeder_noise".into(),
                message: "must be in [0.0, 1.0)".into(),
            });
        }

        if !self.bghi.is_normalized() {
            errors.push(ConfigError {
                field: "bghi".into(),
                message: format!("weights must sum to 1.0, got {}", self.bghi.sum()),
            });
        }

        let f = &self.forecast;
        if !(0.0..=1.0).contains(&f.alpha) {
            errors.push(ConfigError {
                field: "forecast.alpha".into(),
                message: "must be in [0.0, 1.0]".into(),
            });
        }
        if f.peak_hour > 23 {
            errors.push(ConfigError {
                field: "forecast.peak_hour".into(),
                message: "must be in [0, 23]".into(),
            });
        }
        if f.critical_threshold <= 0.0 {
            errors.push(ConfigError {
                field: "forecast.critical_threshold".into(),
                message: "must be > 0".into(),
            });
        }

        let t = &self.topology;
        if t.transformers_per_city == 0 {
            errors.push(ConfigError {
                field: "topology.transformers_per_city".into(),
                message: "must be > 0".into(),
            });
        }
        if t.buildings_min == 0 || t.buildings_min > t.buildings_max {
            errors.push(ConfigError {
                field: "topology.buildings_min".into(),
                message: "must be > 0 and <= topology.buildings_max".into(),
            });
        }

        errors
    }
}
