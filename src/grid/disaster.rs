//! Operator-triggered outage and disaster overrides.
//!
//! Overrides are time-bounded and expire lazily: expiry is evaluated by
//! comparing an explicitly passed `now` against the recorded start and
//! duration at read time, never by background timers.

use rand::{Rng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::clock::UnixTime;

/// Disaster scenario flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisasterKind {
    Heatwave,
    Typhoon,
    Earthquake,
    Brownout,
    Cyberattack,
    Custom,
}

/// Caller-supplied disaster tuning. Unset fields fall back to per-kind
/// defaults at trigger time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisasterParams {
    /// Multiplicative load factor (heatwave, cyberattack, custom).
    pub load_multiplier: Option<f64>,
    /// Per-household probability of dropping to zero load (typhoon).
    pub outage_probability: Option<f64>,
    /// Additive bias injected into the feeder mismatch ratio (heatwave).
    pub mismatch_bias: Option<f64>,
    /// Deterministic load reduction fraction (brownout).
    pub reduction_fraction: Option<f64>,
    /// Structural damage fraction 0.0-1.0 (earthquake).
    pub damage_factor: Option<f64>,
    /// Forces the whole transformer dark (earthquake roll, custom flag).
    pub force_outage: Option<bool>,
}

/// An operator-triggered outage on one transformer.
#[derive(Debug, Clone, Serialize)]
pub struct ArtificialOutage {
    pub start: UnixTime,
    /// `None` lasts until explicitly cleared.
    pub duration_secs: Option<i64>,
}

impl ArtificialOutage {
    pub fn new(start: UnixTime, duration_secs: Option<i64>) -> Self {
        Self {
            start,
            duration_secs,
        }
    }

    /// Whether the override has run out its duration at `now`.
    pub fn is_expired(&self, now: UnixTime) -> bool {
        self.duration_secs
            .is_some_and(|d| now >= self.start + d)
    }
}

/// An operator-triggered disaster on one transformer.
///
/// Random rolls that must stay stable for the life of the episode (the
/// earthquake's damage and forced-outage decision) are resolved once at
/// trigger time and recorded in `params`.
#[derive(Debug, Clone, Serialize)]
pub struct ArtificialDisaster {
    pub kind: DisasterKind,
    pub params: DisasterParams,
    pub start: UnixTime,
    /// `None` lasts until explicitly cleared.
    pub duration_secs: Option<i64>,
    pub notes: Option<String>,
}

impl ArtificialDisaster {
    /// Triggers a disaster, resolving per-episode random rolls from `rng`.
    pub fn trigger(
        kind: DisasterKind,
        mut params: DisasterParams,
        start: UnixTime,
        duration_secs: Option<i64>,
        notes: Option<String>,
        rng: &mut StdRng,
    ) -> Self {
        if kind == DisasterKind::Earthquake {
            let damage = *params
                .damage_factor
                .get_or_insert_with(|| rng.random_range(0.2..0.8));
            if params.force_outage.is_none() {
                // Heavier damage makes a total trip more likely.
                params.force_outage = Some(rng.random::<f64>() < 0.5 * damage + 0.25);
            }
        }
        Self {
            kind,
            params,
            start,
            duration_secs,
            notes,
        }
    }

    /// Whether the disaster has run out its duration at `now`.
    pub fn is_expired(&self, now: UnixTime) -> bool {
        self.duration_secs
            .is_some_and(|d| now >= self.start + d)
    }

    /// Whether the whole transformer is forced dark.
    pub fn forces_outage(&self) -> bool {
        self.params.force_outage == Some(true)
    }

    /// Transforms one household's raw reading under this disaster.
    pub fn household_load(&self, raw_kw: f64, rng: &mut StdRng) -> f64 {
        match self.kind {
            DisasterKind::Heatwave => raw_kw * self.params.load_multiplier.unwrap_or(1.35),
            DisasterKind::Typhoon => {
                let p = self.params.outage_probability.unwrap_or(0.3);
                if rng.random::<f64>() < p {
                    0.0
                } else {
                    raw_kw * rng.random_range(0.7..1.3)
                }
            }
            DisasterKind::Earthquake => {
                if self.forces_outage() {
                    0.0
                } else {
                    let damage = self.params.damage_factor.unwrap_or(0.5);
                    raw_kw * (1.0 - 0.3 * damage)
                }
            }
            DisasterKind::Brownout => {
                raw_kw * (1.0 - self.params.reduction_fraction.unwrap_or(0.4))
            }
            DisasterKind::Cyberattack => {
                raw_kw
                    * self.params.load_multiplier.unwrap_or(2.0)
                    * rng.random_range(0.8..1.2)
            }
            DisasterKind::Custom => {
                if self.forces_outage() {
                    0.0
                } else {
                    raw_kw * self.params.load_multiplier.unwrap_or(1.0)
                }
            }
        }
    }

    /// Additive bias injected into the feeder mismatch ratio.
    pub fn mismatch_bias(&self) -> f64 {
        match self.kind {
            DisasterKind::Heatwave => self.params.mismatch_bias.unwrap_or(0.05),
            _ => 0.0,
        }
    }

    /// Factor applied to the transformer capacity while active.
    pub fn capacity_factor(&self) -> f64 {
        match self.kind {
            DisasterKind::Earthquake => {
                1.0 - 0.5 * self.params.damage_factor.unwrap_or(0.5)
            }
            _ => 1.0,
        }
    }
}
