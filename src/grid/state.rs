//! Per-city mutable simulation state: households, transformers, histories.

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::clock::{self, UnixTime};
use crate::config::ScenarioConfig;
use crate::detect::{
    Anomaly, MismatchDetector, OutageDetector, OverdrawDetector, SpikeDetector,
};
use crate::forecast::EwmaForecaster;
use crate::grid::disaster::{ArtificialDisaster, ArtificialOutage};
use crate::grid::topology::{Topology, TransformerKind};
use crate::meter::SmartMeter;
use crate::stats::RollingWindowStats;

/// History entries older than this are pruned.
const HISTORY_RETENTION_SECS: i64 = clock::DAY_SECS;

/// Thermal model constants: heat input per kW of load, ambient coupling,
/// and thermal mass. Values give realistic multi-hour time constants.
const HEAT_PER_KW: f64 = 0.8;
const AMBIENT_COUPLING: f64 = 0.5;
const THERMAL_MASS: f64 = 50.0;

/// One household behind a pole/pad transformer.
#[derive(Debug)]
pub struct HouseholdState {
    pub meter: SmartMeter,
    pub latitude: f64,
    pub longitude: f64,
    /// Last disaster-adjusted reading pushed through a tick.
    pub latest_kw: f64,
    /// `(timestamp, load_kw)` pairs, pruned to 24 h.
    load_history: Vec<(UnixTime, f64)>,
}

impl HouseholdState {
    pub fn new(meter: SmartMeter, latitude: f64, longitude: f64) -> Self {
        Self {
            meter,
            latitude,
            longitude,
            latest_kw: 0.0,
            load_history: Vec::new(),
        }
    }

    /// Records a tick reading into the 24 h history and refreshes
    /// `latest_kw`. Re-reads within a bucket should set `latest_kw`
    /// directly instead of appending duplicates.
    pub fn record_load(&mut self, now: UnixTime, load_kw: f64) {
        self.latest_kw = load_kw;
        self.load_history.push((now, load_kw));
        let cutoff = now - HISTORY_RETENTION_SECS;
        self.load_history.retain(|(ts, _)| *ts >= cutoff);
    }

    /// 24 h reading history, oldest first.
    pub fn load_history(&self) -> &[(UnixTime, f64)] {
        &self.load_history
    }
}

/// Per-transformer mutable state: live stats, detectors, bounded 24 h
/// histories, forecaster, and transient overrides.
#[derive(Debug)]
pub struct TransformerState {
    pub kind: TransformerKind,
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Downstream buildings served (zero for the substation).
    pub buildings: u32,
    /// Household ids drawing through this transformer.
    pub household_ids: Vec<String>,
    /// Rated capacity (kW).
    pub capacity_kw: f64,

    pub stats: RollingWindowStats,
    pub spike_detector: SpikeDetector,
    pub overdraw_detector: OverdrawDetector,
    pub outage_detector: OutageDetector,
    pub mismatch_detector: MismatchDetector,
    pub forecaster: EwmaForecaster,

    /// `(timestamp, load_kw)` pairs, pruned to 24 h.
    load_history: Vec<(UnixTime, f64)>,
    /// Timestamps of detected spikes, pruned to 24 h.
    spike_timestamps: Vec<UnixTime>,
    /// `(timestamp, in_outage)` flags, pruned to 24 h.
    outage_flags: Vec<(UnixTime, bool)>,
    /// `(timestamp, ratio)` mismatch bookkeeping, pruned to 24 h.
    mismatch_ratios: Vec<(UnixTime, f64)>,
    /// Full anomaly records, pruned to 24 h.
    anomaly_log: Vec<Anomaly>,

    /// Operator-triggered outage override.
    pub artificial_outage: Option<ArtificialOutage>,
    /// Operator-triggered disaster override.
    pub artificial_disaster: Option<ArtificialDisaster>,

    /// Estimated winding temperature (degC).
    pub temperature_c: f64,
    /// Tick timestamp of the last completed update.
    pub last_updated: Option<UnixTime>,
}

impl TransformerState {
    /// Rated capacity from downstream building count.
    pub fn rated_capacity_kw(buildings: u32) -> f64 {
        (f64::from(buildings) * 5.0).max(100.0)
    }

    fn new(
        kind: TransformerKind,
        id: String,
        latitude: f64,
        longitude: f64,
        buildings: u32,
        household_ids: Vec<String>,
        config: &ScenarioConfig,
    ) -> Self {
        let capacity_kw = Self::rated_capacity_kw(buildings);
        let mut forecaster = EwmaForecaster::new(config.forecast.alpha);
        // Until enough history accrues, forecast off a synthesized curve
        // shaped by the transformer's own capacity.
        forecaster.synthesize_baseline(
            config.forecast.peak_hour,
            capacity_kw * 0.8,
            capacity_kw * 0.4,
        );

        Self {
            kind,
            id,
            latitude,
            longitude,
            buildings,
            household_ids,
            capacity_kw,
            stats: RollingWindowStats::new(120),
            spike_detector: SpikeDetector::new(
                config.spike.z_threshold,
                config.spike.persistence_samples,
                config.spike.absolute_min_kw,
            ),
            overdraw_detector: OverdrawDetector::new(
                config.overdraw.threshold_ratio,
                config.overdraw.min_duration_seconds,
            ),
            outage_detector: OutageDetector::new(
                config.outage.threshold_kw,
                config.outage.min_duration_seconds,
            ),
            mismatch_detector: MismatchDetector::new(
                config.mismatch.threshold_ratio,
                config.mismatch.min_duration_seconds,
                config.mismatch.min_feeder_kw,
            ),
            forecaster,
            load_history: Vec::new(),
            spike_timestamps: Vec::new(),
            outage_flags: Vec::new(),
            mismatch_ratios: Vec::new(),
            anomaly_log: Vec::new(),
            artificial_outage: None,
            artificial_disaster: None,
            temperature_c: 25.0,
            last_updated: None,
        }
    }

    /// The active outage override, expiring it lazily at `now`.
    pub fn active_outage(&mut self, now: UnixTime) -> Option<&ArtificialOutage> {
        if self
            .artificial_outage
            .as_ref()
            .is_some_and(|o| o.is_expired(now))
        {
            self.artificial_outage = None;
        }
        self.artificial_outage.as_ref()
    }

    /// The active disaster override, expiring it lazily at `now`.
    pub fn active_disaster(&mut self, now: UnixTime) -> Option<&ArtificialDisaster> {
        if self
            .artificial_disaster
            .as_ref()
            .is_some_and(|d| d.is_expired(now))
        {
            self.artificial_disaster = None;
        }
        self.artificial_disaster.as_ref()
    }

    /// Effective capacity, derated while a disaster is active.
    pub fn effective_capacity_kw(&mut self, now: UnixTime) -> f64 {
        let factor = self
            .active_disaster(now)
            .map_or(1.0, ArtificialDisaster::capacity_factor);
        self.capacity_kw * factor
    }

    /// Appends one load reading to the 24 h history.
    pub fn record_load(&mut self, now: UnixTime, load_kw: f64) {
        self.load_history.push((now, load_kw));
    }

    /// Appends one outage flag to the 24 h history.
    pub fn record_outage_flag(&mut self, now: UnixTime, in_outage: bool) {
        self.outage_flags.push((now, in_outage));
    }

    /// Appends one mismatch ratio to the 24 h history.
    pub fn record_mismatch(&mut self, now: UnixTime, ratio: f64) {
        self.mismatch_ratios.push((now, ratio));
    }

    /// Appends one anomaly, tracking spike timestamps separately.
    pub fn record_anomaly(&mut self, anomaly: Anomaly) {
        if anomaly.anomaly_type == crate::detect::AnomalyType::Spike {
            self.spike_timestamps.push(anomaly.timestamp);
        }
        self.anomaly_log.push(anomaly);
    }

    /// Drops history entries older than 24 h.
    pub fn prune(&mut self, now: UnixTime) {
        let cutoff = now - HISTORY_RETENTION_SECS;
        self.load_history.retain(|(ts, _)| *ts >= cutoff);
        self.spike_timestamps.retain(|ts| *ts >= cutoff);
        self.outage_flags.retain(|(ts, _)| *ts >= cutoff);
        self.mismatch_ratios.retain(|(ts, _)| *ts >= cutoff);
        self.anomaly_log.retain(|a| a.timestamp >= cutoff);
    }

    /// Historical average load for the hour `now` falls in.
    ///
    /// Early in a transformer's life no same-hour samples exist yet; the
    /// latest reading stands in for the baseline (cold-start fallback).
    pub fn hourly_baseline(&self, now: UnixTime) -> f64 {
        let hour = clock::hour_of_day(now);
        let mut sum = 0.0;
        let mut count = 0_usize;
        for (ts, kw) in &self.load_history {
            if clock::hour_of_day(*ts) == hour {
                sum += kw;
                count += 1;
            }
        }
        if count > 0 {
            sum / count as f64
        } else {
            self.load_history.last().map_or(0.0, |(_, kw)| *kw)
        }
    }

    /// Minutes spent flagged in outage over the last 24 h.
    ///
    /// Each flagged sample contributes the gap to its predecessor, so the
    /// figure is cadence-independent.
    pub fn outage_minutes_24h(&self) -> f64 {
        let mut seconds = 0.0;
        for pair in self.outage_flags.windows(2) {
            let (prev_ts, _) = pair[0];
            let (ts, flagged) = pair[1];
            if flagged {
                seconds += (ts - prev_ts) as f64;
            }
        }
        seconds / 60.0
    }

    /// Spike events over the last 24 h.
    pub fn spike_count_24h(&self) -> usize {
        self.spike_timestamps.len()
    }

    /// Anomaly events of all types over the last 24 h.
    pub fn anomaly_count_24h(&self) -> usize {
        self.anomaly_log.len()
    }

    /// Most recent mismatch ratio, zero before the first reading.
    pub fn latest_mismatch_ratio(&self) -> f64 {
        self.mismatch_ratios.last().map_or(0.0, |(_, r)| *r)
    }

    /// Anomalies recorded in the last 24 h, oldest first.
    pub fn anomalies(&self) -> &[Anomaly] {
        &self.anomaly_log
    }

    /// Latest recorded load, zero before the first tick.
    pub fn latest_load_kw(&self) -> f64 {
        self.load_history.last().map_or(0.0, |(_, kw)| *kw)
    }

    /// Advances the winding temperature estimate one tick.
    ///
    /// Load heats the windings, ambient coupling bleeds heat off; the
    /// estimate is clamped to a physically plausible 20-120 degC band.
    pub fn update_thermal(&mut self, load_kw: f64, ambient_c: f64) {
        let heat_in = HEAT_PER_KW * load_kw;
        let cooling = AMBIENT_COUPLING * (self.temperature_c - ambient_c);
        self.temperature_c =
            (self.temperature_c + (heat_in - cooling) / THERMAL_MASS).clamp(20.0, 120.0);
    }
}

/// All mutable state for one city.
///
/// `BTreeMap`s keep iteration order stable, so a full-city tick touches
/// transformers and households in a deterministic order.
#[derive(Debug)]
pub struct CityState {
    pub name: String,
    pub substation: TransformerState,
    pub pole_pads: BTreeMap<String, TransformerState>,
    pub households: BTreeMap<String, HouseholdState>,
    /// City-scoped random source for feeder noise and disaster rolls.
    pub rng: StdRng,
}

impl CityState {
    /// Builds city state from a validated topology.
    ///
    /// One [`SmartMeter`] per downstream building, seeded from the master
    /// seed and a per-household counter so layouts are reproducible.
    pub fn from_topology(name: &str, topology: &Topology, config: &ScenarioConfig) -> Self {
        let seed = config.simulation.seed;
        let mut rng = StdRng::seed_from_u64(seed ^ 0x9e37_79b9_7f4a_7c15);
        let g = &config.generator;

        let mut households = BTreeMap::new();
        let mut pole_pads = BTreeMap::new();
        let mut meter_counter = 0_u64;

        for pp in &topology.pole_pads {
            let mut ids = Vec::with_capacity(pp.buildings as usize);
            for n in 1..=pp.buildings {
                let hid = format!("{}-H-{n:03}", pp.id);
                meter_counter += 1;
                // Small per-household base spread around the configured base
                let base = g.base_kw * rng.random_range(0.7..1.3);
                let meter = SmartMeter::new(
                    hid.clone(),
                    g.min_kw,
                    g.max_kw,
                    base,
                    seed.wrapping_add(meter_counter),
                );
                // Scattered within a few hundred meters of the pole/pad
                let lat = pp.latitude + rng.random_range(-0.003..0.003);
                let lon = pp.longitude + rng.random_range(-0.003..0.003);
                households.insert(hid.clone(), HouseholdState::new(meter, lat, lon));
                ids.push(hid);
            }
            pole_pads.insert(
                pp.id.clone(),
                TransformerState::new(
                    TransformerKind::PolePad,
                    pp.id.clone(),
                    pp.latitude,
                    pp.longitude,
                    pp.buildings,
                    ids,
                    config,
                ),
            );
        }

        let sub = &topology.substation;
        let substation = TransformerState::new(
            TransformerKind::Substation,
            sub.id.clone(),
            sub.latitude,
            sub.longitude,
            topology.total_buildings(),
            Vec::new(),
            config,
        );

        Self {
            name: name.to_string(),
            substation,
            pole_pads,
            households,
            rng,
        }
    }

    /// Looks up any transformer (substation included) by id.
    pub fn transformer_mut(&mut self, id: &str) -> Option<&mut TransformerState> {
        if self.substation.id == id {
            return Some(&mut self.substation);
        }
        self.pole_pads.get_mut(id)
    }

    /// All transformer ids, substation first.
    pub fn transformer_ids(&self) -> Vec<String> {
        std::iter::once(self.substation.id.clone())
            .chain(self.pole_pads.keys().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::disaster::DisasterKind;
    use crate::grid::disaster::DisasterParams;

    fn city() -> CityState {
        let config = ScenarioConfig::baseline();
        let topology = Topology::demo_city("Testville", 42, 4, 10, 20);
        CityState::from_topology("Testville", &topology, &config)
    }

    #[test]
    fn construction_wires_households_to_transformers() {
        let city = city();
        assert_eq!(city.pole_pads.len(), 4);
        let wired: usize = city.pole_pads.values().map(|t| t.household_ids.len()).sum();
        assert_eq!(wired, city.households.len());
        for t in city.pole_pads.values() {
            assert_eq!(t.household_ids.len(), t.buildings as usize);
            for hid in &t.household_ids {
                assert!(city.households.contains_key(hid));
            }
        }
    }

    #[test]
    fn households_sit_near_their_pole_pad() {
        let city = city();
        for t in city.pole_pads.values() {
            for hid in &t.household_ids {
                let h = &city.households[hid];
                assert!((h.latitude - t.latitude).abs() <= 0.003);
                assert!((h.longitude - t.longitude).abs() <= 0.003);
                assert!(h.load_history().is_empty());
            }
        }
    }

    #[test]
    fn household_history_is_pruned_to_24h() {
        let mut city = city();
        let hid = city.households.keys().next().cloned().unwrap_or_default();
        let h = city.households.get_mut(&hid).expect("household");

        h.record_load(0, 1.0);
        h.record_load(clock::DAY_SECS - 60, 2.0);
        h.record_load(clock::DAY_SECS + 120, 3.0);
        // The t=0 reading aged out of the 24 h window
        assert_eq!(h.load_history().len(), 2);
        assert_eq!(h.load_history()[0], (clock::DAY_SECS - 60, 2.0));
        assert_eq!(h.latest_kw, 3.0);
    }

    #[test]
    fn capacity_has_a_floor() {
        assert_eq!(TransformerState::rated_capacity_kw(3), 100.0);
        assert_eq!(TransformerState::rated_capacity_kw(50), 250.0);
    }

    #[test]
    fn substation_serves_no_households_directly() {
        let city = city();
        assert!(city.substation.household_ids.is_empty());
        assert_eq!(city.substation.kind, TransformerKind::Substation);
    }

    #[test]
    fn outage_override_expires_lazily() {
        let mut city = city();
        let id = city.pole_pads.keys().next().cloned().unwrap_or_default();
        let t = city.pole_pads.get_mut(&id).expect("transformer");
        t.artificial_outage = Some(ArtificialOutage::new(1_000, Some(300)));

        assert!(t.active_outage(1_100).is_some());
        assert!(t.active_outage(1_300).is_none());
        // Internal record cleared; the second check is a no-op
        assert!(t.artificial_outage.is_none());
        assert!(t.active_outage(1_301).is_none());
    }

    #[test]
    fn disaster_derates_effective_capacity() {
        let mut city = city();
        let id = city.pole_pads.keys().next().cloned().unwrap_or_default();
        let t = city.pole_pads.get_mut(&id).expect("transformer");
        let rated = t.capacity_kw;
        t.artificial_disaster = Some(ArtificialDisaster::trigger(
            DisasterKind::Earthquake,
            DisasterParams {
                damage_factor: Some(0.6),
                force_outage: Some(false),
                ..DisasterParams::default()
            },
            0,
            None,
            None,
            &mut city.rng,
        ));
        assert!((t.effective_capacity_kw(10) - rated * 0.7).abs() < 1e-9);
    }

    #[test]
    fn hourly_baseline_cold_start_falls_back_to_latest() {
        let mut city = city();
        let id = city.pole_pads.keys().next().cloned().unwrap_or_default();
        let t = city.pole_pads.get_mut(&id).expect("transformer");
        assert_eq!(t.hourly_baseline(0), 0.0);

        // One sample at hour 2; baseline query at hour 10 has no same-hour
        // history and falls back to the latest reading
        t.record_load(2 * 3_600, 42.0);
        assert_eq!(t.hourly_baseline(10 * 3_600), 42.0);
        // Same-hour query uses the real average
        t.record_load(2 * 3_600 + 60, 44.0);
        assert!((t.hourly_baseline(2 * 3_600 + 120) - 43.0).abs() < 1e-9);
    }

    #[test]
    fn outage_minutes_integrate_flag_gaps() {
        let mut city = city();
        let id = city.pole_pads.keys().next().cloned().unwrap_or_default();
        let t = city.pole_pads.get_mut(&id).expect("transformer");
        // 30 s cadence, flagged for 4 of 5 intervals
        t.record_outage_flag(0, false);
        for i in 1..=4_i64 {
            t.record_outage_flag(i * 30, true);
        }
        t.record_outage_flag(150, false);
        assert!((t.outage_minutes_24h() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn prune_drops_only_stale_entries() {
        let mut city = city();
        let id = city.pole_pads.keys().next().cloned().unwrap_or_default();
        let t = city.pole_pads.get_mut(&id).expect("transformer");
        t.record_load(0, 1.0);
        t.record_load(100_000, 2.0);
        t.prune(100_000);
        assert_eq!(t.latest_load_kw(), 2.0);
        // The t=0 sample fell outside the 24 h window
        assert_eq!(t.hourly_baseline(100_000 + 13 * 3_600), 2.0);
    }

    #[test]
    fn thermal_estimate_stays_clamped() {
        let mut city = city();
        let id = city.pole_pads.keys().next().cloned().unwrap_or_default();
        let t = city.pole_pads.get_mut(&id).expect("transformer");
        for _ in 0..10_000 {
            t.update_thermal(10_000.0, 45.0);
        }
        assert!(t.temperature_c <= 120.0);
        for _ in 0..10_000 {
            t.update_thermal(0.0, -50.0);
        }
        assert!(t.temperature_c >= 20.0);
    }

    #[test]
    fn same_seed_builds_identical_cities() {
        let a = city();
        let b = city();
        assert_eq!(a.households.len(), b.households.len());
        for (ida, idb) in a.households.keys().zip(b.households.keys()) {
            assert_eq!(ida, idb);
        }
        for (ta, tb) in a.pole_pads.values().zip(b.pole_pads.values()) {
            assert_eq!(ta.capacity_kw, tb.capacity_kw);
        }
    }
}
