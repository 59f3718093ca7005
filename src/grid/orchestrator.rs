//! The grid store: city registry, tick pipeline, and control operations.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::Rng;
use serde::Serialize;

use crate::bghi::{self, BghiComponents, BghiResult};
use crate::clock::{self, UnixTime};
use crate::config::ScenarioConfig;
use crate::detect::Anomaly;
use crate::forecast::{BaselineNotSet, OverloadAlert, RiskLevel};
use crate::grid::disaster::{ArtificialDisaster, ArtificialOutage, DisasterKind, DisasterParams};
use crate::grid::state::CityState;
use crate::grid::summary::{self, CitySummary, TransformerDigest};
use crate::grid::topology::{Topology, TransformerKind};
use crate::weather::{SyntheticWeather, Weather, WeatherProvider};

/// The dashboard payload keeps at most this many anomalies, newest first.
const MAX_DASHBOARD_ANOMALIES: usize = 50;

/// Span of the short rolling mean the overdraw detector compares against
/// its hourly baseline.
const OVERDRAW_MEAN_WINDOW_SECS: i64 = 600;

/// Tick failure surfaced to the boundary.
#[derive(Debug)]
pub enum GridError {
    /// Forecaster was asked to project without a baseline.
    Forecast(BaselineNotSet),
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forecast(e) => write!(f, "tick failed: {e}"),
        }
    }
}

impl std::error::Error for GridError {}

impl From<BaselineNotSet> for GridError {
    fn from(e: BaselineNotSet) -> Self {
        Self::Forecast(e)
    }
}

/// One transformer's tick output.
#[derive(Debug, Clone, Serialize)]
pub struct TransformerSnapshot {
    pub id: String,
    pub kind: TransformerKind,
    pub latitude: f64,
    pub longitude: f64,
    pub buildings: u32,
    pub load_kw: f64,
    pub capacity_kw: f64,
    /// Load as a percentage of effective capacity.
    pub load_pct: f64,
    /// Estimated winding temperature (degC).
    pub temperature_c: f64,
    pub bghi: BghiResult,
    /// Whether the load currently reads as lost supply.
    pub is_in_outage: bool,
    /// Whether an operator-triggered outage is active.
    pub in_artificial_outage: bool,
    /// Active disaster kind, if any.
    pub disaster: Option<DisasterKind>,
    pub mismatch_ratio: f64,
    pub anomaly_count_24h: usize,
    /// Worst risk ratio across the 24 h forecast.
    pub peak_risk_ratio: f64,
    pub peak_risk_level: RiskLevel,
}

/// Full dashboard payload for one city, produced by a single tick.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardData {
    pub summary: CitySummary,
    pub transformers: Vec<TransformerSnapshot>,
    /// Predictive overload alerts raised this tick.
    pub alerts: Vec<OverloadAlert>,
    /// Recent anomaly records across all transformers, newest first.
    pub anomalies: Vec<Anomaly>,
    pub weather: Weather,
    pub refresh_interval_seconds: u64,
    pub updated_at: UnixTime,
}

/// Structured result of a control operation. Control ops never error
/// across the boundary; failures come back as `success: false`.
#[derive(Debug, Clone, Serialize)]
pub struct ControlResult {
    pub success: bool,
    pub message: String,
    pub transformers_affected: Vec<String>,
}

impl ControlResult {
    fn ok(message: impl Into<String>, affected: Vec<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            transformers_affected: affected,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            transformers_affected: Vec::new(),
        }
    }
}

/// Process-lifetime registry of per-city simulation state.
///
/// Cities are created on first access from a seeded demo topology (or a
/// pre-registered one) and live until [`GridStore::reset`]. Each city sits
/// behind its own mutex, so concurrent ticks for different cities proceed
/// in parallel while per-city access stays serialized.
pub struct GridStore {
    cities: Mutex<HashMap<String, Arc<Mutex<CityState>>>>,
    config: ScenarioConfig,
    weather: Mutex<Box<dyn WeatherProvider + Send>>,
    /// Stand-in weather used when the injected provider fails.
    fallback_weather: Mutex<SyntheticWeather>,
}

impl fmt::Debug for GridStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridStore").finish_non_exhaustive()
    }
}

/// Poisoning only happens if a panic escaped mid-tick; the state is still
/// structurally sound, so recover the guard instead of propagating.
fn relock<'a, T>(
    result: Result<MutexGuard<'a, T>, PoisonError<MutexGuard<'a, T>>>,
) -> MutexGuard<'a, T> {
    result.unwrap_or_else(PoisonError::into_inner)
}

impl GridStore {
    /// Creates a store with the synthetic weather provider.
    pub fn new(config: ScenarioConfig) -> Self {
        let seed = config.simulation.seed;
        Self::with_weather(config, Box::new(SyntheticWeather::new(seed)))
    }

    /// Creates a store with an injected weather provider.
    pub fn with_weather(config: ScenarioConfig, weather: Box<dyn WeatherProvider + Send>) -> Self {
        let seed = config.simulation.seed;
        Self {
            cities: Mutex::new(HashMap::new()),
            config,
            weather: Mutex::new(weather),
            fallback_weather: Mutex::new(SyntheticWeather::new(seed ^ 0x5eed)),
        }
    }

    /// The active scenario configuration.
    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Registers an explicit topology for `city`, replacing any existing
    /// state. Cities without a registered topology get a synthesized one
    /// on first access.
    pub fn register_city(&self, city: &str, topology: &Topology) {
        let state = CityState::from_topology(city, topology, &self.config);
        relock(self.cities.lock()).insert(city.to_string(), Arc::new(Mutex::new(state)));
    }

    /// Drops all city state. Intended for tests and scenario restarts.
    pub fn reset(&self) {
        relock(self.cities.lock()).clear();
    }

    /// Names of all cities currently materialized.
    pub fn city_names(&self) -> Vec<String> {
        let mut names: Vec<String> = relock(self.cities.lock()).keys().cloned().collect();
        names.sort();
        names
    }

    fn city(&self, name: &str) -> Arc<Mutex<CityState>> {
        let mut cities = relock(self.cities.lock());
        cities
            .entry(name.to_string())
            .or_insert_with(|| {
                let t = &self.config.topology;
                let topology = Topology::demo_city(
                    name,
                    self.config.simulation.seed,
                    t.transformers_per_city,
                    t.buildings_min,
                    t.buildings_max,
                );
                Arc::new(Mutex::new(CityState::from_topology(
                    name,
                    &topology,
                    &self.config,
                )))
            })
            .clone()
    }

    fn current_weather(&self, city: &str, now: UnixTime) -> Weather {
        let attempt = relock(self.weather.lock()).current(city, now);
        match attempt {
            Ok(w) => w,
            // Transient external failure: degrade to synthetic, never abort
            Err(_) => relock(self.fallback_weather.lock())
                .current(city, now)
                .unwrap_or(Weather {
                    temperature_c: 28.0,
                    humidity_pct: 75.0,
                    pressure_hpa: 1_010.0,
                    wind_speed_mps: 2.0,
                    condition: "partly cloudy".to_string(),
                }),
        }
    }

    /// Runs one tick for `city` and assembles the dashboard payload.
    ///
    /// Safe to call repeatedly at any cadence; readings are bucketed so
    /// re-reads within the same bucket see identical loads.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::Forecast`] if a transformer's forecaster lost
    /// its baseline, which indicates a construction bug.
    pub fn tick_and_read(&self, city: &str, now: UnixTime) -> Result<DashboardData, GridError> {
        let weather = self.current_weather(city, now);
        let city_arc = self.city(city);
        let mut state = relock(city_arc.lock());

        let bucket = self.config.simulation.tick_bucket_seconds;
        let feeder_noise = self.config.mismatch.feeder_noise;
        let outage_threshold = self.config.outage.threshold_kw;
        let hour = clock::hour_of_day(now);

        let mut snapshots = Vec::with_capacity(state.pole_pads.len() + 1);
        let mut digests = Vec::with_capacity(state.pole_pads.len());
        let mut alerts = Vec::new();
        let mut total_load_kw = 0.0;

        let ids: Vec<String> = state.pole_pads.keys().cloned().collect();
        for id in &ids {
            let Some((snapshot, alert)) = self.tick_transformer(
                &mut state, id, now, hour, bucket, feeder_noise, outage_threshold, &weather,
            )?
            else {
                continue;
            };
            total_load_kw += snapshot.load_kw;
            digests.push(TransformerDigest {
                bghi_score: snapshot.bghi.bghi_score,
                status: snapshot.bghi.status,
                buildings: snapshot.buildings,
                load_pct: snapshot.load_pct,
                load_kw: snapshot.load_kw,
            });
            snapshots.push(snapshot);
            alerts.extend(alert);
        }

        // Substation pass: no direct load and no spike/overdraw/outage
        // detection, but mismatch bookkeeping runs against the city total.
        let sub_snapshot =
            self.tick_substation(&mut state, now, total_load_kw, feeder_noise, &weather)?;
        snapshots.insert(0, sub_snapshot);

        let mut anomalies: Vec<Anomaly> = std::iter::once(&state.substation)
            .chain(state.pole_pads.values())
            .flat_map(|t| t.anomalies().iter().cloned())
            .collect();
        anomalies.sort_by_key(|a| std::cmp::Reverse(a.timestamp));
        anomalies.truncate(MAX_DASHBOARD_ANOMALIES);

        Ok(DashboardData {
            summary: summary::summarize(city, &digests, now),
            transformers: snapshots,
            alerts,
            anomalies,
            weather,
            refresh_interval_seconds: self.config.simulation.refresh_interval_seconds,
            updated_at: now,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn tick_transformer(
        &self,
        state: &mut CityState,
        id: &str,
        now: UnixTime,
        hour: u32,
        bucket: i64,
        feeder_noise: f64,
        outage_threshold: f64,
        weather: &Weather,
    ) -> Result<Option<(TransformerSnapshot, Option<OverloadAlert>)>, GridError> {
        // Resolve overrides first so expiry happens before load generation.
        // Re-reads within an already-sampled bucket refresh live values but
        // must not push duplicate samples into the rolling windows.
        let bucket_start = clock::truncate_to_bucket(now, bucket);
        let Some((in_artificial_outage, disaster, new_bucket)) =
            state.pole_pads.get_mut(id).map(|t| {
                let in_outage = t.active_outage(now).is_some();
                let disaster = t.active_disaster(now).cloned();
                let new_bucket = t
                    .stats
                    .latest_timestamp()
                    .is_none_or(|ts| clock::truncate_to_bucket(ts, bucket) < bucket_start);
                (in_outage, disaster, new_bucket)
            })
        else {
            return Ok(None);
        };
        let forced_dark =
            in_artificial_outage || disaster.as_ref().is_some_and(ArtificialDisaster::forces_outage);

        // Household pass: generate, disaster-adjust, sum
        let household_ids = state
            .pole_pads
            .get(id)
            .map(|t| t.household_ids.clone())
            .unwrap_or_default();
        let mut sum_kw = 0.0;
        for hid in &household_ids {
            let Some(h) = state.households.get_mut(hid) else {
                continue;
            };
            let adjusted = if forced_dark {
                0.0
            } else {
                let raw = h
                    .meter
                    .instantaneous(now, bucket, Some(weather.temperature_c));
                match &disaster {
                    Some(d) => d.household_load(raw, &mut state.rng),
                    None => raw,
                }
            };
            if new_bucket {
                h.record_load(now, adjusted);
            } else {
                h.latest_kw = adjusted;
            }
            sum_kw += adjusted;
        }

        // Simulated feeder reading: the household sum plus measurement
        // noise and any disaster-injected bias.
        let bias = disaster.as_ref().map_or(0.0, ArtificialDisaster::mismatch_bias);
        let feeder_kw = sum_kw * (1.0 + state.rng.random_range(-feeder_noise..=feeder_noise) + bias);

        let Some(t) = state.pole_pads.get_mut(id) else {
            return Ok(None);
        };

        let load_kw = sum_kw;
        t.record_load(now, load_kw);
        if new_bucket {
            t.stats.add(load_kw, now);
        }

        // Detectors, in a fixed order so anomaly logs are deterministic
        let baseline = t.hourly_baseline(now);
        let rolling_10min = t.stats.mean_since(now - OVERDRAW_MEAN_WINDOW_SECS);
        let mut fired = Vec::new();
        if let Some(a) = t.spike_detector.observe(load_kw, &t.stats, id, now) {
            fired.push(a);
        }
        if let Some(a) = t.overdraw_detector.observe(rolling_10min, baseline, id, now) {
            fired.push(a);
        }
        if let Some(a) = t.outage_detector.observe(load_kw, id, now) {
            fired.push(a);
        }
        if let Some(a) = t.mismatch_detector.observe(feeder_kw, load_kw, id, now) {
            fired.push(a);
        }
        for a in fired {
            t.record_anomaly(a);
        }

        let mismatch_ratio = t.mismatch_detector.ratio(feeder_kw, load_kw).unwrap_or(0.0);
        t.record_mismatch(now, mismatch_ratio);

        let is_in_outage = load_kw < outage_threshold;
        t.record_outage_flag(now, is_in_outage);
        t.update_thermal(load_kw, weather.temperature_c);
        t.prune(now);

        let capacity_kw = t.effective_capacity_kw(now);
        let load_pct = load_kw / capacity_kw.max(1e-6) * 100.0;

        let components = BghiComponents {
            load_stress: bghi::load_stress(load_pct),
            outage_score: bghi::outage_score(t.outage_minutes_24h()),
            power_quality: bghi::power_quality(None, t.spike_count_24h()),
            anomaly_frequency: bghi::anomaly_frequency(t.anomaly_count_24h()),
            environmental_stress: bghi::environmental_stress(
                weather.temperature_c,
                Some(weather.humidity_pct),
            ),
            mismatch_score: bghi::mismatch_score(t.latest_mismatch_ratio()),
        };
        let result = bghi::calculate(&components, &self.config.bghi);

        let recent_mean = t.stats.mean();
        let points = t.forecaster.forecast_24h(hour, recent_mean, capacity_kw, now)?;
        let peak = t.forecaster.peak_risk(&points);
        let (peak_risk_ratio, peak_risk_level) = peak
            .map(|p| (p.risk_ratio, p.risk_level))
            .unwrap_or((0.0, RiskLevel::Low));
        let alert = t.forecaster.assess_overload(
            &points,
            self.config.forecast.critical_threshold,
            self.config.forecast.min_lead_time_hours,
        );

        t.last_updated = Some(now);

        let snapshot = TransformerSnapshot {
            id: t.id.clone(),
            kind: t.kind,
            latitude: t.latitude,
            longitude: t.longitude,
            buildings: t.buildings,
            load_kw: round2(load_kw),
            capacity_kw,
            load_pct: round2(load_pct),
            temperature_c: round2(t.temperature_c),
            bghi: result,
            is_in_outage,
            in_artificial_outage,
            disaster: disaster.as_ref().map(|d| d.kind),
            mismatch_ratio: round3(mismatch_ratio),
            anomaly_count_24h: t.anomaly_count_24h(),
            peak_risk_ratio,
            peak_risk_level,
        };
        Ok(Some((snapshot, alert)))
    }

    fn tick_substation(
        &self,
        state: &mut CityState,
        now: UnixTime,
        city_load_kw: f64,
        feeder_noise: f64,
        weather: &Weather,
    ) -> Result<TransformerSnapshot, GridError> {
        let feeder_kw =
            city_load_kw * (1.0 + state.rng.random_range(-feeder_noise..=feeder_noise));
        let t = &mut state.substation;
        let sub_id = t.id.clone();

        // Aggregation node: direct load stays zero, only mismatch
        // bookkeeping against the city total runs here.
        t.record_load(now, 0.0);
        if let Some(a) = t
            .mismatch_detector
            .observe(feeder_kw, city_load_kw, &sub_id, now)
        {
            t.record_anomaly(a);
        }
        let mismatch_ratio = t
            .mismatch_detector
            .ratio(feeder_kw, city_load_kw)
            .unwrap_or(0.0);
        t.record_mismatch(now, mismatch_ratio);
        t.update_thermal(city_load_kw * 0.1, weather.temperature_c);
        t.prune(now);

        let components = BghiComponents {
            load_stress: 0.0,
            outage_score: bghi::outage_score(t.outage_minutes_24h()),
            power_quality: bghi::power_quality(None, 0),
            anomaly_frequency: bghi::anomaly_frequency(t.anomaly_count_24h()),
            environmental_stress: bghi::environmental_stress(
                weather.temperature_c,
                Some(weather.humidity_pct),
            ),
            mismatch_score: bghi::mismatch_score(t.latest_mismatch_ratio()),
        };
        let result = bghi::calculate(&components, &self.config.bghi);
        t.last_updated = Some(now);

        Ok(TransformerSnapshot {
            id: t.id.clone(),
            kind: t.kind,
            latitude: t.latitude,
            longitude: t.longitude,
            buildings: t.buildings,
            load_kw: 0.0,
            capacity_kw: t.capacity_kw,
            load_pct: 0.0,
            temperature_c: round2(t.temperature_c),
            bghi: result,
            is_in_outage: false,
            in_artificial_outage: false,
            disaster: None,
            mismatch_ratio: round3(mismatch_ratio),
            anomaly_count_24h: t.anomaly_count_24h(),
            peak_risk_ratio: 0.0,
            peak_risk_level: RiskLevel::Low,
        })
    }

    /// Forces a transformer dark for `duration_minutes` (or until cleared).
    pub fn trigger_outage(
        &self,
        city: &str,
        transformer_id: &str,
        duration_minutes: Option<i64>,
        now: UnixTime,
    ) -> ControlResult {
        let city_arc = self.city(city);
        let mut state = relock(city_arc.lock());
        let Some(t) = state.transformer_mut(transformer_id) else {
            return ControlResult::failed(format!(
                "unknown transformer '{transformer_id}' in {city}"
            ));
        };
        t.artificial_outage = Some(ArtificialOutage::new(
            now,
            duration_minutes.map(|m| m * 60),
        ));
        let until = duration_minutes
            .map(|m| format!("for {m} minutes"))
            .unwrap_or_else(|| "until cleared".to_string());
        ControlResult::ok(
            format!("outage triggered on {transformer_id} {until}"),
            vec![transformer_id.to_string()],
        )
    }

    /// Clears an operator-triggered outage.
    pub fn clear_outage(&self, city: &str, transformer_id: &str) -> ControlResult {
        let city_arc = self.city(city);
        let mut state = relock(city_arc.lock());
        let Some(t) = state.transformer_mut(transformer_id) else {
            return ControlResult::failed(format!(
                "unknown transformer '{transformer_id}' in {city}"
            ));
        };
        if t.artificial_outage.take().is_some() {
            ControlResult::ok(
                format!("outage cleared on {transformer_id}"),
                vec![transformer_id.to_string()],
            )
        } else {
            ControlResult::failed(format!("no active outage on {transformer_id}"))
        }
    }

    /// Triggers a disaster on one transformer, or city-wide when
    /// `transformer_id` is `None`.
    #[allow(clippy::too_many_arguments)]
    pub fn trigger_disaster(
        &self,
        city: &str,
        kind: DisasterKind,
        transformer_id: Option<&str>,
        duration_minutes: Option<i64>,
        params: DisasterParams,
        notes: Option<String>,
        now: UnixTime,
    ) -> ControlResult {
        let city_arc = self.city(city);
        let mut state = relock(city_arc.lock());
        let duration_secs = duration_minutes.map(|m| m * 60);

        let targets: Vec<String> = match transformer_id {
            Some(id) => {
                if state.transformer_mut(id).is_none() {
                    return ControlResult::failed(format!("unknown transformer '{id}' in {city}"));
                }
                vec![id.to_string()]
            }
            None => state.pole_pads.keys().cloned().collect(),
        };

        for id in &targets {
            let disaster = ArtificialDisaster::trigger(
                kind,
                params.clone(),
                now,
                duration_secs,
                notes.clone(),
                &mut state.rng,
            );
            if let Some(t) = state.transformer_mut(id) {
                t.artificial_disaster = Some(disaster);
            }
        }

        ControlResult::ok(
            format!(
                "{kind:?} disaster triggered on {} transformer(s)",
                targets.len()
            ),
            targets,
        )
    }

    /// Clears a disaster on one transformer, or all when `transformer_id`
    /// is `None`.
    pub fn clear_disaster(&self, city: &str, transformer_id: Option<&str>) -> ControlResult {
        let city_arc = self.city(city);
        let mut state = relock(city_arc.lock());

        match transformer_id {
            Some(id) => {
                let Some(t) = state.transformer_mut(id) else {
                    return ControlResult::failed(format!("unknown transformer '{id}' in {city}"));
                };
                if t.artificial_disaster.take().is_some() {
                    ControlResult::ok(format!("disaster cleared on {id}"), vec![id.to_string()])
                } else {
                    ControlResult::failed(format!("no active disaster on {id}"))
                }
            }
            None => {
                let mut cleared = Vec::new();
                if state.substation.artificial_disaster.take().is_some() {
                    cleared.push(state.substation.id.clone());
                }
                for (id, t) in state.pole_pads.iter_mut() {
                    if t.artificial_disaster.take().is_some() {
                        cleared.push(id.clone());
                    }
                }
                let n = cleared.len();
                ControlResult::ok(format!("disaster cleared on {n} transformer(s)"), cleared)
            }
        }
    }

    /// Whether `transformer_id` currently sits under an outage override.
    /// Runs the lazy-expiry check as a side effect.
    pub fn is_in_outage(&self, city: &str, transformer_id: &str, now: UnixTime) -> bool {
        let city_arc = self.city(city);
        let mut state = relock(city_arc.lock());
        state
            .transformer_mut(transformer_id)
            .is_some_and(|t| t.active_outage(now).is_some())
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOON: UnixTime = 1_700_000_000 - (1_700_000_000 % clock::DAY_SECS) + 12 * 3_600;

    fn store() -> GridStore {
        GridStore::new(ScenarioConfig::baseline())
    }

    #[test]
    fn tick_assembles_a_full_payload() {
        let store = store();
        let data = store.tick_and_read("Quezon City", NOON).expect("tick");
        // Substation + 8 demo pole/pads
        assert_eq!(data.transformers.len(), 9);
        assert_eq!(data.transformers[0].kind, TransformerKind::Substation);
        assert_eq!(data.transformers[0].load_kw, 0.0);
        assert_eq!(data.summary.transformer_count, 8);
        assert_eq!(data.updated_at, NOON);
        assert_eq!(data.refresh_interval_seconds, 15);
        for t in &data.transformers[1..] {
            assert!(t.load_kw > 0.0, "{} generated no load", t.id);
            assert!((0.0..=100.0).contains(&t.bghi.bghi_score));
        }
    }

    #[test]
    fn repeated_reads_in_one_bucket_are_stable() {
        let store = store();
        let a = store.tick_and_read("Makati", NOON).expect("tick");
        let b = store.tick_and_read("Makati", NOON + 5).expect("tick");
        for (x, y) in a.transformers.iter().zip(b.transformers.iter()) {
            assert_eq!(x.load_kw, y.load_kw, "bucketed load moved for {}", x.id);
        }
    }

    #[test]
    fn rereads_within_a_bucket_do_not_duplicate_window_samples() {
        let store = store();
        // Two reads in the NOON bucket, one in the next: two samples total
        store.tick_and_read("Valenzuela", NOON).expect("tick");
        store.tick_and_read("Valenzuela", NOON + 10).expect("tick");
        store.tick_and_read("Valenzuela", NOON + 35).expect("tick");

        let city_arc = store.city("Valenzuela");
        let state = relock(city_arc.lock());
        for t in state.pole_pads.values() {
            assert_eq!(t.stats.len(), 2, "{} window grew on a re-read", t.id);
        }
        for (hid, h) in &state.households {
            assert_eq!(h.load_history().len(), 2, "{hid} history grew on a re-read");
        }
    }

    #[test]
    fn poisoned_city_lock_recovers() {
        let store = store();
        store.tick_and_read("Navotas", NOON).expect("tick");

        let city_arc = store.city("Navotas");
        let poison = std::thread::spawn(move || {
            let _guard = city_arc.lock().expect("fresh lock");
            panic!("simulated mid-tick panic");
        })
        .join();
        assert!(poison.is_err());

        let data = store.tick_and_read("Navotas", NOON + 30).expect("tick");
        assert_eq!(data.summary.city, "Navotas");
    }

    #[test]
    fn outage_forces_load_to_zero_and_expires() {
        let store = store();
        let data = store.tick_and_read("Pasig", NOON).expect("tick");
        let target = data.transformers[1].id.clone();

        let result = store.trigger_outage("Pasig", &target, Some(5), NOON);
        assert!(result.success);
        assert_eq!(result.transformers_affected, vec![target.clone()]);

        assert!(store.is_in_outage("Pasig", &target, NOON));
        let during = store.tick_and_read("Pasig", NOON + 60).expect("tick");
        let snap = during
            .transformers
            .iter()
            .find(|t| t.id == target)
            .expect("target present");
        assert_eq!(snap.load_kw, 0.0);
        assert!(snap.in_artificial_outage);
        assert!(snap.is_in_outage);

        // Past the 5 minute duration the override expires lazily, and a
        // second check stays false without re-clearing anything
        assert!(!store.is_in_outage("Pasig", &target, NOON + 301));
        assert!(!store.is_in_outage("Pasig", &target, NOON + 302));
        let after = store.tick_and_read("Pasig", NOON + 360).expect("tick");
        let snap = after
            .transformers
            .iter()
            .find(|t| t.id == target)
            .expect("target present");
        assert!(!snap.in_artificial_outage);
        assert!(snap.load_kw > 0.0);
    }

    #[test]
    fn clear_outage_on_idle_transformer_reports_failure() {
        let store = store();
        let data = store.tick_and_read("Taguig", NOON).expect("tick");
        let target = data.transformers[1].id.clone();
        let result = store.clear_outage("Taguig", &target);
        assert!(!result.success);
        assert!(result.message.contains("no active outage"));
    }

    #[test]
    fn unknown_transformer_is_a_structured_failure() {
        let store = store();
        store.tick_and_read("Manila", NOON).expect("tick");
        let result = store.trigger_outage("Manila", "NOPE-T-99", None, NOON);
        assert!(!result.success);
        assert!(result.message.contains("unknown transformer"));
    }

    #[test]
    fn citywide_disaster_touches_every_pole_pad() {
        let store = store();
        let before = store.tick_and_read("Cebu", NOON).expect("tick");
        let result = store.trigger_disaster(
            "Cebu",
            DisasterKind::Brownout,
            None,
            Some(30),
            DisasterParams::default(),
            None,
            NOON,
        );
        assert!(result.success);
        assert_eq!(result.transformers_affected.len(), 8);

        // Next bucket: brownout cuts each zone's load by the default 40%
        let during = store.tick_and_read("Cebu", NOON + 60).expect("tick");
        let before_total: f64 = before.transformers.iter().map(|t| t.load_kw).sum();
        let during_total: f64 = during.transformers.iter().map(|t| t.load_kw).sum();
        assert!(
            during_total < before_total * 0.8,
            "brownout did not reduce load: {before_total} -> {during_total}"
        );
        for t in &during.transformers[1..] {
            assert_eq!(t.disaster, Some(DisasterKind::Brownout));
        }

        let cleared = store.clear_disaster("Cebu", None);
        assert!(cleared.success);
        assert_eq!(cleared.transformers_affected.len(), 8);
    }

    #[test]
    fn reset_drops_all_cities() {
        let store = store();
        store.tick_and_read("A", NOON).expect("tick");
        store.tick_and_read("B", NOON).expect("tick");
        assert_eq!(store.city_names().len(), 2);
        store.reset();
        assert!(store.city_names().is_empty());
    }

    #[test]
    fn registered_topology_wins_over_demo_synthesis() {
        let store = store();
        let topology = Topology::demo_city("Custom", 7, 3, 10, 15);
        store.register_city("Custom", &topology);
        let data = store.tick_and_read("Custom", NOON).expect("tick");
        // Substation + the 3 registered pole/pads
        assert_eq!(data.transformers.len(), 4);
    }

    #[test]
    fn weather_failure_degrades_to_synthetic() {
        struct Broken;
        impl WeatherProvider for Broken {
            fn current(
                &mut self,
                city: &str,
                _now: UnixTime,
            ) -> Result<Weather, crate::weather::WeatherError> {
                Err(crate::weather::WeatherError {
                    city: city.to_string(),
                    message: "upstream down".to_string(),
                })
            }
        }
        let store = GridStore::with_weather(ScenarioConfig::baseline(), Box::new(Broken));
        let data = store.tick_and_read("Davao", NOON).expect("tick");
        assert!((20.0..=40.0).contains(&data.weather.temperature_c));
    }

    #[test]
    fn payload_serializes_to_json() {
        let store = store();
        let data = store.tick_and_read("Iloilo", NOON).expect("tick");
        let json = serde_json::to_string(&data).expect("serialize");
        assert!(json.contains("\"summary\""));
        assert!(json.contains("\"refresh_interval_seconds\":15"));
    }
}
