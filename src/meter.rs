//! Synthetic smart-meter load generation.
//!
//! Each household owns one [`SmartMeter`] producing a physically plausible
//! load series: a bimodal daily curve over a base load, weekend damping,
//! temperature-driven air-conditioning excess, Gaussian noise, rare appliance
//! spikes, and exponential smoothing between consecutive samples.

use std::collections::HashMap;

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::clock::{self, UnixTime};

/// Cache entries older than this are dropped when the cache is pruned.
const CACHE_RETENTION_SECS: i64 = clock::DAY_SECS;

/// Cache size that triggers a prune pass.
const CACHE_PRUNE_LEN: usize = 4096;

/// Gaussian noise via the Box-Muller transform.
///
/// Returns a draw from N(0, `std_dev`), or `0.0` when `std_dev <= 0`.
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }
    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}

/// Per-meter generation parameters, drawn once at meter creation and
/// immutable for the life of the process.
///
/// Randomizing these per meter reflects diverse customers: different peak
/// appetites, noise levels, and air-conditioning sensitivity.
#[derive(Debug, Clone)]
pub struct MeterParams {
    /// Morning peak amplitude (kW).
    pub morning_amp: f64,
    /// Evening peak amplitude (kW).
    pub evening_amp: f64,
    /// Standard deviation of instantaneous noise (kW).
    pub noise_scale: f64,
    /// AC load per degree Celsius above the 26 degree comfort point (kW/degC).
    pub ac_sensitivity: f64,
    /// Exponential smoothing factor applied between consecutive samples.
    pub smoothing: f64,
}

impl MeterParams {
    /// Draws a fresh parameter set from the injected random source.
    ///
    /// # Arguments
    ///
    /// * `rng` - Seeded random source (determinism comes from the caller)
    /// * `base_kw` - Baseline consumption the amplitudes scale against
    /// * `max_kw` - Meter ceiling the noise scale is proportional to
    pub fn draw(rng: &mut StdRng, base_kw: f64, max_kw: f64) -> Self {
        Self {
            morning_amp: rng.random_range(0.8..3.0) * base_kw,
            evening_amp: rng.random_range(1.0..4.0) * base_kw,
            noise_scale: rng.random_range(0.02..0.15) * max_kw,
            ac_sensitivity: rng.random_range(0.01..0.05),
            smoothing: rng.random_range(0.2..0.6),
        }
    }
}

/// One generated reading.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadSample {
    /// Sample timestamp (unix seconds).
    pub timestamp: UnixTime,
    /// Instantaneous load in kW, rounded to 3 decimals.
    pub load_kw: f64,
}

/// Simulates a smart meter producing instantaneous household load (kW).
///
/// Readings within the same truncated time bucket are cached so repeated
/// reads at the same instant return an identical value (compute-once
/// idempotence; full cross-process reproducibility is not a goal since the
/// parameter draws happen at construction).
#[derive(Debug, Clone)]
pub struct SmartMeter {
    /// Stable meter identity.
    pub meter_id: String,
    /// Lower clamp for generated readings (kW).
    pub min_kw: f64,
    /// Upper clamp for generated readings (kW).
    pub max_kw: f64,
    /// Baseline consumption (kW).
    pub base_kw: f64,
    params: MeterParams,
    rng: StdRng,
    prev_load: Option<f64>,
    cache: HashMap<UnixTime, f64>,
}

impl SmartMeter {
    /// Creates a meter with parameters drawn from `seed`.
    ///
    /// # Panics
    ///
    /// Panics if `min_kw >= max_kw`.
    pub fn new(meter_id: impl Into<String>, min_kw: f64, max_kw: f64, base_kw: f64, seed: u64) -> Self {
        assert!(min_kw < max_kw, "min_kw must be < max_kw");
        let mut rng = StdRng::seed_from_u64(seed);
        let params = MeterParams::draw(&mut rng, base_kw, max_kw);
        Self {
            meter_id: meter_id.into(),
            min_kw,
            max_kw,
            base_kw,
            params,
            rng,
            prev_load: None,
            cache: HashMap::new(),
        }
    }

    /// The immutable per-meter parameter set.
    pub fn params(&self) -> &MeterParams {
        &self.params
    }

    /// Daily consumption profile above the base load at the given hour.
    ///
    /// Two Gaussian bumps (morning ~08:00, evening ~19:00) plus a small
    /// business-hours bump around 13:00.
    fn daily_profile(&self, hour: f64) -> f64 {
        let morning = self.params.morning_amp * gauss_bump(hour, 8.0, 1.8);
        let midday = 0.3 * self.base_kw * gauss_bump(hour, 13.0, 3.0);
        let evening = self.params.evening_amp * gauss_bump(hour, 19.0, 2.2);
        morning + midday + evening
    }

    /// Computes one raw (pre-smoothing) sample at `ts`.
    fn raw_sample(&mut self, ts: UnixTime, temp_c: Option<f64>) -> f64 {
        let mut profile = self.base_kw + self.daily_profile(clock::hour_fraction(ts));

        if clock::is_weekend(ts) {
            profile *= self.rng.random_range(0.6..0.9);
        }

        // AC load above the 26 degC comfort point; zero when no temperature
        // series is available.
        let temp_influence = temp_c.map_or(0.0, |t| (t - 26.0).max(0.0) * self.params.ac_sensitivity);

        let noise = gaussian_noise(&mut self.rng, self.params.noise_scale);

        let spike = if self.rng.random::<f64>() < 0.002 {
            self.rng.random_range(0.5..3.0) * self.base_kw
        } else {
            0.0
        };

        profile + temp_influence + noise + spike
    }

    /// Smooths, clamps, and rounds a raw sample, advancing meter state.
    fn finish_sample(&mut self, raw: f64) -> f64 {
        // First sample has no predecessor: raw value used unsmoothed.
        let load = match self.prev_load {
            None => raw,
            Some(prev) => prev + (raw - prev) * self.params.smoothing,
        };
        let load = round3(load.clamp(self.min_kw, self.max_kw));
        self.prev_load = Some(load);
        load
    }

    /// Generates a minute-by-minute load series.
    ///
    /// # Arguments
    ///
    /// * `num_minutes` - Number of one-minute samples to generate
    /// * `start` - Timestamp of the first sample
    /// * `temps` - Optional ambient temperature series aligned to minutes;
    ///   missing entries contribute no AC load
    pub fn generate(
        &mut self,
        num_minutes: usize,
        start: UnixTime,
        temps: Option<&[f64]>,
    ) -> Vec<LoadSample> {
        let mut out = Vec::with_capacity(num_minutes);
        for i in 0..num_minutes {
            let ts = start + i as i64 * 60;
            let temp = temps.and_then(|t| t.get(i).copied());
            let raw = self.raw_sample(ts, temp);
            let load_kw = self.finish_sample(raw);
            self.cache.insert(ts, load_kw);
            out.push(LoadSample {
                timestamp: ts,
                load_kw,
            });
        }
        self.prune_cache(start + num_minutes as i64 * 60);
        out
    }

    /// Instantaneous reading at `now`, cached per truncated bucket.
    ///
    /// Repeated calls within the same bucket return an identical value; the
    /// stochastic terms are drawn exactly once per bucket.
    pub fn instantaneous(&mut self, now: UnixTime, bucket_secs: i64, temp_c: Option<f64>) -> f64 {
        let bucket = clock::truncate_to_bucket(now, bucket_secs);
        if let Some(&cached) = self.cache.get(&bucket) {
            return cached;
        }
        let raw = self.raw_sample(bucket, temp_c);
        let load = self.finish_sample(raw);
        self.cache.insert(bucket, load);
        self.prune_cache(bucket);
        load
    }

    /// Cached reading at an exact timestamp, `0.0` when absent.
    pub fn load_at(&self, ts: UnixTime) -> f64 {
        self.cache.get(&ts).copied().unwrap_or(0.0)
    }

    fn prune_cache(&mut self, now: UnixTime) {
        if self.cache.len() > CACHE_PRUNE_LEN {
            let cutoff = now - CACHE_RETENTION_SECS;
            self.cache.retain(|ts, _| *ts >= cutoff);
        }
    }
}

/// Unit Gaussian bump exp(-((x - mu) / sigma)^2 / 2).
fn gauss_bump(x: f64, mu: f64, sigma: f64) -> f64 {
    let d = (x - mu) / sigma;
    (-0.5 * d * d).exp()
}

/// Rounds to 3 decimal places.
fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}
