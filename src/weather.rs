//! Ambient weather inputs for environmental stress scoring and meter
//! temperature sensitivity.
//!
//! Production deployments would back [`WeatherProvider`] with a real API
//! client; the simulator ships a synthetic tropical-climate provider.

use std::fmt;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;

use crate::clock::{UnixTime, hour_fraction};
use crate::meter::gaussian_noise;

/// One ambient weather reading.
#[derive(Debug, Clone, Serialize)]
pub struct Weather {
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub pressure_hpa: f64,
    pub wind_speed_mps: f64,
    pub condition: String,
}

/// Weather lookup failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherError {
    pub city: String,
    pub message: String,
}

impl fmt::Display for WeatherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "weather lookup failed for '{}': {}", self.city, self.message)
    }
}

impl std::error::Error for WeatherError {}

/// Source of ambient weather readings.
pub trait WeatherProvider {
    /// Current conditions for `city` at time `now`.
    fn current(&mut self, city: &str, now: UnixTime) -> Result<Weather, WeatherError>;
}

/// Deterministic synthetic weather for a hot, humid climate.
///
/// Temperature follows a Gaussian bump peaking mid-afternoon around 14:00,
/// with small seeded noise on top. Humidity moves inversely to temperature.
#[derive(Debug)]
pub struct SyntheticWeather {
    rng: StdRng,
}

impl SyntheticWeather {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn diurnal_temp(hour: f64) -> f64 {
        let bump = (-0.5 * ((hour - 14.0) / 4.0).powi(2)).exp();
        26.0 + 4.5 * bump
    }
}

impl WeatherProvider for SyntheticWeather {
    fn current(&mut self, _city: &str, now: UnixTime) -> Result<Weather, WeatherError> {
        let hour = hour_fraction(now);
        let temperature_c = Self::diurnal_temp(hour) + gaussian_noise(&mut self.rng, 0.3);

        // Humid mornings, slightly drier afternoons
        let humidity_pct = (88.0 - 1.5 * (temperature_c - 26.0) + gaussian_noise(&mut self.rng, 2.0))
            .clamp(40.0, 100.0);
        let pressure_hpa = 1_010.0 + gaussian_noise(&mut self.rng, 2.5);
        let wind_speed_mps = self.rng.random_range(0.5..6.0);

        let condition = if humidity_pct > 92.0 {
            "rain showers"
        } else if temperature_c > 31.0 {
            "sunny"
        } else {
            "partly cloudy"
        };

        Ok(Weather {
            temperature_c,
            humidity_pct,
            pressure_hpa,
            wind_speed_mps,
            condition: condition.to_string(),
        })
    }
}
