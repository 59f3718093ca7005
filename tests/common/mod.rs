//! Shared test fixtures for integration tests.

use voltage_sim::config::ScenarioConfig;
use voltage_sim::grid::{GridStore, Topology};

/// A timestamp at exactly 12:00 UTC on a weekday (2023-11-14, a Tuesday).
pub const NOON: i64 = 1_699_963_200;

/// Default store over the baseline scenario (seed 42).
pub fn default_store() -> GridStore {
    GridStore::new(ScenarioConfig::baseline())
}

/// Store with a small fixed topology registered for `city`:
/// one substation plus 3 pole/pads of 10-20 buildings each.
pub fn small_city_store(city: &str) -> GridStore {
    let store = default_store();
    let topology = Topology::demo_city(city, 42, 3, 10, 20);
    store.register_city(city, &topology);
    store
}

/// Timestamp `minutes` after [`NOON`].
pub fn noon_plus_minutes(minutes: i64) -> i64 {
    NOON + minutes * 60
}
