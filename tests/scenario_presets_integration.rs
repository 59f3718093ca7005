//! Every built-in preset must validate and drive a working simulation.

mod common;

use voltage_sim::config::ScenarioConfig;
use voltage_sim::grid::GridStore;

#[test]
fn all_presets_load_and_validate() {
    for name in ScenarioConfig::PRESETS {
        let cfg = ScenarioConfig::from_preset(name).expect("preset loads");
        let errors = cfg.validate();
        assert!(errors.is_empty(), "preset {name} invalid: {errors:?}");
    }
}

#[test]
fn unknown_preset_is_rejected() {
    let err = ScenarioConfig::from_preset("voltage_apocalypse");
    assert!(err.is_err());
}

#[test]
fn every_preset_produces_a_dashboard() {
    for name in ScenarioConfig::PRESETS {
        let cfg = ScenarioConfig::from_preset(name).expect("preset loads");
        let transformers = cfg.topology.transformers_per_city as usize;
        let store = GridStore::new(cfg);

        let data = store.tick_and_read("Preset City", common::NOON).expect("tick");
        // Substation plus configured pole/pads
        assert_eq!(data.transformers.len(), transformers + 1, "preset {name}");
        assert!((0.0..=100.0).contains(&data.summary.bghi_score));
    }
}

#[test]
fn dense_city_carries_more_buildings_than_baseline() {
    let baseline = GridStore::new(ScenarioConfig::baseline());
    let dense = GridStore::new(
        ScenarioConfig::from_preset("dense_city").expect("preset loads"),
    );

    let a = baseline.tick_and_read("Compare City", common::NOON).expect("tick");
    let b = dense.tick_and_read("Compare City", common::NOON).expect("tick");
    assert!(b.summary.total_buildings > a.summary.total_buildings);
}

#[test]
fn toml_scenario_round_trips_into_a_store() {
    let toml = r#"
        [simulation]
        tick_bucket_seconds = 60
        seed = 7

        [topology]
        transformers_per_city = 2
        buildings_min = 5
        buildings_max = 10
    "#;
    let cfg = ScenarioConfig::from_toml_str(toml).expect("parse");
    assert!(cfg.validate().is_empty());

    let store = GridStore::new(cfg);
    let data = store.tick_and_read("Toml City", common::NOON).expect("tick");
    assert_eq!(data.transformers.len(), 3);
}

#[test]
fn same_seed_same_first_dashboard() {
    let a = GridStore::new(ScenarioConfig::baseline());
    let b = GridStore::new(ScenarioConfig::baseline());

    let da = a.tick_and_read("Twin City", common::NOON).expect("tick");
    let db = b.tick_and_read("Twin City", common::NOON).expect("tick");
    for (x, y) in da.transformers.iter().zip(db.transformers.iter()) {
        assert_eq!(x.id, y.id);
        assert_eq!(x.load_kw, y.load_kw);
        assert_eq!(x.bghi.bghi_score, y.bghi.bghi_score);
    }
}
