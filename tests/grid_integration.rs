//! Integration tests for the grid orchestrator and dashboard pipeline.

mod common;

use voltage_sim::bghi::HealthStatus;
use voltage_sim::detect::AnomalyType;
use voltage_sim::grid::{DisasterKind, DisasterParams, TransformerKind};
use voltage_sim::io::export::{SnapshotRow, write_csv};

#[test]
fn dashboard_payload_has_expected_shape() {
    let store = common::small_city_store("Testville");
    let data = store.tick_and_read("Testville", common::NOON).expect("tick");

    assert_eq!(data.transformers.len(), 4);
    assert_eq!(data.transformers[0].kind, TransformerKind::Substation);
    assert_eq!(data.summary.transformer_count, 3);
    assert_eq!(data.summary.city, "Testville");
    assert_eq!(data.updated_at, common::NOON);
    assert!(!data.weather.condition.is_empty());

    for t in &data.transformers {
        assert!((0.0..=100.0).contains(&t.bghi.bghi_score));
        assert!(t.capacity_kw >= 100.0);
        assert!((20.0..=120.0).contains(&t.temperature_c));
    }
}

#[test]
fn sustained_polling_keeps_histories_bounded_and_scores_sane() {
    let store = common::small_city_store("Polltown");
    // 2 hours of 30-second polls
    for i in 0..240_i64 {
        let data = store
            .tick_and_read("Polltown", common::NOON + i * 30)
            .expect("tick");
        assert!((0.0..=100.0).contains(&data.summary.bghi_score));
        for t in &data.transformers {
            assert!(t.load_kw >= 0.0);
            assert!(t.load_pct.is_finite());
        }
    }
}

#[test]
fn same_bucket_rereads_are_idempotent() {
    let store = common::small_city_store("Bucketville");
    let a = store.tick_and_read("Bucketville", common::NOON).expect("tick");
    let b = store
        .tick_and_read("Bucketville", common::NOON + 10)
        .expect("tick");
    for (x, y) in a.transformers.iter().zip(b.transformers.iter()) {
        assert_eq!(x.id, y.id);
        assert_eq!(x.load_kw, y.load_kw);
    }
}

#[test]
fn outage_lifecycle_end_to_end() {
    let store = common::small_city_store("Outageton");
    let data = store.tick_and_read("Outageton", common::NOON).expect("tick");
    let target = data.transformers[1].id.clone();

    // Trigger for 5 minutes: dark immediately
    let result = store.trigger_outage("Outageton", &target, Some(5), common::NOON);
    assert!(result.success);
    assert!(store.is_in_outage("Outageton", &target, common::NOON));

    let during = store
        .tick_and_read("Outageton", common::noon_plus_minutes(1))
        .expect("tick");
    let snap = during
        .transformers
        .iter()
        .find(|t| t.id == target)
        .expect("target present");
    assert_eq!(snap.load_kw, 0.0);
    assert!(snap.is_in_outage);
    assert!(snap.in_artificial_outage);

    // Past the duration: expired, and the check stays false on re-query
    assert!(!store.is_in_outage("Outageton", &target, common::noon_plus_minutes(6)));
    assert!(!store.is_in_outage("Outageton", &target, common::noon_plus_minutes(6)));

    let after = store
        .tick_and_read("Outageton", common::noon_plus_minutes(7))
        .expect("tick");
    let snap = after
        .transformers
        .iter()
        .find(|t| t.id == target)
        .expect("target present");
    assert!(!snap.in_artificial_outage);
    assert!(snap.load_kw > 0.0);
}

#[test]
fn sustained_outage_raises_exactly_one_outage_anomaly() {
    let store = common::small_city_store("Darkville");
    let data = store.tick_and_read("Darkville", common::NOON).expect("tick");
    let target = data.transformers[1].id.clone();

    store.trigger_outage("Darkville", &target, Some(30), common::NOON);

    // Poll through 10 minutes of darkness at 30 s cadence
    for i in 1..=20_i64 {
        store
            .tick_and_read("Darkville", common::NOON + i * 30)
            .expect("tick");
    }
    let data = store
        .tick_and_read("Darkville", common::noon_plus_minutes(11))
        .expect("tick");
    let outage_events = data
        .anomalies
        .iter()
        .filter(|a| a.zone_id == target && a.anomaly_type == AnomalyType::Outage)
        .count();
    assert_eq!(outage_events, 1, "outage alert must fire once per episode");

    // Outage minutes feed the BGHI: the zone must score worse than peers
    let snap = data
        .transformers
        .iter()
        .find(|t| t.id == target)
        .expect("target present");
    assert!(snap.bghi.components.outage_score > 0.0);
}

#[test]
fn brownout_disaster_reduces_city_load() {
    let store = common::small_city_store("Brownsville");
    let before = store.tick_and_read("Brownsville", common::NOON).expect("tick");
    let before_total: f64 = before.transformers.iter().map(|t| t.load_kw).sum();

    let result = store.trigger_disaster(
        "Brownsville",
        DisasterKind::Brownout,
        None,
        Some(60),
        DisasterParams::default(),
        Some("planned load shedding drill".to_string()),
        common::NOON,
    );
    assert!(result.success);
    assert_eq!(result.transformers_affected.len(), 3);

    let during = store
        .tick_and_read("Brownsville", common::noon_plus_minutes(1))
        .expect("tick");
    let during_total: f64 = during.transformers.iter().map(|t| t.load_kw).sum();
    assert!(during_total < before_total * 0.8);

    // Expiry restores normal generation without an explicit clear
    let after = store
        .tick_and_read("Brownsville", common::noon_plus_minutes(61))
        .expect("tick");
    for t in &after.transformers {
        assert_eq!(t.disaster, None);
    }
}

#[test]
fn heatwave_biases_mismatch_bookkeeping() {
    let store = common::small_city_store("Heatville");
    store.tick_and_read("Heatville", common::NOON).expect("tick");

    store.trigger_disaster(
        "Heatville",
        DisasterKind::Heatwave,
        None,
        None,
        DisasterParams {
            mismatch_bias: Some(0.2),
            ..DisasterParams::default()
        },
        None,
        common::NOON,
    );

    let data = store
        .tick_and_read("Heatville", common::noon_plus_minutes(1))
        .expect("tick");
    // Feeder noise is ±5%; with a 0.2 bias every pole/pad ratio clears 0.1
    for t in &data.transformers[1..] {
        assert!(
            t.mismatch_ratio > 0.1,
            "{} ratio {} not biased",
            t.id,
            t.mismatch_ratio
        );
    }

    let cleared = store.clear_disaster("Heatville", None);
    assert!(cleared.success);
    assert_eq!(cleared.transformers_affected.len(), 3);
}

#[test]
fn city_summary_reflects_degraded_zones() {
    let store = common::small_city_store("Mixedville");
    let data = store.tick_and_read("Mixedville", common::NOON).expect("tick");
    let healthy_score = data.summary.bghi_score;
    let target = data.transformers[1].id.clone();

    // Darken one zone long enough for outage minutes to accrue
    store.trigger_outage("Mixedville", &target, Some(60), common::NOON);
    for i in 1..=60_i64 {
        store
            .tick_and_read("Mixedville", common::NOON + i * 30)
            .expect("tick");
    }
    let degraded = store
        .tick_and_read("Mixedville", common::noon_plus_minutes(31))
        .expect("tick");
    assert!(
        degraded.summary.bghi_score < healthy_score,
        "city score should drop: {} -> {}",
        healthy_score,
        degraded.summary.bghi_score
    );
    assert_ne!(degraded.summary.status, HealthStatus::Critical);
}

#[test]
fn reset_gives_a_clean_slate() {
    let store = common::default_store();
    let first = store.tick_and_read("Resetville", common::NOON).expect("tick");
    let target = first.transformers[1].id.clone();
    store.trigger_outage("Resetville", &target, None, common::NOON);
    assert!(store.is_in_outage("Resetville", &target, common::NOON));

    store.reset();
    assert!(store.city_names().is_empty());
    // Recreated city has no lingering override
    assert!(!store.is_in_outage("Resetville", &target, common::NOON));
}

#[test]
fn snapshots_export_to_csv() {
    let store = common::small_city_store("Exportville");
    let mut payloads = Vec::new();
    for i in 0..3_i64 {
        let now = common::NOON + i * 30;
        payloads.push((now, store.tick_and_read("Exportville", now).expect("tick")));
    }

    let rows: Vec<SnapshotRow<'_>> = payloads
        .iter()
        .flat_map(|(ts, data)| data.transformers.iter().map(move |s| (*ts, s)))
        .collect();
    let mut buf = Vec::new();
    write_csv(&rows, &mut buf).expect("csv write");
    let text = String::from_utf8(buf).expect("utf8");
    // 1 header + 3 ticks x 4 transformers
    assert_eq!(text.lines().count(), 13);
    assert!(text.starts_with("timestamp,transformer_id,kind"));
}
