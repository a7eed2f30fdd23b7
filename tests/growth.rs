// tests/growth.rs
use pledge_pulse::growth::{GrowthCalculator, GrowthValue, GrowthWindow};
use pledge_pulse::store::SampleStore;

const DAY: f64 = 86_400.0;
const NOW: f64 = 100.0 * DAY;

fn calc(days: &[u64], scale: f64) -> GrowthCalculator {
    GrowthCalculator::new(days.iter().copied().map(GrowthWindow::days).collect(), scale)
}

#[test]
fn single_sample_is_no_data_everywhere() {
    let store = SampleStore::in_memory().unwrap();
    let report = calc(&[1, 3, 7], 1.0).observe(&store, 3.0, NOW);
    assert_eq!(report.windows.len(), 3);
    assert!(report.iter().all(|(_, v)| v == GrowthValue::NoData));
}

#[test]
fn young_history_falls_back_to_partial() {
    let store = SampleStore::in_memory().unwrap();
    store.insert(NOW - 2.0 * DAY, 1.0).unwrap();
    let report = calc(&[1, 3], 1.0).observe(&store, 1.5, NOW);

    // Only the fresh sample falls inside 1d.
    assert_eq!(report.get("1d"), Some(GrowthValue::NoData));
    assert_eq!(
        report.get("3d"),
        Some(GrowthValue::Partial {
            value: 0.5,
            covered_secs: 2.0 * DAY
        })
    );
}

#[test]
fn covered_window_is_measured_latest_minus_earliest() {
    let store = SampleStore::in_memory().unwrap();
    store.insert(NOW - 5.0 * DAY, 0.5).unwrap();
    store.insert(NOW - 2.0 * DAY, 1.0).unwrap();
    let report = calc(&[3, 7], 1.0).observe(&store, 1.5, NOW);

    assert_eq!(report.get("3d"), Some(GrowthValue::Measured { value: 0.5 }));
    assert_eq!(
        report.get("7d").and_then(|v| v.value()),
        Some(1.0),
        "7d reaches past the oldest sample"
    );
    assert!(matches!(report.get("7d"), Some(GrowthValue::Partial { .. })));
}

#[test]
fn shrinking_network_reports_negative_growth() {
    let store = SampleStore::in_memory().unwrap();
    store.insert(NOW - 2.0 * DAY, 4.0).unwrap();
    store.insert(NOW - 0.5 * DAY, 3.0).unwrap();
    let report = calc(&[1], 1.0).observe(&store, 2.75, NOW);
    assert_eq!(report.get("1d"), Some(GrowthValue::Measured { value: -0.25 }));
}

#[test]
fn unit_scale_converts_pb_to_tb() {
    let store = SampleStore::in_memory().unwrap();
    store.insert(NOW - 2.0 * DAY, 3.0).unwrap();
    store.insert(NOW - 0.5 * DAY, 3.25).unwrap();
    let report = calc(&[1], 1_000.0).observe(&store, 3.5, NOW);
    assert_eq!(report.get("1d"), Some(GrowthValue::Measured { value: 250.0 }));
}

#[test]
fn evaluate_does_not_write() {
    let store = SampleStore::in_memory().unwrap();
    store.insert(NOW - 2.0 * DAY, 1.0).unwrap();
    store.insert(NOW - DAY / 2.0, 2.0).unwrap();
    let report = calc(&[1], 1.0).evaluate(&store, NOW);
    assert_eq!(store.len().unwrap(), 2);
    assert_eq!(report.get("1d"), Some(GrowthValue::NoData));
}
