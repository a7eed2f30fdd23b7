// tests/store_props.rs
use pledge_pulse::store::SampleStore;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn samples_are_sorted_unique_and_last_write_wins(
        writes in prop::collection::vec((0u32..50, -1_000.0f64..1_000.0), 1..40)
    ) {
        let store = SampleStore::in_memory().unwrap();
        let mut expected = std::collections::BTreeMap::new();
        for (t, v) in &writes {
            store.insert(f64::from(*t), *v).unwrap();
            expected.insert(*t, *v);
        }

        let samples = store.samples().unwrap();
        prop_assert_eq!(samples.len(), expected.len());
        for (s, (t, v)) in samples.iter().zip(expected.iter()) {
            prop_assert_eq!(s.timestamp, f64::from(*t));
            prop_assert_eq!(s.value, *v);
        }
    }

    #[test]
    fn range_min_max_matches_subset(
        writes in prop::collection::vec((0u32..100, -1_000.0f64..1_000.0), 1..40),
        from in 0u32..120,
    ) {
        let store = SampleStore::in_memory().unwrap();
        let mut latest = std::collections::BTreeMap::new();
        for (t, v) in &writes {
            store.insert(f64::from(*t), *v).unwrap();
            latest.insert(*t, *v);
        }

        let subset: Vec<f64> = latest.range(from..).map(|(_, v)| *v).collect();
        let got = store.range_min_max(f64::from(from)).unwrap();
        if subset.is_empty() {
            prop_assert_eq!(got, None);
        } else {
            let min = subset.iter().copied().fold(f64::INFINITY, f64::min);
            let max = subset.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            prop_assert_eq!(got, Some((min, max)));
        }
    }
}
