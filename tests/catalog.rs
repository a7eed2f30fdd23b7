// tests/catalog.rs
use pledge_pulse::catalog::{build_catalog, CatalogOptions, StatusEntry, UNAVAILABLE};
use pledge_pulse::chain::version::VersionInfo;
use pledge_pulse::growth::{GrowthReport, GrowthValue, GrowthWindow};
use pledge_pulse::reward::{estimate_rewards, RewardParams};
use pledge_pulse::snapshot::Snapshot;

fn snapshot() -> Snapshot {
    Snapshot {
        pledged_pb: Some(3.5),
        history_gb: Some(400.0),
        circulation: Some(250_000_000.4),
        block_height: Some(4_200_000),
        versions: VersionInfo {
            node: "mainnet-2025-jun-01".into(),
            space_acres: "0.2.14".into(),
        },
        fetched_at: 1_700_000_000.0,
        pledged_fresh: true,
    }
}

fn growth() -> GrowthReport {
    let mut report = GrowthReport::no_data(&GrowthWindow::defaults());
    report.windows[0].1 = GrowthValue::Measured { value: 0.012 };
    report.windows[1].1 = GrowthValue::Partial {
        value: 0.03,
        covered_secs: 100_000.0,
    };
    report
}

fn labels(entries: &[StatusEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.label.as_str()).collect()
}

#[test]
fn default_order_interleaves_total_pledged() {
    let snap = snapshot();
    let reward = estimate_rewards(3.5, &RewardParams::default());
    let cat = build_catalog(&snap, &growth(), &reward, &CatalogOptions::default());

    assert_eq!(
        labels(cat.entries()),
        vec![
            "Total Pledged",
            "Est Wins/TB/Day",
            "Growth PB",
            "Total Pledged",
            "Growth PB",
            "Latest Release",
            "Total Pledged",
            "Latest Release",
            "History Size",
            "Total Pledged",
            "Block Height",
            "In Circulation",
        ]
    );
    assert_eq!(cat.get(0).unwrap().message, "💾 3.500 PB");
    assert_eq!(cat.get(2).unwrap().message, "🌳 1: 0.012 | 3: ~0.030 | 7: n/a");
    assert_eq!(cat.get(8).unwrap().message, "📜 400.000 GB");
    assert_eq!(cat.get(10).unwrap().message, "📏  #4200000");
    assert_eq!(cat.get(11).unwrap().message, "💰 250,000,000/1B AI3");
}

#[test]
fn length_is_stable_when_values_go_missing() {
    let reward = estimate_rewards(3.5, &RewardParams::default());
    let opts = CatalogOptions::default();
    let full = build_catalog(&snapshot(), &growth(), &reward, &opts);

    let sparse = Snapshot {
        pledged_pb: None,
        history_gb: None,
        circulation: None,
        block_height: None,
        versions: VersionInfo::unknown(),
        ..snapshot()
    };
    let degraded = build_catalog(&sparse, &growth(), &reward, &opts);

    assert_eq!(full.len(), degraded.len());
    assert_eq!(labels(full.entries()), labels(degraded.entries()));
    assert_eq!(degraded.get(0).unwrap().message, UNAVAILABLE);
    assert_eq!(degraded.get(1).unwrap().message, UNAVAILABLE);
    assert_eq!(degraded.get(10).unwrap().message, UNAVAILABLE);
    assert_eq!(degraded.get(5).unwrap().message, "🖥️  Unknown");
}

#[test]
fn banner_links_and_tb_unit() {
    let reward = estimate_rewards(3.5, &RewardParams::default());
    let opts = CatalogOptions {
        testnet_banner: true,
        pledged_every: 0,
        growth_per_entry: 6,
        growth_unit: "TB".into(),
        links: vec![StatusEntry::new("Community Tools", "✨  https://ai3.farm/tools")],
        ..CatalogOptions::default()
    };
    let cat = build_catalog(&snapshot(), &growth(), &reward, &opts);

    assert_eq!(cat.get(0).unwrap(), &StatusEntry::new("👁️ Monitoring", "Testnet"));
    assert_eq!(cat.get(1).unwrap().label, "Total Pledged");
    assert_eq!(
        labels(cat.entries()).iter().filter(|l| **l == "Total Pledged").count(),
        1
    );
    assert_eq!(cat.get(3).unwrap().label, "Growth TB");
    assert_eq!(cat.entries().last().unwrap().label, "Community Tools");
    // banner + pledged + wins + 1 growth + 2 releases + history + height + circulation + link
    assert_eq!(cat.len(), 10);
}

#[test]
fn same_inputs_same_catalog() {
    let reward = estimate_rewards(3.5, &RewardParams::default());
    let opts = CatalogOptions::default();
    assert_eq!(
        build_catalog(&snapshot(), &growth(), &reward, &opts),
        build_catalog(&snapshot(), &growth(), &reward, &opts)
    );
}
