// tests/snapshot.rs
mod common;

use std::time::Duration;

use pledge_pulse::chain::version::VersionInfo;
use pledge_pulse::chain::FixedChainSource;
use pledge_pulse::snapshot::{collect_snapshot, FetchPolicy, FEES_PALLET, TOTAL_SPACE_PLEDGED};

fn quick() -> FetchPolicy {
    FetchPolicy {
        block_height_attempts: 3,
        retry_delay: Duration::ZERO,
    }
}

#[tokio::test]
async fn converts_raw_constants() {
    let snap = collect_snapshot(
        &common::healthy_chain(),
        &common::versions(),
        None,
        &quick(),
        10.0,
    )
    .await;

    assert_eq!(snap.pledged_pb, Some(3.5));
    assert_eq!(snap.history_gb, Some(400.0));
    assert_eq!(snap.circulation, Some(250_000_000.0));
    assert_eq!(snap.block_height, Some(4_200_000));
    assert_eq!(snap.versions.space_acres, "0.2.14");
    assert!(snap.pledged_fresh);
}

#[tokio::test]
async fn missing_constants_carry_over_but_block_height_does_not() {
    let first = collect_snapshot(
        &common::healthy_chain(),
        &common::versions(),
        None,
        &quick(),
        10.0,
    )
    .await;

    // Only pledged space is readable now; no block height.
    let partial = FixedChainSource::new().with_constant(FEES_PALLET, TOTAL_SPACE_PLEDGED, 3.6e15);
    let second = collect_snapshot(&partial, &common::versions(), Some(&first), &quick(), 20.0).await;

    assert_eq!(second.pledged_pb, Some(3.6));
    assert_eq!(second.history_gb, first.history_gb);
    assert_eq!(second.circulation, first.circulation);
    assert_eq!(second.block_height, None);
    assert!(second.pledged_fresh);

    let empty = FixedChainSource::new();
    let third = collect_snapshot(&empty, &common::versions(), Some(&second), &quick(), 30.0).await;
    assert_eq!(third.pledged_pb, Some(3.6));
    assert!(!third.pledged_fresh);
    assert_ne!(third.versions, VersionInfo::unknown());
}
