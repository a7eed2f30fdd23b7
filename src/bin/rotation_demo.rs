//! Demo: a few refresh/rotation cycles against fixed chain values, printed
//! through the log sink. No network access.

use std::sync::Arc;
use std::time::Duration;

use pledge_pulse::chain::version::{FixedVersionSource, VersionInfo};
use pledge_pulse::chain::FixedChainSource;
use pledge_pulse::presence::{LogPresence, PresenceFanout};
use pledge_pulse::scheduler::{RefreshSettings, Refresher, Rotator, RotationOutcome, StatusBoard};
use pledge_pulse::snapshot::{BLOCKCHAIN_HISTORY_SIZE, CREDIT_SUPPLY, FEES_PALLET, TOTAL_SPACE_PLEDGED};
use pledge_pulse::{GrowthCalculator, GrowthWindow, SampleStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let board = Arc::new(StatusBoard::new());
    let store = Arc::new(SampleStore::in_memory()?);
    let day = 86_400.0;
    let start = chrono::Utc::now().timestamp() as f64 - 3.0 * day;

    // Three days of history so the short windows have something to show.
    for i in 0..3 {
        store.insert(start + f64::from(i) * day, 2.9 + 0.05 * f64::from(i))?;
    }

    let chain = FixedChainSource::new()
        .with_constant(FEES_PALLET, TOTAL_SPACE_PLEDGED, 3.05e15)
        .with_constant(FEES_PALLET, CREDIT_SUPPLY, 123_456_789.0e18)
        .with_constant(FEES_PALLET, BLOCKCHAIN_HISTORY_SIZE, 412.5e9)
        .with_block_height(1_234_567);
    let versions = FixedVersionSource(VersionInfo {
        node: "mainnet-2025-jan-14".into(),
        space_acres: "0.2.12".into(),
    });

    let refresher = Refresher::new(
        Arc::new(chain),
        Arc::new(versions),
        store,
        GrowthCalculator::new(GrowthWindow::defaults(), 1.0),
        RefreshSettings::default(),
        Arc::clone(&board),
    );
    let entries = refresher.refresh_once().await?;

    let fanout = Arc::new(PresenceFanout::new(Arc::new(LogPresence), Duration::ZERO));
    let rotator = Rotator::new(board, fanout);
    for _ in 0..entries {
        if let RotationOutcome::Shown { index, label } = rotator.tick().await {
            println!("#{index:<2} {label}");
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    println!("rotation-demo done");
    Ok(())
}
