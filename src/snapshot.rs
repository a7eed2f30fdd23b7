//! # Snapshot
//! Values fetched from the chain and the version endpoint in one refresh.

use std::time::Duration;

use serde::Serialize;

use crate::chain::version::{VersionInfo, VersionSource};
use crate::chain::ChainDataSource;
use crate::units::{bytes_to_gb, bytes_to_pb, units_to_tokens};

pub const FEES_PALLET: &str = "TransactionFees";
pub const TOTAL_SPACE_PLEDGED: &str = "TotalSpacePledged";
pub const CREDIT_SUPPLY: &str = "CreditSupply";
pub const BLOCKCHAIN_HISTORY_SIZE: &str = "BlockchainHistorySize";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    /// Total pledged space, PB.
    pub pledged_pb: Option<f64>,
    /// Archived history size, GB.
    pub history_gb: Option<f64>,
    /// Circulating supply, whole tokens.
    pub circulation: Option<f64>,
    pub block_height: Option<u64>,
    pub versions: VersionInfo,
    /// Unix seconds when the refresh ran.
    pub fetched_at: f64,
    /// `pledged_pb` came from this refresh rather than an earlier one.
    pub pledged_fresh: bool,
}

/// Bounded inline retry for the block height call.
#[derive(Debug, Clone, Copy)]
pub struct FetchPolicy {
    pub block_height_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            block_height_attempts: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// Fetch a new snapshot. Never fails: a constant that cannot be read falls
/// back to `previous`, versions fall back to `"Unknown"`, and a missing
/// block height stays `None`.
pub async fn collect_snapshot(
    chain: &dyn ChainDataSource,
    versions: &dyn VersionSource,
    previous: Option<&Snapshot>,
    policy: &FetchPolicy,
    now: f64,
) -> Snapshot {
    let names = [TOTAL_SPACE_PLEDGED, CREDIT_SUPPLY, BLOCKCHAIN_HISTORY_SIZE];
    let (constants, block_height, version_info) = tokio::join!(
        chain.get_constants(FEES_PALLET, &names),
        fetch_block_height(chain, policy),
        versions.fetch_versions(),
    );

    let mut fresh: [Option<f64>; 3] = [None; 3];
    for ((slot, name), res) in fresh.iter_mut().zip(names).zip(constants) {
        match res {
            Ok(v) => *slot = Some(v),
            Err(e) => {
                tracing::warn!(target: "refresh", source = chain.name(), constant = name, error = %e, "constant unavailable")
            }
        }
    }
    let [pledged_raw, supply_raw, history_raw] = fresh;

    let versions = version_info.unwrap_or_else(|e| {
        tracing::warn!(target: "refresh", error = %e, "version info unavailable");
        VersionInfo::unknown()
    });

    let pledged_fresh = pledged_raw.is_some();
    Snapshot {
        pledged_pb: pledged_raw
            .map(bytes_to_pb)
            .or_else(|| previous.and_then(|p| p.pledged_pb)),
        history_gb: history_raw
            .map(bytes_to_gb)
            .or_else(|| previous.and_then(|p| p.history_gb)),
        circulation: supply_raw
            .map(units_to_tokens)
            .or_else(|| previous.and_then(|p| p.circulation)),
        block_height,
        versions,
        fetched_at: now,
        pledged_fresh,
    }
}

/// Block height with up to `policy.block_height_attempts` tries.
pub async fn fetch_block_height(chain: &dyn ChainDataSource, policy: &FetchPolicy) -> Option<u64> {
    let attempts = policy.block_height_attempts.max(1);
    for attempt in 1..=attempts {
        match chain.get_block_height().await {
            Ok(h) => return Some(h),
            Err(e) => {
                tracing::warn!(target: "refresh", attempt, attempts, error = %e, "block height fetch failed");
                if attempt < attempts {
                    tokio::time::sleep(policy.retry_delay).await;
                }
            }
        }
    }
    None
}
