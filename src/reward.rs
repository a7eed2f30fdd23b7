//! # Reward Estimate
//! Expected reward cadence for a reference pledge, given total network space.
//!
//! Pure and stateless: recomputed from the snapshot on every refresh.

use serde::{Deserialize, Serialize};

use crate::units::round3;

const TIB_PER_PIB: f64 = 1024.0;
const SECS_PER_DAY: f64 = 86_400.0;
/// Effective share of the reference pledge after fixed overhead.
const EFFECTIVE_PLEDGE_FACTOR: f64 = 0.99;

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY_U: u64 = 24 * SECS_PER_HOUR;
const SECS_PER_MONTH: u64 = 30 * SECS_PER_DAY_U;

/// Fixed network parameters of the reward model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardParams {
    pub daily_blocks: u32,
    pub block_reward_ratio: u32,
    pub vote_reward_ratio: u32,
    /// Size of the reference pledge, in TiB.
    pub pledged_space_tib: f64,
}

impl Default for RewardParams {
    fn default() -> Self {
        Self {
            daily_blocks: 14_400,
            block_reward_ratio: 1,
            vote_reward_ratio: 9,
            pledged_space_tib: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewardEstimate {
    pub total_per_day: f64,
    pub block_per_day: f64,
    pub vote_per_day: f64,
    /// `"4d 2h 15m"`-style interval, or `"0"` when no rewards are expected.
    pub time_between_rewards: String,
}

impl RewardEstimate {
    fn none() -> Self {
        Self {
            total_per_day: 0.0,
            block_per_day: 0.0,
            vote_per_day: 0.0,
            time_between_rewards: "0".to_string(),
        }
    }
}

/// Estimate rewards per day for `params.pledged_space_tib` out of a network
/// of `network_space_pib`.
///
/// A non-positive or non-finite network size yields an all-zero estimate.
pub fn estimate_rewards(network_space_pib: f64, params: &RewardParams) -> RewardEstimate {
    if !(network_space_pib.is_finite() && network_space_pib > 0.0) {
        return RewardEstimate::none();
    }

    let daily_blocks = f64::from(params.daily_blocks);
    let block_ratio = f64::from(params.block_reward_ratio);
    let vote_ratio = f64::from(params.vote_reward_ratio);
    let rewards_per_block = block_ratio + vote_ratio;

    let total_network_tib = network_space_pib * TIB_PER_PIB;
    let proportion = params.pledged_space_tib * EFFECTIVE_PLEDGE_FACTOR / total_network_tib;

    let total_per_day = daily_blocks * rewards_per_block * proportion;
    let block_per_day = daily_blocks * block_ratio * proportion;
    let vote_per_day = daily_blocks * vote_ratio * proportion;

    let time_between_rewards = if total_per_day > 0.0 {
        format_duration(SECS_PER_DAY / total_per_day)
    } else {
        "0".to_string()
    };

    RewardEstimate {
        total_per_day: round3(total_per_day),
        block_per_day: round3(block_per_day),
        vote_per_day: round3(vote_per_day),
        time_between_rewards,
    }
}

/// Render seconds as `"{M}M {d}d {h}h {m}m"` with 30-day months, skipping
/// zero components. Leftover seconds are dropped.
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return String::new();
    }
    let mut rest = seconds.floor() as u64;

    let months = rest / SECS_PER_MONTH;
    rest %= SECS_PER_MONTH;
    let days = rest / SECS_PER_DAY_U;
    rest %= SECS_PER_DAY_U;
    let hours = rest / SECS_PER_HOUR;
    rest %= SECS_PER_HOUR;
    let minutes = rest / SECS_PER_MINUTE;

    [(months, "M"), (days, "d"), (hours, "h"), (minutes, "m")]
        .into_iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, unit)| format!("{n}{unit}"))
        .collect::<Vec<_>>()
        .join(" ")
}
