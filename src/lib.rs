// src/lib.rs
// Public library surface for the binary, the demo and integration tests.

pub mod app;
pub mod catalog;
pub mod chain;
pub mod config;
pub mod error;
pub mod growth;
pub mod logging;
pub mod metrics;
pub mod presence;
pub mod reward;
pub mod scheduler;
pub mod shutdown;
pub mod snapshot;
pub mod store;
pub mod units;

// ---- Re-exports for stable public API ----
pub use crate::catalog::{build_catalog, CatalogOptions, StatusCatalog, StatusEntry};
pub use crate::chain::ChainDataSource;
pub use crate::config::BotConfig;
pub use crate::error::{PresenceError, StorageError, UpstreamError};
pub use crate::growth::{GrowthCalculator, GrowthReport, GrowthValue, GrowthWindow};
pub use crate::presence::{PresenceFanout, PresenceSink};
pub use crate::reward::{estimate_rewards, format_duration, RewardEstimate, RewardParams};
pub use crate::scheduler::{Phase, Refresher, Rotator, Scheduler, StatusBoard};
pub use crate::store::{RetentionPolicy, Sample, SampleStore};
