// src/app.rs
//! Wiring from [`BotConfig`] to a ready-to-run [`Scheduler`].

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::chain::rpc::RpcChainSource;
use crate::chain::version::{HttpVersionSource, VersionSource};
use crate::chain::ChainDataSource;
use crate::config::{BotConfig, PresenceMode};
use crate::growth::GrowthCalculator;
use crate::presence::discord::DiscordPresence;
use crate::presence::{LogPresence, PresenceFanout, PresenceSink};
use crate::scheduler::{Refresher, Rotator, Scheduler, StatusBoard};
use crate::store::SampleStore;

/// Open the history database, falling back to a memory-only store so the
/// bot keeps rotating (without long-window growth) if the file is unusable.
pub fn open_store(path: &Path) -> Result<Arc<SampleStore>> {
    match SampleStore::open(path) {
        Ok(store) => {
            tracing::info!(target: "store", path = %path.display(), samples = store.len().unwrap_or(0), "history store opened");
            Ok(Arc::new(store))
        }
        Err(e) => {
            tracing::error!(target: "store", path = %path.display(), error = %e, "cannot open history store, keeping samples in memory");
            Ok(Arc::new(SampleStore::in_memory()?))
        }
    }
}

pub fn chain_source(cfg: &BotConfig) -> Arc<dyn ChainDataSource> {
    Arc::new(RpcChainSource::new(cfg.node_url()))
}

pub fn version_source(cfg: &BotConfig) -> Arc<dyn VersionSource> {
    Arc::new(HttpVersionSource::new(cfg.version_url.clone()))
}

pub fn presence_sink(cfg: &BotConfig) -> Arc<dyn PresenceSink> {
    match cfg.presence.mode {
        PresenceMode::Discord => Arc::new(DiscordPresence::connect(
            cfg.presence.token.expose(),
            Some(cfg.presence.startup_message.clone()),
        )),
        PresenceMode::Log => Arc::new(LogPresence),
    }
}

/// Assemble the board, both actions and the scheduler around the given
/// collaborators.
pub fn build_scheduler(
    cfg: &BotConfig,
    chain: Arc<dyn ChainDataSource>,
    versions: Arc<dyn VersionSource>,
    sink: Arc<dyn PresenceSink>,
    store: Arc<SampleStore>,
) -> Result<Scheduler> {
    let board = Arc::new(StatusBoard::new());
    let growth = GrowthCalculator::new(cfg.growth_windows()?, cfg.growth_unit_scale());
    let refresher = Arc::new(Refresher::new(
        chain,
        versions,
        store,
        growth,
        cfg.refresh_settings(),
        Arc::clone(&board),
    ));
    let fanout = Arc::new(PresenceFanout::new(sink, cfg.nickname_pace()));
    let rotator = Arc::new(Rotator::new(Arc::clone(&board), fanout));

    Ok(Scheduler::new(board, refresher, rotator, cfg.schedule_timing()).with_greeting(cfg.greeting()))
}
