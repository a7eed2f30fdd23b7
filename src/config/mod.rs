// src/config/mod.rs
//! Bot configuration.
//!
//! Resolution order:
//! 1) `$PLEDGE_PULSE_CONFIG` (must exist when set)
//! 2) `config/pledge-pulse.toml`
//! 3) built-in defaults
//!
//! Every key is optional. `presence.token = "ENV"` reads `$DISCORD_BOT_TOKEN`.

mod secret;

pub use secret::Secret;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::catalog::{CatalogOptions, StatusEntry};
use crate::growth::GrowthWindow;
use crate::logging::LogFormat;
use crate::reward::RewardParams;
use crate::scheduler::{RefreshSettings, ScheduleTiming};
use crate::snapshot::FetchPolicy;
use crate::store::RetentionPolicy;

pub const ENV_CONFIG_PATH: &str = "PLEDGE_PULSE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/pledge-pulse.toml";
pub const ENV_DISCORD_TOKEN: &str = "DISCORD_BOT_TOKEN";

/// Presence updates faster than this get rate limited.
pub const MIN_ROTATION_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub fn default_node_url(self) -> &'static str {
        match self {
            Network::Mainnet => "https://rpc.mainnet.subspace.foundation",
            Network::Testnet => "https://rpc-0.tau1.subspace.network",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub refresh_secs: u64,
    pub rotation_secs: u64,
    pub startup_delay_secs: u64,
    /// How long the startup greeting waits for the presence sink to
    /// learn its destinations.
    pub presence_ready_secs: u64,
    pub block_height_attempts: u32,
    pub block_height_retry_delay_ms: u64,
    /// Pause after each successful nickname change.
    pub nickname_pace_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            refresh_secs: 130,
            rotation_secs: 14,
            startup_delay_secs: 3,
            presence_ready_secs: 30,
            block_height_attempts: 3,
            block_height_retry_delay_ms: 2_000,
            nickname_pace_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub retention_days: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("pledged_history.db"),
            retention_days: 365,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GrowthConfig {
    pub windows: Vec<String>,
    /// Show growth in TB instead of PB.
    pub display_in_tb: bool,
    pub per_entry: usize,
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            windows: GrowthWindow::defaults().into_iter().map(|w| w.name).collect(),
            display_in_tb: false,
            per_entry: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub pledged_every: usize,
    pub token_symbol: String,
    pub supply_label: String,
    pub links: Vec<StatusEntry>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let d = CatalogOptions::default();
        Self {
            pledged_every: d.pledged_every,
            token_symbol: d.token_symbol,
            supply_label: d.supply_label,
            links: d.links,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceMode {
    #[default]
    Discord,
    /// Dry run: log instead of talking to Discord.
    Log,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    pub mode: PresenceMode,
    /// "ENV" means: read from DISCORD_BOT_TOKEN
    pub token: Secret,
    pub startup_label: String,
    pub startup_message: String,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            mode: PresenceMode::Discord,
            token: Secret::new("ENV"),
            startup_label: "Autobots Roll out!".to_string(),
            startup_message: "Starting Up...".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Serve `/metrics`, `/status` and `/health` here when set.
    pub bind: Option<SocketAddr>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Human,
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub network: Network,
    /// Overrides the network's default endpoint.
    pub node_url: Option<String>,
    pub version_url: String,
    pub schedule: ScheduleConfig,
    pub store: StoreConfig,
    pub growth: GrowthConfig,
    pub reward: RewardParams,
    pub catalog: CatalogConfig,
    pub presence: PresenceConfig,
    pub http: HttpConfig,
    pub log: LogConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            network: Network::Mainnet,
            node_url: None,
            version_url: "http://subspacethingy.ifhya.com/info".to_string(),
            schedule: ScheduleConfig::default(),
            store: StoreConfig::default(),
            growth: GrowthConfig::default(),
            reward: RewardParams::default(),
            catalog: CatalogConfig::default(),
            presence: PresenceConfig::default(),
            http: HttpConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl BotConfig {
    /// Load from an explicit TOML file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&data).with_context(|| format!("in {}", path.display()))
    }

    /// Load using env var + fallbacks (see module docs).
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
            }
            return Self::load_from(&pb);
        }
        let default = Path::new(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from(default);
        }
        Self::default().finalize()
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: BotConfig = toml::from_str(s).context("parsing config TOML")?;
        cfg.finalize()
    }

    /// Clamp intervals, validate windows and resolve the token.
    fn finalize(mut self) -> Result<Self> {
        let sched = &mut self.schedule;
        if sched.rotation_secs < MIN_ROTATION_SECS {
            tracing::warn!(
                configured = sched.rotation_secs,
                min = MIN_ROTATION_SECS,
                "rotation interval too short, clamping"
            );
            sched.rotation_secs = MIN_ROTATION_SECS;
        }
        if sched.refresh_secs < sched.rotation_secs {
            tracing::warn!(
                configured = sched.refresh_secs,
                rotation = sched.rotation_secs,
                "refresh interval shorter than rotation, clamping"
            );
            sched.refresh_secs = sched.rotation_secs;
        }
        sched.block_height_attempts = sched.block_height_attempts.max(1);
        self.growth.per_entry = self.growth.per_entry.max(1);

        self.growth_windows()?;

        if self.presence.token.is_env_ref() {
            self.presence.token = env::var(ENV_DISCORD_TOKEN)
                .map(Secret::new)
                .unwrap_or_default();
        }
        if self.presence.mode == PresenceMode::Discord && self.presence.token.is_empty() {
            return Err(anyhow!(
                "presence.mode = \"discord\" needs a bot token; set {ENV_DISCORD_TOKEN} or presence.token"
            ));
        }

        Ok(self)
    }

    pub fn node_url(&self) -> &str {
        self.node_url
            .as_deref()
            .unwrap_or_else(|| self.network.default_node_url())
    }

    /// Parsed growth windows; an empty list means the defaults.
    pub fn growth_windows(&self) -> Result<Vec<GrowthWindow>> {
        if self.growth.windows.is_empty() {
            return Ok(GrowthWindow::defaults());
        }
        self.growth
            .windows
            .iter()
            .map(|w| GrowthWindow::parse(w).map_err(anyhow::Error::from))
            .collect()
    }

    /// Multiplier applied to PB deltas.
    pub fn growth_unit_scale(&self) -> f64 {
        if self.growth.display_in_tb {
            1_000.0
        } else {
            1.0
        }
    }

    pub fn catalog_options(&self) -> CatalogOptions {
        CatalogOptions {
            testnet_banner: self.network == Network::Testnet,
            pledged_every: self.catalog.pledged_every,
            growth_per_entry: self.growth.per_entry,
            growth_unit: if self.growth.display_in_tb { "TB" } else { "PB" }.to_string(),
            token_symbol: self.catalog.token_symbol.clone(),
            supply_label: self.catalog.supply_label.clone(),
            links: self.catalog.links.clone(),
        }
    }

    pub fn schedule_timing(&self) -> ScheduleTiming {
        ScheduleTiming {
            refresh: Duration::from_secs(self.schedule.refresh_secs),
            rotation: Duration::from_secs(self.schedule.rotation_secs),
            startup_delay: Duration::from_secs(self.schedule.startup_delay_secs),
            ready_timeout: Duration::from_secs(self.schedule.presence_ready_secs),
        }
    }

    pub fn refresh_settings(&self) -> RefreshSettings {
        RefreshSettings {
            reward: self.reward,
            catalog: self.catalog_options(),
            retention: RetentionPolicy::days(self.store.retention_days),
            fetch: FetchPolicy {
                block_height_attempts: self.schedule.block_height_attempts,
                retry_delay: Duration::from_millis(self.schedule.block_height_retry_delay_ms),
            },
        }
    }

    pub fn nickname_pace(&self) -> Duration {
        Duration::from_millis(self.schedule.nickname_pace_ms)
    }

    pub fn greeting(&self) -> StatusEntry {
        StatusEntry::new(
            self.presence.startup_label.clone(),
            self.presence.startup_message.clone(),
        )
    }
}
