//! # Status Catalog
//! The ordered list of `(label, message)` facts shown in rotation.
//!
//! A catalog is built from scratch on every refresh and never edited
//! afterwards. Its length depends only on [`CatalogOptions`] and the
//! configured growth windows, never on which upstream values were
//! available, so the rotation cursor keeps its meaning across refreshes.

use serde::{Deserialize, Serialize};

use crate::growth::GrowthReport;
use crate::reward::RewardEstimate;
use crate::snapshot::Snapshot;
use crate::units::group_thousands;

pub const UNAVAILABLE: &str = "Unavailable";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    /// Short text used as the display name.
    pub label: String,
    /// Presence text.
    pub message: String,
}

impl StatusEntry {
    pub fn new(label: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusCatalog {
    entries: Vec<StatusEntry>,
}

impl StatusCatalog {
    pub fn new(entries: Vec<StatusEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&StatusEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[StatusEntry] {
        &self.entries
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogOptions {
    /// Prepend a "monitoring testnet" banner.
    pub testnet_banner: bool,
    /// Repeat the pledged-space entry after this many other entries
    /// (0 shows it once).
    pub pledged_every: usize,
    /// Growth windows rendered per entry.
    pub growth_per_entry: usize,
    /// Unit of the growth figures, `"PB"` or `"TB"`.
    pub growth_unit: String,
    pub token_symbol: String,
    pub supply_label: String,
    /// Static entries appended after the live facts.
    pub links: Vec<StatusEntry>,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            testnet_banner: false,
            pledged_every: 2,
            growth_per_entry: 3,
            growth_unit: "PB".to_string(),
            token_symbol: "AI3".to_string(),
            supply_label: "1B".to_string(),
            links: Vec::new(),
        }
    }
}

/// Render the catalog for one refresh.
pub fn build_catalog(
    snapshot: &Snapshot,
    growth: &GrowthReport,
    reward: &RewardEstimate,
    opts: &CatalogOptions,
) -> StatusCatalog {
    let pledged = StatusEntry::new(
        "Total Pledged",
        snapshot
            .pledged_pb
            .map(|pb| format!("💾 {pb:.3} PB"))
            .unwrap_or_else(unavailable),
    );

    let mut facts = Vec::new();

    facts.push(StatusEntry::new(
        "Est Wins/TB/Day",
        if snapshot.pledged_pb.is_some() {
            format!(
                "🏆 {:.3}/day ({})",
                reward.total_per_day, reward.time_between_rewards
            )
        } else {
            unavailable()
        },
    ));

    let per_entry = opts.growth_per_entry.max(1);
    for chunk in growth.windows.chunks(per_entry) {
        let figures = chunk
            .iter()
            .map(|(name, value)| format!("{}: {}", short_label(name), value))
            .collect::<Vec<_>>()
            .join(" | ");
        facts.push(StatusEntry::new(
            format!("Growth {}", opts.growth_unit),
            format!("🌳 {figures}"),
        ));
    }

    facts.push(StatusEntry::new(
        "Latest Release",
        format!("🖥️  {}", snapshot.versions.node),
    ));
    facts.push(StatusEntry::new(
        "Latest Release",
        format!("🖥️  Space Acres: {}", snapshot.versions.space_acres),
    ));
    facts.push(StatusEntry::new(
        "History Size",
        snapshot
            .history_gb
            .map(|gb| format!("📜 {gb:.3} GB"))
            .unwrap_or_else(unavailable),
    ));
    facts.push(StatusEntry::new(
        "Block Height",
        snapshot
            .block_height
            .map(|h| format!("📏  #{h}"))
            .unwrap_or_else(unavailable),
    ));
    facts.push(StatusEntry::new(
        "In Circulation",
        snapshot
            .circulation
            .map(|c| {
                format!(
                    "💰 {}/{} {}",
                    group_thousands(c.max(0.0).floor() as u64),
                    opts.supply_label,
                    opts.token_symbol
                )
            })
            .unwrap_or_else(unavailable),
    ));
    facts.extend(opts.links.iter().cloned());

    let mut entries = Vec::with_capacity(facts.len() * 2);
    if opts.testnet_banner {
        entries.push(StatusEntry::new("👁️ Monitoring", "Testnet"));
    }
    entries.push(pledged.clone());
    for (i, fact) in facts.into_iter().enumerate() {
        if opts.pledged_every > 0 && i > 0 && i % opts.pledged_every == 0 {
            entries.push(pledged.clone());
        }
        entries.push(fact);
    }

    StatusCatalog::new(entries)
}

fn unavailable() -> String {
    UNAVAILABLE.to_string()
}

fn short_label(name: &str) -> &str {
    name.strip_suffix('d').unwrap_or(name)
}
