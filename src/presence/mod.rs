// src/presence/mod.rs
pub mod discord;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use tokio::sync::Mutex;

use crate::catalog::StatusEntry;
use crate::error::PresenceError;

/// A place where a display name can be set, e.g. one chat server.
pub type DestinationId = u64;

/// Where status entries end up.
#[async_trait]
pub trait PresenceSink: Send + Sync {
    /// Global status line.
    async fn set_status_text(&self, message: &str) -> Result<(), PresenceError>;

    /// Resolves once `destinations` is known. Sinks with a fixed set are
    /// ready immediately.
    async fn ready(&self) {}

    /// Destinations whose display name we manage.
    async fn destinations(&self) -> Vec<DestinationId>;

    async fn set_display_name(
        &self,
        destination: DestinationId,
        name: &str,
    ) -> Result<(), PresenceError>;

    fn name(&self) -> &'static str;
}

/// What one publish did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub status_applied: bool,
    pub renamed: usize,
    pub unchanged: usize,
    pub denied: usize,
    pub failed: usize,
}

/// Pushes an entry to a sink: status text once, then the display name to
/// every destination.
///
/// Names already applied to a destination are not re-sent. A rejection at
/// one destination is logged and the rest still get updated.
pub struct PresenceFanout {
    sink: Arc<dyn PresenceSink>,
    applied: Mutex<HashMap<DestinationId, String>>,
    pace: Duration,
}

impl PresenceFanout {
    pub fn new(sink: Arc<dyn PresenceSink>, pace: Duration) -> Self {
        Self {
            sink,
            applied: Mutex::new(HashMap::new()),
            pace,
        }
    }

    /// Wait up to `within` for the sink to learn its destinations.
    pub async fn wait_ready(&self, within: Duration) -> bool {
        tokio::time::timeout(within, self.sink.ready()).await.is_ok()
    }

    pub async fn publish(&self, entry: &StatusEntry) -> PublishReport {
        let mut report = PublishReport::default();

        match self.sink.set_status_text(&entry.message).await {
            Ok(()) => report.status_applied = true,
            Err(e) => {
                tracing::error!(target: "presence", sink = self.sink.name(), error = %e, "status update failed")
            }
        }

        let mut applied = self.applied.lock().await;
        for dest in self.sink.destinations().await {
            if applied.get(&dest).is_some_and(|n| *n == entry.label) {
                report.unchanged += 1;
                continue;
            }
            match self.sink.set_display_name(dest, &entry.label).await {
                Ok(()) => {
                    applied.insert(dest, entry.label.clone());
                    report.renamed += 1;
                    if !self.pace.is_zero() {
                        tokio::time::sleep(self.pace).await;
                    }
                }
                Err(e) if e.is_permission_denied() => {
                    tracing::warn!(target: "presence", destination = dest, "permission denied to change display name");
                    counter!("presence_denied_total").increment(1);
                    report.denied += 1;
                }
                Err(e) => {
                    tracing::error!(target: "presence", destination = dest, error = %e, "display name update failed");
                    report.failed += 1;
                }
            }
        }

        report
    }
}

/// Dry-run sink: logs what would be shown.
#[derive(Debug, Default)]
pub struct LogPresence;

/// The single destination [`LogPresence`] reports.
pub const LOG_DESTINATION: DestinationId = 0;

#[async_trait]
impl PresenceSink for LogPresence {
    async fn set_status_text(&self, message: &str) -> Result<(), PresenceError> {
        tracing::info!(target: "presence", text = message, "status text");
        Ok(())
    }

    async fn destinations(&self) -> Vec<DestinationId> {
        vec![LOG_DESTINATION]
    }

    async fn set_display_name(
        &self,
        destination: DestinationId,
        name: &str,
    ) -> Result<(), PresenceError> {
        tracing::info!(target: "presence", destination, name, "display name");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
