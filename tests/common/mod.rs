// tests/common/mod.rs
// Hand-written collaborators shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pledge_pulse::chain::version::{FixedVersionSource, VersionInfo};
use pledge_pulse::chain::FixedChainSource;
use pledge_pulse::error::{PresenceError, UpstreamError};
use pledge_pulse::presence::{DestinationId, PresenceSink};
use pledge_pulse::snapshot::{BLOCKCHAIN_HISTORY_SIZE, CREDIT_SUPPLY, FEES_PALLET, TOTAL_SPACE_PLEDGED};
use pledge_pulse::ChainDataSource;
use tokio::sync::{watch, Notify};

/// Chain with 3.5 PB pledged, 400 GB history, 250M tokens out.
pub fn healthy_chain() -> FixedChainSource {
    FixedChainSource::new()
        .with_constant(FEES_PALLET, TOTAL_SPACE_PLEDGED, 3.5e15)
        .with_constant(FEES_PALLET, BLOCKCHAIN_HISTORY_SIZE, 400e9)
        .with_constant(FEES_PALLET, CREDIT_SUPPLY, 250_000_000e18)
        .with_block_height(4_200_000)
}

pub fn versions() -> FixedVersionSource {
    FixedVersionSource(VersionInfo {
        node: "mainnet-2025-jun-01".into(),
        space_acres: "0.2.14".into(),
    })
}

/// Delegates to an inner source until `broken` is set, then panics.
pub struct FlakyChain {
    pub inner: FixedChainSource,
    pub broken: AtomicBool,
}

impl FlakyChain {
    pub fn new(inner: FixedChainSource) -> Self {
        Self {
            inner,
            broken: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ChainDataSource for FlakyChain {
    async fn get_constant(&self, pallet: &str, name: &str) -> Result<f64, UpstreamError> {
        if self.broken.load(Ordering::SeqCst) {
            panic!("node client blew up");
        }
        self.inner.get_constant(pallet, name).await
    }

    async fn get_block_height(&self) -> Result<u64, UpstreamError> {
        self.inner.get_block_height().await
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}

/// Records everything it is asked to show.
#[derive(Default)]
pub struct RecordingSink {
    pub destinations: Vec<DestinationId>,
    pub deny: HashSet<DestinationId>,
    pub statuses: Mutex<Vec<String>>,
    pub renames: Mutex<Vec<(DestinationId, String)>>,
    /// When set, `set_status_text` waits for `release` after signalling
    /// `entered`.
    pub gate: Option<Arc<Gate>>,
    /// When set, destinations stay hidden until it reads `true`, the way a
    /// chat connection only learns its servers after logging in.
    pub online: Option<watch::Sender<bool>>,
}

#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
    pub calls: AtomicUsize,
}

impl RecordingSink {
    pub fn new(destinations: &[DestinationId]) -> Self {
        Self {
            destinations: destinations.to_vec(),
            ..Self::default()
        }
    }

    pub fn denying(mut self, dest: DestinationId) -> Self {
        self.deny.insert(dest);
        self
    }

    pub fn gated(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn late(mut self) -> Self {
        self.online = Some(watch::Sender::new(false));
        self
    }

    pub fn go_online(&self) {
        if let Some(online) = &self.online {
            online.send_replace(true);
        }
    }

    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn renames(&self) -> Vec<(DestinationId, String)> {
        self.renames.lock().unwrap().clone()
    }
}

#[async_trait]
impl PresenceSink for RecordingSink {
    async fn set_status_text(&self, message: &str) -> Result<(), PresenceError> {
        if let Some(gate) = &self.gate {
            gate.calls.fetch_add(1, Ordering::SeqCst);
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        self.statuses.lock().unwrap().push(message.to_string());
        Ok(())
    }

    async fn ready(&self) {
        if let Some(online) = &self.online {
            let mut rx = online.subscribe();
            let _ = rx.wait_for(|up| *up).await;
        }
    }

    async fn destinations(&self) -> Vec<DestinationId> {
        match &self.online {
            Some(online) if !*online.borrow() => Vec::new(),
            _ => self.destinations.clone(),
        }
    }

    async fn set_display_name(
        &self,
        destination: DestinationId,
        name: &str,
    ) -> Result<(), PresenceError> {
        if self.deny.contains(&destination) {
            return Err(PresenceError::PermissionDenied { destination });
        }
        self.renames
            .lock()
            .unwrap()
            .push((destination, name.to_string()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
