//! # Rotation Scheduler
//! Two periodic actions over one shared [`StatusBoard`]:
//!
//! - **refresh** (slow): fetch a [`Snapshot`], record growth, rebuild the
//!   catalog and install it in one swap;
//! - **rotation** (fast): advance the cursor and push that entry through the
//!   [`PresenceFanout`].
//!
//! Rotation only ever reads the last fully built catalog, so a slow refresh
//! never holds it up. A failed refresh leaves the previous catalog in place.
//!
//! Lifecycle: `Stopped → Starting → Rotating ⇄ Refreshing → Stopped`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Result;
use metrics::{counter, gauge};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::catalog::{build_catalog, CatalogOptions, StatusCatalog, StatusEntry};
use crate::chain::version::VersionSource;
use crate::chain::ChainDataSource;
use crate::error::StorageError;
use crate::growth::{GrowthCalculator, GrowthReport};
use crate::presence::{PresenceFanout, PublishReport};
use crate::reward::{estimate_rewards, RewardParams};
use crate::snapshot::{collect_snapshot, FetchPolicy, Snapshot};
use crate::store::{RetentionPolicy, SampleStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Stopped,
    Starting,
    Rotating,
    /// Rotating while a refresh runs in the background.
    Refreshing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Stopped,
    Starting,
    Running,
}

#[derive(Debug)]
struct BoardState {
    catalog: Arc<StatusCatalog>,
    cursor: Option<usize>,
    lifecycle: Lifecycle,
    refreshing: bool,
    installs: u64,
}

/// The installed catalog plus the rotation cursor.
///
/// `cursor` is the index last shown, `None` before the first rotation or
/// after a shorter catalog pushed it out of range.
#[derive(Debug)]
pub struct StatusBoard {
    state: Mutex<BoardState>,
}

/// Read-only copy of the board, served on `/status`.
#[derive(Debug, Clone, Serialize)]
pub struct BoardView {
    pub phase: Phase,
    pub cursor: Option<usize>,
    pub installs: u64,
    pub entries: Vec<StatusEntry>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BoardState {
                catalog: Arc::new(StatusCatalog::default()),
                cursor: None,
                lifecycle: Lifecycle::Stopped,
                refreshing: false,
                installs: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swap in a new catalog. Returns its length.
    pub fn install(&self, catalog: StatusCatalog) -> usize {
        let len = catalog.len();
        let mut st = self.lock();
        st.catalog = Arc::new(catalog);
        if st.cursor.is_some_and(|c| c >= len) {
            st.cursor = None;
        }
        st.installs += 1;
        len
    }

    pub fn current(&self) -> Arc<StatusCatalog> {
        self.lock().catalog.clone()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.lock().cursor
    }

    /// Move the cursor one step and return the entry it lands on, or `None`
    /// when nothing is installed.
    pub fn advance(&self) -> Option<(usize, StatusEntry)> {
        let mut st = self.lock();
        let len = st.catalog.len();
        if len == 0 {
            return None;
        }
        let next = st.cursor.map_or(0, |c| (c + 1) % len);
        st.cursor = Some(next);
        st.catalog.get(next).cloned().map(|e| (next, e))
    }

    pub fn phase(&self) -> Phase {
        let st = self.lock();
        match st.lifecycle {
            Lifecycle::Stopped => Phase::Stopped,
            Lifecycle::Starting => Phase::Starting,
            Lifecycle::Running if st.refreshing => Phase::Refreshing,
            Lifecycle::Running => Phase::Rotating,
        }
    }

    pub fn view(&self) -> BoardView {
        let phase = self.phase();
        let st = self.lock();
        BoardView {
            phase,
            cursor: st.cursor,
            installs: st.installs,
            entries: st.catalog.entries().to_vec(),
        }
    }

    fn set_lifecycle(&self, lifecycle: Lifecycle) {
        self.lock().lifecycle = lifecycle;
    }

    fn set_refreshing(&self, refreshing: bool) {
        self.lock().refreshing = refreshing;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationOutcome {
    Shown { index: usize, label: String },
    /// No catalog installed yet.
    Empty,
    /// The previous rotation is still talking to the sink.
    Busy,
}

/// Clears the in-flight flag even if the publish future is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Rotator {
    board: Arc<StatusBoard>,
    fanout: Arc<PresenceFanout>,
    in_flight: AtomicBool,
}

impl Rotator {
    pub fn new(board: Arc<StatusBoard>, fanout: Arc<PresenceFanout>) -> Self {
        Self {
            board,
            fanout,
            in_flight: AtomicBool::new(false),
        }
    }

    /// One rotation step. Overlapping calls are skipped, not queued.
    pub async fn tick(&self) -> RotationOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            counter!("rotation_skipped_total", "reason" => "busy").increment(1);
            tracing::debug!(target: "rotation", "previous update still in flight, skipping tick");
            return RotationOutcome::Busy;
        }
        let _guard = InFlight(&self.in_flight);

        let Some((index, entry)) = self.board.advance() else {
            counter!("rotation_skipped_total", "reason" => "empty").increment(1);
            tracing::warn!(target: "rotation", "no status catalog installed yet, skipping tick");
            return RotationOutcome::Empty;
        };

        let report = self.fanout.publish(&entry).await;
        counter!("rotation_ticks_total").increment(1);
        tracing::debug!(
            target: "rotation",
            index,
            label = %entry.label,
            renamed = report.renamed,
            denied = report.denied,
            failed = report.failed,
            "rotated"
        );

        RotationOutcome::Shown {
            index,
            label: entry.label,
        }
    }

    /// Publish a one-off entry outside the rotation, e.g. at startup.
    /// Waits up to `ready_within` for the sink to learn its destinations so
    /// the display name reaches them too.
    pub async fn greet(&self, entry: &StatusEntry, ready_within: Duration) -> PublishReport {
        if !self.fanout.wait_ready(ready_within).await {
            tracing::warn!(
                target: "presence",
                waited_secs = ready_within.as_secs(),
                "presence sink not ready, greeting without display names"
            );
        }
        self.fanout.publish(entry).await
    }
}

/// Everything one refresh needs besides its collaborators.
#[derive(Debug, Clone, Default)]
pub struct RefreshSettings {
    pub reward: RewardParams,
    pub catalog: CatalogOptions,
    pub retention: RetentionPolicy,
    pub fetch: FetchPolicy,
}

pub struct Refresher {
    chain: Arc<dyn ChainDataSource>,
    versions: Arc<dyn VersionSource>,
    store: Arc<SampleStore>,
    growth: GrowthCalculator,
    settings: RefreshSettings,
    board: Arc<StatusBoard>,
    last: tokio::sync::Mutex<Option<Snapshot>>,
}

/// Clears the board's refreshing flag on every exit path.
struct Refreshing<'a>(&'a StatusBoard);

impl Drop for Refreshing<'_> {
    fn drop(&mut self) {
        self.0.set_refreshing(false);
    }
}

impl Refresher {
    pub fn new(
        chain: Arc<dyn ChainDataSource>,
        versions: Arc<dyn VersionSource>,
        store: Arc<SampleStore>,
        growth: GrowthCalculator,
        settings: RefreshSettings,
        board: Arc<StatusBoard>,
    ) -> Self {
        Self {
            chain,
            versions,
            store,
            growth,
            settings,
            board,
            last: tokio::sync::Mutex::new(None),
        }
    }

    /// Last snapshot a refresh produced.
    pub async fn last_snapshot(&self) -> Option<Snapshot> {
        self.last.lock().await.clone()
    }

    pub async fn refresh_once(&self) -> Result<usize> {
        self.refresh_at(unix_now()).await
    }

    /// Run one refresh as of `now` (unix seconds) and install the result.
    /// Returns the new catalog length.
    pub async fn refresh_at(&self, now: f64) -> Result<usize> {
        self.board.set_refreshing(true);
        let _guard = Refreshing(&self.board);

        let mut last = self.last.lock().await;
        let snapshot = collect_snapshot(
            self.chain.as_ref(),
            self.versions.as_ref(),
            last.as_ref(),
            &self.settings.fetch,
            now,
        )
        .await;

        let growth = self.record_growth(&snapshot, now).await?;
        let reward = estimate_rewards(snapshot.pledged_pb.unwrap_or(0.0), &self.settings.reward);
        let catalog = build_catalog(&snapshot, &growth, &reward, &self.settings.catalog);
        let len = self.board.install(catalog);

        if let Some(pb) = snapshot.pledged_pb {
            gauge!("pledged_space_pb").set(pb);
        }
        if let Some(h) = snapshot.block_height {
            gauge!("block_height").set(h as f64);
        }
        gauge!("catalog_entries").set(len as f64);
        gauge!("refresh_last_run_ts").set(now);
        counter!("refresh_runs_total").increment(1);

        tracing::info!(
            target: "refresh",
            pledged_pb = ?snapshot.pledged_pb,
            fresh = snapshot.pledged_fresh,
            block_height = ?snapshot.block_height,
            entries = len,
            "catalog refreshed"
        );

        *last = Some(snapshot);
        Ok(len)
    }

    /// Refresh behind a task boundary: errors and panics are logged and the
    /// previous catalog stays installed. Returns whether a catalog was
    /// installed.
    pub async fn refresh_guarded(self: &Arc<Self>) -> bool {
        let this = Arc::clone(self);
        match tokio::spawn(async move { this.refresh_once().await }).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                counter!("refresh_errors_total").increment(1);
                tracing::error!(target: "refresh", error = ?e, "refresh failed, keeping previous catalog");
                false
            }
            Err(e) => {
                counter!("refresh_errors_total").increment(1);
                tracing::error!(target: "refresh", error = %e, "refresh task aborted, keeping previous catalog");
                false
            }
        }
    }

    /// Store work runs on the blocking pool so the rotation timer never
    /// waits on SQLite.
    async fn record_growth(&self, snapshot: &Snapshot, now: f64) -> Result<GrowthReport> {
        let store = Arc::clone(&self.store);
        let growth = self.growth.clone();
        let retention = self.settings.retention;
        let fresh = snapshot.pledged_pb.filter(|_| snapshot.pledged_fresh);

        let report = tokio::task::spawn_blocking(move || {
            let report = match fresh {
                Some(pb) => growth.observe(&store, pb, now),
                None => growth.evaluate(&store, now),
            };
            match store.prune(retention, now) {
                Ok(0) => {}
                Ok(n) => tracing::debug!(target: "store", pruned = n, "pruned expired samples"),
                Err(e) => {
                    counter!("store_errors_total").increment(1);
                    tracing::error!(target: "store", error = %e, "prune failed");
                }
            }
            if let Ok(n) = store.len() {
                gauge!("store_samples").set(n as f64);
            }
            report
        })
        .await
        .map_err(|e| StorageError::Join(e.to_string()))?;

        Ok(report)
    }
}

fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

#[derive(Debug, Clone, Copy)]
pub struct ScheduleTiming {
    pub refresh: Duration,
    pub rotation: Duration,
    pub startup_delay: Duration,
    /// Upper bound on waiting for the sink before greeting.
    pub ready_timeout: Duration,
}

impl Default for ScheduleTiming {
    fn default() -> Self {
        Self {
            refresh: Duration::from_secs(130),
            rotation: Duration::from_secs(14),
            startup_delay: Duration::from_secs(3),
            ready_timeout: Duration::from_secs(30),
        }
    }
}

pub struct Scheduler {
    board: Arc<StatusBoard>,
    refresher: Arc<Refresher>,
    rotator: Arc<Rotator>,
    timing: ScheduleTiming,
    greeting: Option<StatusEntry>,
}

impl Scheduler {
    pub fn new(
        board: Arc<StatusBoard>,
        refresher: Arc<Refresher>,
        rotator: Arc<Rotator>,
        timing: ScheduleTiming,
    ) -> Self {
        Self {
            board,
            refresher,
            rotator,
            timing,
            greeting: None,
        }
    }

    /// Entry published once while starting up.
    pub fn with_greeting(mut self, entry: StatusEntry) -> Self {
        self.greeting = Some(entry);
        self
    }

    pub fn board(&self) -> &Arc<StatusBoard> {
        &self.board
    }

    /// Run both timers until `shutdown` fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        self.board.set_lifecycle(Lifecycle::Starting);
        tracing::info!(
            target: "rotation",
            refresh_secs = self.timing.refresh.as_secs(),
            rotation_secs = self.timing.rotation.as_secs(),
            "scheduler starting"
        );

        let refresh_loop = spawn_refresh_loop(Arc::clone(&self.refresher), self.timing.refresh);

        if let Some(greeting) = &self.greeting {
            tokio::select! {
                _ = self.rotator.greet(greeting, self.timing.ready_timeout) => {}
                _ = shutdown.recv() => {
                    self.stop(refresh_loop);
                    return;
                }
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(self.timing.startup_delay) => {}
            _ = shutdown.recv() => {
                self.stop(refresh_loop);
                return;
            }
        }

        self.board.set_lifecycle(Lifecycle::Running);
        let mut ticker = tokio::time::interval(self.timing.rotation);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let rotator = Arc::clone(&self.rotator);
                    tokio::spawn(async move { rotator.tick().await });
                }
                _ = shutdown.recv() => break,
            }
        }

        self.stop(refresh_loop);
    }

    fn stop(&self, refresh_loop: JoinHandle<()>) {
        refresh_loop.abort();
        self.board.set_lifecycle(Lifecycle::Stopped);
        tracing::info!(target: "rotation", "scheduler stopped");
    }
}

fn spawn_refresh_loop(refresher: Arc<Refresher>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            refresher.refresh_guarded().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(n: usize) -> StatusCatalog {
        StatusCatalog::new(
            (0..n)
                .map(|i| StatusEntry::new(format!("L{i}"), format!("m{i}")))
                .collect(),
        )
    }

    #[test]
    fn first_advance_shows_entry_zero() {
        let board = StatusBoard::new();
        assert!(board.advance().is_none());
        board.install(catalog(3));
        assert_eq!(board.advance().map(|(i, _)| i), Some(0));
        assert_eq!(board.advance().map(|(i, _)| i), Some(1));
    }

    #[test]
    fn shorter_catalog_resets_out_of_range_cursor() {
        let board = StatusBoard::new();
        board.install(catalog(5));
        for _ in 0..4 {
            board.advance();
        }
        assert_eq!(board.cursor(), Some(3));
        board.install(catalog(2));
        assert_eq!(board.cursor(), None);
        assert_eq!(board.advance().map(|(i, _)| i), Some(0));
    }

    #[test]
    fn cursor_in_range_survives_install() {
        let board = StatusBoard::new();
        board.install(catalog(5));
        board.advance();
        board.advance();
        board.install(catalog(4));
        assert_eq!(board.advance().map(|(i, _)| i), Some(2));
    }

    #[test]
    fn phase_tracks_lifecycle_and_refresh() {
        let board = StatusBoard::new();
        assert_eq!(board.phase(), Phase::Stopped);
        board.set_lifecycle(Lifecycle::Running);
        assert_eq!(board.phase(), Phase::Rotating);
        board.set_refreshing(true);
        assert_eq!(board.phase(), Phase::Refreshing);
        assert_eq!(board.view().phase, Phase::Refreshing);
    }
}
