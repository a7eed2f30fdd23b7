// src/metrics.rs
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use crate::scheduler::{BoardView, StatusBoard};

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder. Later calls reuse the first one, so
    /// tests may call this freely.
    pub fn init() -> Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| {
                let handle = PrometheusBuilder::new()
                    .install_recorder()
                    .context("prometheus: install recorder")?;
                describe();
                Ok::<_, anyhow::Error>(handle)
            })?
            .clone();
        Ok(Self { handle })
    }

    /// `/metrics` in the Prometheus text format, plus `/status` and
    /// `/health` for the given board.
    pub fn router(&self, board: Arc<StatusBoard>) -> Router {
        let handle = self.handle.clone();
        Router::new()
            .route(
                "/metrics",
                get(move || {
                    let h = handle.clone();
                    async move { h.render() }
                }),
            )
            .merge(status_router(board))
    }
}

/// `/status` (board as JSON) and `/health`.
pub fn status_router(board: Arc<StatusBoard>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/health", get(|| async { "ok" }))
        .with_state(board)
}

async fn status(State(board): State<Arc<StatusBoard>>) -> Json<BoardView> {
    Json(board.view())
}

fn describe() {
    describe_counter!("refresh_runs_total", "Refreshes that installed a catalog");
    describe_counter!("refresh_errors_total", "Refreshes that failed and kept the previous catalog");
    describe_counter!("rotation_ticks_total", "Entries pushed to the presence sink");
    describe_counter!("rotation_skipped_total", "Rotation ticks skipped, by reason");
    describe_counter!("presence_denied_total", "Display name changes refused by a destination");
    describe_counter!("store_errors_total", "Sample store read/write failures");
    describe_gauge!("pledged_space_pb", "Latest total pledged space in PB");
    describe_gauge!("block_height", "Latest block height");
    describe_gauge!("store_samples", "Samples held in the history store");
    describe_gauge!("catalog_entries", "Entries in the installed catalog");
    describe_gauge!("refresh_last_run_ts", "Unix time of the last completed refresh");
}
