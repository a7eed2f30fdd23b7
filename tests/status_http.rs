// tests/status_http.rs
mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::{self, Body};
use http::{Request, StatusCode};
use pledge_pulse::catalog::{StatusCatalog, StatusEntry};
use pledge_pulse::metrics::{status_router, Metrics};
use pledge_pulse::presence::PresenceFanout;
use pledge_pulse::scheduler::{Rotator, StatusBoard};
use serde_json::Value;
use tower::ServiceExt; // for `oneshot`

fn board_with_two_entries() -> Arc<StatusBoard> {
    let board = Arc::new(StatusBoard::new());
    board.install(StatusCatalog::new(vec![
        StatusEntry::new("Total Pledged", "💾 3.500 PB"),
        StatusEntry::new("Block Height", "📏  #42"),
    ]));
    board
}

async fn get(router: axum::Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let resp = router
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    // axum::body::to_bytes requires an explicit limit
    let bytes = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    (status, bytes.to_vec())
}

#[tokio::test]
async fn status_reports_catalog_cursor_and_phase() {
    let board = board_with_two_entries();
    board.advance();

    let (status, body) = get(status_router(board), "/status").await;
    assert_eq!(status, StatusCode::OK);

    let v: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["phase"], "stopped");
    assert_eq!(v["cursor"], 0);
    assert_eq!(v["entries"].as_array().unwrap().len(), 2);
    assert_eq!(v["entries"][1]["label"], "Block Height");
}

#[tokio::test]
async fn health_is_plain_ok() {
    let (status, body) = get(status_router(Arc::new(StatusBoard::new())), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok");
}

#[tokio::test]
async fn metrics_endpoint_exposes_rotation_counters() {
    let metrics = Metrics::init().unwrap();
    // A second init reuses the installed recorder.
    assert!(Metrics::init().is_ok());

    let board = board_with_two_entries();
    let sink = Arc::new(common::RecordingSink::new(&[1]));
    let rotator = Rotator::new(
        board.clone(),
        Arc::new(PresenceFanout::new(sink, Duration::ZERO)),
    );
    rotator.tick().await;

    let (status, body) = get(metrics.router(board), "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("rotation_ticks_total"), "metrics output:\n{text}");
}
