//! Integration tests for the availability API endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. The feed runs against an in-memory source so
//! no database is needed.

#![allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use futures::StreamExt;
use parkfeed_core::memory::MemorySource;
use parkfeed_core::{AvailabilityFeed, FeedConfig, ManualClock};
use parkfeed_server::router::build_router;
use parkfeed_server::state::AppState;
use parkfeed_types::{LotId, LotSnapshot, SpotId, SpotSnapshot, SpotStatus};
use serde_json::Value;
use tower::ServiceExt;

fn spot(id: i64, status: SpotStatus) -> SpotSnapshot {
    SpotSnapshot {
        id: SpotId(id),
        status,
        spot_number: format!("A-{id}"),
        floor_level: 1,
    }
}

fn make_test_state() -> Arc<AppState> {
    let source = Arc::new(MemorySource::new(vec![
        LotSnapshot::new(
            LotId(1),
            String::from("North Garage"),
            vec![
                spot(10, SpotStatus::Available),
                spot(11, SpotStatus::Occupied),
                spot(12, SpotStatus::Available),
            ],
        ),
        LotSnapshot::new(
            LotId(2),
            String::from("Riverside"),
            vec![spot(20, SpotStatus::Reserved)],
        ),
    ]));
    let feed = AvailabilityFeed::new(
        source,
        None,
        Arc::new(ManualClock::new(1_000)),
        FeedConfig::default(),
    );
    Arc::new(AppState::new(feed))
}

fn get(path: &str) -> Request<Body> {
    Request::get(path).body(Body::empty()).unwrap()
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_to_text(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Split SSE text into `(field, value)` pairs, ignoring blank lines.
fn sse_fields(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(field, value)| (field.to_owned(), value.trim_start().to_owned()))
        .collect()
}

/// Read a streaming body until `needle` shows up or two seconds pass.
async fn read_until(body: Body, needle: &str) -> String {
    let mut stream = body.into_data_stream();
    let mut text = String::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !text.contains(needle) {
        let next = tokio::time::timeout_at(deadline, stream.next()).await;
        match next {
            Ok(Some(Ok(chunk))) => text.push_str(&String::from_utf8_lossy(&chunk)),
            _ => break,
        }
    }
    text
}

async fn stats(app: &Router) -> Value {
    let response = app
        .clone()
        .oneshot(get("/api/availability/stats"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_to_json(response.into_body()).await
}

// =========================================================================
// REST
// =========================================================================

#[tokio::test]
async fn test_health() {
    let app = build_router(make_test_state());
    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_current_availability_lists_every_lot() {
    let app = build_router(make_test_state());
    let response = app.oneshot(get("/api/availability")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    let lots = json["lots"].as_array().unwrap();
    assert_eq!(lots.len(), 2);
    assert_eq!(lots[0]["name"], "North Garage");
    assert_eq!(lots[0]["spots"][1]["status"], "occupied");
    assert_eq!(lots[1]["spots"][0]["spot_number"], "A-20");
    assert!(json.get("version").is_none());
}

#[tokio::test]
async fn test_lot_availability() {
    let app = build_router(make_test_state());
    let response = app
        .oneshot(get("/api/availability/lots/1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["available"], 2);
    assert_eq!(json["lot"]["id"], 1);
    assert_eq!(json["lot"]["spots"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_lot_availability_not_found() {
    let app = build_router(make_test_state());
    let response = app
        .oneshot(get("/api/availability/lots/999"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], 404);
}

#[tokio::test]
async fn test_lot_availability_invalid_id() {
    let app = build_router(make_test_state());
    let response = app
        .oneshot(get("/api/availability/lots/north"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("north"));
}

#[tokio::test]
async fn test_stats_empty_without_streams() {
    let app = build_router(make_test_state());
    let json = stats(&app).await;

    assert_eq!(json["scopes"].as_array().unwrap().len(), 0);
    assert_eq!(json["subscribers"], 0);
    assert_eq!(json["running_timers"], 0);
}

// =========================================================================
// Streams
// =========================================================================

#[tokio::test]
async fn test_global_stream_opens_with_retry_then_snapshot() {
    let app = build_router(make_test_state());
    let response = app
        .oneshot(get("/api/availability/stream"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    assert!(content_type.starts_with("text/event-stream"));

    let text = read_until(response.into_body(), "North Garage").await;
    let fields = sse_fields(&text);
    assert_eq!(fields[0], (String::from("retry"), String::from("3000")));
    assert_eq!(fields[1], (String::from("event"), String::from("snapshot")));

    let payload: Value = serde_json::from_str(&fields[2].1).unwrap();
    assert_eq!(payload["version"], 1);
    assert_eq!(payload["lots"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_lot_stream_snapshot_holds_one_lot() {
    let app = build_router(make_test_state());
    let response = app
        .oneshot(get("/api/availability/lots/2/stream"))
        .await
        .unwrap();

    let text = read_until(response.into_body(), "Riverside").await;
    let fields = sse_fields(&text);
    assert_eq!(fields[1].1, "snapshot");

    let payload: Value = serde_json::from_str(&fields[2].1).unwrap();
    let lots = payload["lots"].as_array().unwrap();
    assert_eq!(lots.len(), 1);
    assert_eq!(lots[0]["id"], 2);
}

#[tokio::test]
async fn test_lot_stream_invalid_id_sends_error_and_ends() {
    let app = build_router(make_test_state());
    let response = app
        .oneshot(get("/api/availability/lots/abc/stream"))
        .await
        .unwrap();

    let text = body_to_text(response.into_body()).await;
    let fields = sse_fields(&text);
    assert_eq!(fields[0].0, "retry");
    assert_eq!(fields[1], (String::from("event"), String::from("error")));

    let payload: Value = serde_json::from_str(&fields[2].1).unwrap();
    assert_eq!(payload["message"], "invalid lot id: abc");
}

#[tokio::test]
async fn test_lot_stream_unknown_lot_sends_error_and_ends() {
    let state = make_test_state();
    let app = build_router(Arc::clone(&state));
    let response = app
        .oneshot(get("/api/availability/lots/999/stream"))
        .await
        .unwrap();

    let text = body_to_text(response.into_body()).await;
    let fields = sse_fields(&text);
    assert_eq!(fields[1].1, "error");

    let payload: Value = serde_json::from_str(&fields[2].1).unwrap();
    assert!(payload["message"].as_str().unwrap().contains("lot:999"));
    assert!(state.feed.scope_stats().is_empty());
}

#[tokio::test]
async fn test_open_stream_shows_in_stats() {
    let app = build_router(make_test_state());
    let response = app
        .clone()
        .oneshot(get("/api/availability/stream"))
        .await
        .unwrap();
    let body = response.into_body();

    let json = stats(&app).await;
    let scopes = json["scopes"].as_array().unwrap();
    assert_eq!(scopes.len(), 1);
    assert_eq!(scopes[0]["scope"], "global");
    assert_eq!(scopes[0]["phase"], "active");
    assert_eq!(scopes[0]["version"], 1);
    assert_eq!(json["subscribers"], 1);
    assert_eq!(json["running_timers"], 1);

    drop(body);
}

#[tokio::test]
async fn test_dropping_stream_detaches_subscriber() {
    let state = make_test_state();
    let app = build_router(Arc::clone(&state));
    let response = app
        .oneshot(get("/api/availability/lots/1/stream"))
        .await
        .unwrap();

    assert_eq!(state.feed.scope_stats().len(), 1);
    drop(response);
    assert!(state.feed.scope_stats().is_empty());
}

#[tokio::test]
async fn test_rest_reports_live_version() {
    let state = make_test_state();
    let app = build_router(Arc::clone(&state));
    let stream = app
        .clone()
        .oneshot(get("/api/availability/stream"))
        .await
        .unwrap();

    let response = app.oneshot(get("/api/availability")).await.unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["version"], 1);

    drop(stream);
}
