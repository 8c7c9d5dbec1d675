//! Axum router construction for the availability API.
//!
//! Assembles the stream and REST routes into a single [`Router`] with
//! CORS enabled for browser clients and HTTP request tracing.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::stream;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /health` -- liveness probe
/// - `GET /api/availability/stream` -- global SSE feed
/// - `GET /api/availability/lots/{lot_id}/stream` -- per-lot SSE feed
/// - `GET /api/availability` -- current state of every lot
/// - `GET /api/availability/lots/{lot_id}` -- current state of one lot
/// - `GET /api/availability/stats` -- live scopes and timers
///
/// CORS allows any origin; the feed is read-only.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        // Streams
        .route("/api/availability/stream", get(stream::global_stream))
        .route(
            "/api/availability/lots/{lot_id}/stream",
            get(stream::lot_stream),
        )
        // REST API
        .route("/api/availability", get(handlers::current_availability))
        .route(
            "/api/availability/lots/{lot_id}",
            get(handlers::lot_availability),
        )
        .route("/api/availability/stats", get(handlers::stats))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
