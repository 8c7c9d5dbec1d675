//! REST endpoint handlers for the availability API.
//!
//! These serve clients that poll instead of streaming, plus operational
//! status. Snapshots are built on demand and never touch scope state.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Liveness probe |
//! | `GET` | `/api/availability` | Current state of every lot |
//! | `GET` | `/api/availability/lots/{lot_id}` | Current state of one lot |
//! | `GET` | `/api/availability/stats` | Live scopes and timers |

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use parkfeed_core::ScopePhase;
use parkfeed_types::{LotId, LotSnapshot, Scope};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `ok` while the process serves requests.
    pub status: &'static str,
}

/// Body of `GET /api/availability`.
#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    /// Version of the live global feed, if one is running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    /// Every lot with its spots.
    pub lots: Vec<LotSnapshot>,
}

/// Body of `GET /api/availability/lots/{lot_id}`.
#[derive(Debug, Serialize)]
pub struct LotResponse {
    /// Version of the live lot feed, if one is running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    /// Available spots in the lot.
    pub available: usize,
    /// The lot with its spots.
    pub lot: LotSnapshot,
}

/// One live scope in `GET /api/availability/stats`.
#[derive(Debug, Serialize)]
pub struct ScopeStatsBody {
    /// `global` or `lot:{id}`.
    pub scope: String,
    /// Attached subscribers.
    pub subscribers: usize,
    /// Current version.
    pub version: u64,
    /// `warming_up` or `active`.
    pub phase: ScopePhase,
}

/// Body of `GET /api/availability/stats`.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Live scopes, global first.
    pub scopes: Vec<ScopeStatsBody>,
    /// Subscribers across all scopes.
    pub subscribers: usize,
    /// Timer tasks still running.
    pub running_timers: usize,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Liveness probe.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Current state of every lot.
///
/// # Errors
///
/// Returns [`ApiError::Storage`] (503) if storage cannot be queried.
pub async fn current_availability(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let snapshot = state.feed.build_global().await?;
    let version = state.feed.current_snapshot(Scope::Global).map(|(_, v)| v);
    Ok(Json(AvailabilityResponse {
        version,
        lots: snapshot.into_lots(),
    }))
}

/// Current state of one lot.
///
/// # Errors
///
/// Returns [`ApiError::InvalidLotId`] (400) for a malformed id,
/// [`ApiError::NotFound`] (404) for a missing lot, or
/// [`ApiError::Storage`] (503) if storage cannot be queried.
pub async fn lot_availability(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Result<Json<LotResponse>, ApiError> {
    let id: LotId = raw.parse()?;
    let lot = state
        .feed
        .build_lot(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("lot {id}")))?;
    let version = state.feed.current_snapshot(Scope::Lot(id)).map(|(_, v)| v);
    Ok(Json(LotResponse {
        version,
        available: lot.available_count(),
        lot,
    }))
}

/// Live scopes and timers.
pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let scopes: Vec<ScopeStatsBody> = state
        .feed
        .scope_stats()
        .into_iter()
        .map(|s| ScopeStatsBody {
            scope: s.scope.to_string(),
            subscribers: s.subscribers,
            version: s.version,
            phase: s.phase,
        })
        .collect();
    let subscribers = scopes
        .iter()
        .fold(0_usize, |acc, s| acc.saturating_add(s.subscribers));

    Json(StatsResponse {
        scopes,
        subscribers,
        running_timers: state.feed.running_timers(),
    })
}
