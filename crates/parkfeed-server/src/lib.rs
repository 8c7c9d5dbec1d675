//! Availability API server for Parkfeed.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **Server-Sent Events streams** for the global feed
//!   (`/api/availability/stream`) and per-lot feeds
//!   (`/api/availability/lots/{lot_id}/stream`)
//! - **REST endpoints** for clients that poll instead of stream, plus
//!   live scope statistics
//!
//! # Architecture
//!
//! Every stream attaches a bounded [`ChannelSink`] to the shared
//! [`AvailabilityFeed`]. The feed polls storage once per scope, diffs,
//! and fans frames out to every attached sink. Dropping the response body
//! detaches the sink.
//!
//! [`ChannelSink`]: parkfeed_core::ChannelSink
//! [`AvailabilityFeed`]: parkfeed_core::AvailabilityFeed

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod stream;

// Re-export primary types for convenience.
pub use error::ApiError;
pub use router::build_router;
pub use server::{start_server, ServerConfig, ServerError};
pub use startup::{build_state, StartupError};
pub use state::AppState;
