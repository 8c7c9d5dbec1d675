//! Shared type definitions for Parkfeed.
//!
//! This crate is the single source of truth for the availability model and
//! the push-feed wire format. Payload types flow downstream to `TypeScript`
//! via `ts-rs` so dashboard clients decode exactly what the server sends.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe wrappers for lot and spot identifiers
//! - [`enums`] -- Spot status and subscription scope
//! - [`structs`] -- Snapshots and deltas
//! - [`events`] -- Push-channel event variants and payloads

pub mod enums;
pub mod events;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{ParseStatusError, Scope, SpotStatus};
pub use events::{ErrorPayload, FeedEvent, HeartbeatPayload, SnapshotPayload};
pub use ids::{LotId, ParseIdError, SpotId};
pub use structs::{ChangedLot, Delta, LotSnapshot, Snapshot, SpotSnapshot};
