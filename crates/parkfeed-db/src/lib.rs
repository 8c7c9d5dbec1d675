//! Data layer for Parkfeed (`PostgreSQL` + `Dragonfly`).
//!
//! `PostgreSQL` is the read-only source of current lot and spot state.
//! `Dragonfly` is an optional, TTL-bound mirror of published snapshots and
//! versions. Both are exposed to the engine through the traits in
//! `parkfeed-core`.
//!
//! ```text
//! AvailabilityFeed
//!     |
//!     +-- AvailabilitySource --> PostgreSQL (PgAvailabilitySource)
//!     |                            parking_lots LEFT JOIN parking_spots
//!     |
//!     +-- SnapshotCache -------> Dragonfly (DragonflyPool)
//!                                  availability:snapshot:*, availability:version:*
//! ```
//!
//! # Modules
//!
//! - [`dragonfly`] -- `Dragonfly` snapshot cache
//! - [`lot_store`] -- Lot and spot queries and the `PostgreSQL` source
//! - [`postgres`] -- `PostgreSQL` connection pool and configuration
//! - [`error`] -- Shared error types

pub mod dragonfly;
pub mod error;
pub mod lot_store;
pub mod postgres;

// Re-export primary types for convenience.
pub use dragonfly::DragonflyPool;
pub use error::DbError;
pub use lot_store::{LotSpotRow, LotStore, PgAvailabilitySource};
pub use postgres::{PostgresConfig, PostgresPool};
