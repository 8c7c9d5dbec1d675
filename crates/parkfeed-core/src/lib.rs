//! Real-time availability engine for Parkfeed.
//!
//! This crate turns periodic state queries into a live feed of incremental
//! changes, fanned out to subscribers at two granularities: one global feed
//! and one feed per lot.
//!
//! # Modules
//!
//! - [`builder`] -- [`AvailabilitySource`] storage seam and [`SnapshotBuilder`].
//! - [`clock`] -- [`Clock`] trait for heartbeat timestamps.
//! - [`config`] -- Configuration loading from `parkfeed-config.yaml` into
//!   strongly-typed structs.
//! - [`diff`] -- Pure snapshot diffing and delta application.
//! - [`error`] -- Engine error types.
//! - [`memory`] -- In-memory source and cache for tests and local runs.
//! - [`registry`] -- Per-scope subscriber sets and broadcast fan-out.
//! - [`scheduler`] -- [`AvailabilityFeed`], the per-scope poll loop and
//!   scope lifecycle.
//! - [`sink`] -- Subscriber sinks and encoded frames.
//! - [`store`] -- Cache-backed snapshot and version persistence.
//!
//! [`AvailabilitySource`]: builder::AvailabilitySource
//! [`SnapshotBuilder`]: builder::SnapshotBuilder
//! [`Clock`]: clock::Clock
//! [`AvailabilityFeed`]: scheduler::AvailabilityFeed

pub mod builder;
pub mod clock;
pub mod config;
pub mod diff;
pub mod error;
pub mod memory;
pub mod registry;
pub mod scheduler;
pub mod sink;
pub mod store;

pub use builder::{AvailabilitySource, SnapshotBuilder};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, FeedConfig, ParkfeedConfig};
pub use error::{CacheError, FeedError, SinkError, StorageError};
pub use scheduler::{AvailabilityFeed, ScopePhase, ScopeStats, Subscription};
pub use sink::{ChannelSink, Frame, Sink};
pub use store::{SnapshotCache, SnapshotStore};
