//! Shared application state for the availability API.
//!
//! [`AppState`] wraps the [`AvailabilityFeed`] that owns every live scope.
//! Handlers only hold it behind an `Arc`; all per-scope locking happens
//! inside the feed.

use std::time::Duration;

use parkfeed_core::AvailabilityFeed;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// The feed manager.
    pub feed: AvailabilityFeed,
}

impl AppState {
    /// Wrap a feed manager.
    pub const fn new(feed: AvailabilityFeed) -> Self {
        Self { feed }
    }

    /// Reconnect hint sent as the first frame of every stream.
    pub fn retry_hint(&self) -> Duration {
        self.feed.config().retry_hint()
    }

    /// Frames buffered per stream before the subscriber is dropped.
    pub fn sink_buffer(&self) -> usize {
        self.feed.config().sink_buffer
    }
}
