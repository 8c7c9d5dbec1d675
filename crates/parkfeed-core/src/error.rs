//! Error types for the availability engine.
//!
//! Failures are scoped: a [`StorageError`] aborts one tick of one scope, a
//! [`CacheError`] is swallowed by the snapshot store, a [`SinkError`] prunes
//! one subscriber. Only [`FeedError::InvalidTarget`] reaches a client, as a
//! terminal `error` frame.

use parkfeed_types::Scope;

/// The storage collaborator failed to answer a state query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("storage query failed: {message}")]
pub struct StorageError {
    /// Description of the underlying failure.
    pub message: String,
}

impl StorageError {
    /// Wrap any displayable failure.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The shared cache failed or returned unusable data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cache unavailable: {message}")]
pub struct CacheError {
    /// Description of the underlying failure.
    pub message: String,
}

impl CacheError {
    /// Wrap any displayable failure.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A frame could not be written to a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// The receiving side has gone away.
    #[error("sink closed")]
    Closed,

    /// The subscriber stopped reading and its buffer is full.
    #[error("sink buffer full")]
    Full,
}

/// Errors surfaced by [`AvailabilityFeed`](crate::scheduler::AvailabilityFeed).
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Storage failed while building a snapshot.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The subscription target does not exist.
    #[error("subscription target {0} does not exist")]
    InvalidTarget(Scope),
}
