//! Error types for the data layer.
//!
//! All errors are propagated via [`DbError`] which wraps the underlying
//! [`sqlx`] and [`fred`] errors. At the engine boundary a [`DbError`]
//! becomes a [`StorageError`] (queries) or a [`CacheError`] (cache calls),
//! so the engine never sees driver types.

use parkfeed_core::{CacheError, StorageError};

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `Dragonfly`/Redis operation failed.
    #[error("Dragonfly error: {0}")]
    Dragonfly(#[from] fred::error::Error),

    /// A row could not be mapped onto the snapshot model.
    #[error("Invalid row: {0}")]
    InvalidRow(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<DbError> for StorageError {
    fn from(err: DbError) -> Self {
        Self::new(err.to_string())
    }
}

impl From<DbError> for CacheError {
    fn from(err: DbError) -> Self {
        Self::new(err.to_string())
    }
}
