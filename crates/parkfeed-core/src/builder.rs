//! Snapshot construction from the storage collaborator.
//!
//! [`AvailabilitySource`] is the read-only "current state" query the engine
//! consumes; the `PostgreSQL` implementation lives in `parkfeed-db`. A
//! change-data-capture feed could replace polling behind the same seam.
//!
//! [`SnapshotBuilder`] turns source answers into canonical [`Snapshot`]s.
//! It never retries: a storage error goes straight back to the caller,
//! which for the scheduler means "skip this tick".

use std::sync::Arc;

use async_trait::async_trait;
use parkfeed_types::{LotId, LotSnapshot, Scope, Snapshot};

use crate::error::StorageError;

/// Read-only access to current lot and spot state.
#[async_trait]
pub trait AvailabilitySource: Send + Sync {
    /// All lots with all of their spots.
    async fn query_all_lots_with_spots(&self) -> Result<Snapshot, StorageError>;

    /// One lot with its spots, or `None` if the lot does not exist.
    async fn query_lot_with_spots(&self, id: LotId) -> Result<Option<LotSnapshot>, StorageError>;
}

/// Builds canonical snapshots for a scope.
#[derive(Clone)]
pub struct SnapshotBuilder {
    source: Arc<dyn AvailabilitySource>,
}

impl SnapshotBuilder {
    /// Wrap a storage source.
    pub fn new(source: Arc<dyn AvailabilitySource>) -> Self {
        Self { source }
    }

    /// Snapshot of every lot.
    ///
    /// # Errors
    ///
    /// Propagates the source's [`StorageError`] unchanged.
    pub async fn build_global(&self) -> Result<Snapshot, StorageError> {
        let snapshot = self.source.query_all_lots_with_spots().await?;
        Ok(Snapshot::new(snapshot.into_lots()))
    }

    /// Snapshot of a single lot, `None` if it no longer exists.
    ///
    /// # Errors
    ///
    /// Propagates the source's [`StorageError`] unchanged.
    pub async fn build_lot(&self, id: LotId) -> Result<Option<LotSnapshot>, StorageError> {
        let lot = self.source.query_lot_with_spots(id).await?;
        Ok(lot.map(|l| LotSnapshot::new(l.id, l.name, l.spots)))
    }

    /// Snapshot for any scope.
    ///
    /// A lot scope whose lot has disappeared yields `None`.
    ///
    /// # Errors
    ///
    /// Propagates the source's [`StorageError`] unchanged.
    pub async fn build(&self, scope: Scope) -> Result<Option<Snapshot>, StorageError> {
        match scope {
            Scope::Global => self.build_global().await.map(Some),
            Scope::Lot(id) => Ok(self.build_lot(id).await?.map(Snapshot::from)),
        }
    }
}
