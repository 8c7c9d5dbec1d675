//! Lot and spot queries.
//!
//! Reads the `parking_lots` and `parking_spots` tables with one `LEFT JOIN`
//! per query, so a snapshot is always taken from a single statement and a
//! lot without spots still appears. Rows come back ordered by lot then spot
//! id and are folded into [`LotSnapshot`]s by [`group_rows`].

use async_trait::async_trait;
use parkfeed_core::{AvailabilitySource, StorageError};
use parkfeed_types::{LotId, LotSnapshot, Snapshot, SpotId, SpotSnapshot, SpotStatus};
use sqlx::PgPool;

use crate::error::DbError;

const ALL_LOTS_QUERY: &str = r"SELECT l.id AS lot_id, l.name AS lot_name,
         s.id AS spot_id, s.status::TEXT AS status, s.spot_number, s.floor_level
  FROM parking_lots l
  LEFT JOIN parking_spots s ON s.lot_id = l.id
  ORDER BY l.id, s.id";

const ONE_LOT_QUERY: &str = r"SELECT l.id AS lot_id, l.name AS lot_name,
         s.id AS spot_id, s.status::TEXT AS status, s.spot_number, s.floor_level
  FROM parking_lots l
  LEFT JOIN parking_spots s ON s.lot_id = l.id
  WHERE l.id = $1
  ORDER BY s.id";

/// One row of the lot/spot join. Spot columns are `NULL` for a lot with no
/// spots.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LotSpotRow {
    /// Lot primary key.
    pub lot_id: i64,
    /// Lot display name.
    pub lot_name: String,
    /// Spot primary key.
    pub spot_id: Option<i64>,
    /// Spot status as stored.
    pub status: Option<String>,
    /// Spot label.
    pub spot_number: Option<String>,
    /// Spot floor.
    pub floor_level: Option<i32>,
}

/// Fold join rows into lots, preserving row order.
///
/// # Errors
///
/// Returns [`DbError::InvalidRow`] if a spot row has an unknown status or is
/// missing a column.
pub fn group_rows(rows: Vec<LotSpotRow>) -> Result<Vec<LotSnapshot>, DbError> {
    let mut lots: Vec<LotSnapshot> = Vec::new();

    for row in rows {
        let spot = spot_from_row(&row)?;
        let lot_id = LotId(row.lot_id);
        if lots.last().is_none_or(|lot| lot.id != lot_id) {
            lots.push(LotSnapshot {
                id: lot_id,
                name: row.lot_name,
                spots: Vec::new(),
            });
        }
        if let (Some(spot), Some(lot)) = (spot, lots.last_mut()) {
            lot.spots.push(spot);
        }
    }

    Ok(lots)
}

fn spot_from_row(row: &LotSpotRow) -> Result<Option<SpotSnapshot>, DbError> {
    let Some(spot_id) = row.spot_id else {
        return Ok(None);
    };
    let status = row
        .status
        .as_deref()
        .ok_or_else(|| DbError::InvalidRow(format!("spot {spot_id} has no status")))?
        .parse::<SpotStatus>()
        .map_err(|e| DbError::InvalidRow(format!("spot {spot_id}: {e}")))?;

    Ok(Some(SpotSnapshot {
        id: SpotId(spot_id),
        status,
        spot_number: row.spot_number.clone().unwrap_or_default(),
        floor_level: row.floor_level.unwrap_or(0),
    }))
}

/// Operations on the `parking_lots` and `parking_spots` tables.
pub struct LotStore<'a> {
    pool: &'a PgPool,
}

impl<'a> LotStore<'a> {
    /// Create a new lot store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Every lot with its spots.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails or
    /// [`DbError::InvalidRow`] if a row cannot be mapped.
    pub async fn all_lots_with_spots(&self) -> Result<Vec<LotSnapshot>, DbError> {
        let rows = sqlx::query_as::<_, LotSpotRow>(ALL_LOTS_QUERY)
            .fetch_all(self.pool)
            .await?;
        let lots = group_rows(rows)?;
        tracing::debug!(lots = lots.len(), "Loaded all lots");
        Ok(lots)
    }

    /// One lot with its spots, `None` if the lot does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails or
    /// [`DbError::InvalidRow`] if a row cannot be mapped.
    pub async fn lot_with_spots(&self, id: LotId) -> Result<Option<LotSnapshot>, DbError> {
        let rows = sqlx::query_as::<_, LotSpotRow>(ONE_LOT_QUERY)
            .bind(id.into_inner())
            .fetch_all(self.pool)
            .await?;
        Ok(group_rows(rows)?.into_iter().next())
    }
}

/// [`AvailabilitySource`] backed by `PostgreSQL`.
#[derive(Clone)]
pub struct PgAvailabilitySource {
    pool: PgPool,
}

impl PgAvailabilitySource {
    /// Wrap a connection pool.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AvailabilitySource for PgAvailabilitySource {
    async fn query_all_lots_with_spots(&self) -> Result<Snapshot, StorageError> {
        let lots = LotStore::new(&self.pool).all_lots_with_spots().await?;
        Ok(Snapshot::new(lots))
    }

    async fn query_lot_with_spots(&self, id: LotId) -> Result<Option<LotSnapshot>, StorageError> {
        Ok(LotStore::new(&self.pool).lot_with_spots(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(lot_id: i64, spot: Option<(i64, &str)>) -> LotSpotRow {
        LotSpotRow {
            lot_id,
            lot_name: format!("Lot {lot_id}"),
            spot_id: spot.map(|(id, _)| id),
            status: spot.map(|(_, status)| status.to_owned()),
            spot_number: spot.map(|(id, _)| format!("N-{id}")),
            floor_level: spot.map(|_| -1),
        }
    }

    #[test]
    fn groups_rows_by_lot() {
        let lots = group_rows(vec![
            row(1, Some((10, "available"))),
            row(1, Some((11, "occupied"))),
            row(2, None),
            row(3, Some((30, "maintenance"))),
        ])
        .unwrap_or_default();

        assert_eq!(lots.len(), 3);
        let spots: Vec<(i64, SpotStatus)> = lots
            .first()
            .map(|l| l.spots.iter().map(|s| (s.id.0, s.status)).collect())
            .unwrap_or_default();
        assert_eq!(
            spots,
            vec![(10, SpotStatus::Available), (11, SpotStatus::Occupied)]
        );
        assert!(lots.get(1).is_some_and(|l| l.spots.is_empty()));
        assert!(
            lots.get(2)
                .and_then(|l| l.spots.first())
                .is_some_and(|s| s.floor_level == -1 && s.spot_number == "N-30")
        );
    }

    #[test]
    fn empty_result_is_no_lots() {
        assert!(group_rows(Vec::new()).is_ok_and(|lots| lots.is_empty()));
    }

    #[test]
    fn unknown_status_is_rejected() {
        let result = group_rows(vec![row(1, Some((10, "towed")))]);
        assert!(matches!(result, Err(DbError::InvalidRow(_))));
    }

    #[test]
    fn missing_status_is_rejected() {
        let mut bad = row(1, Some((10, "available")));
        bad.status = None;
        assert!(matches!(group_rows(vec![bad]), Err(DbError::InvalidRow(_))));
    }
}
