//! Availability model: snapshots of lots and spots, and the deltas between them.
//!
//! A [`Snapshot`] is the complete point-in-time state of a scope. A [`Delta`]
//! is the minimal description of how one snapshot became another; clients
//! apply it to their last snapshot to stay current.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::SpotStatus;
use crate::ids::{LotId, SpotId};

/// Current state of one parking spot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SpotSnapshot {
    /// Spot identifier.
    pub id: SpotId,
    /// Occupancy state.
    pub status: SpotStatus,
    /// Human-facing label painted on the spot (e.g. `B-12`).
    pub spot_number: String,
    /// Floor the spot is on; negative for basement levels.
    pub floor_level: i32,
}

impl SpotSnapshot {
    /// Whether any tracked field differs from `other`.
    ///
    /// Only `status`, `spot_number` and `floor_level` count; the id is the
    /// identity and is assumed equal.
    pub fn differs_from(&self, other: &Self) -> bool {
        self.status != other.status
            || self.spot_number != other.spot_number
            || self.floor_level != other.floor_level
    }
}

/// Current state of one lot and all of its spots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LotSnapshot {
    /// Lot identifier.
    pub id: LotId,
    /// Display name of the lot.
    pub name: String,
    /// Spots ordered by id.
    pub spots: Vec<SpotSnapshot>,
}

impl LotSnapshot {
    /// Build a lot snapshot, sorting its spots by id.
    pub fn new(id: LotId, name: impl Into<String>, mut spots: Vec<SpotSnapshot>) -> Self {
        spots.sort_by_key(|s| s.id);
        Self {
            id,
            name: name.into(),
            spots,
        }
    }

    /// Number of spots currently [`SpotStatus::Available`].
    pub fn available_count(&self) -> usize {
        self.spots
            .iter()
            .filter(|s| s.status == SpotStatus::Available)
            .count()
    }
}

/// Full point-in-time state of a scope's lots.
///
/// Lots are kept in ascending id order so two snapshots of the same state
/// compare equal regardless of the order storage returned them in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export, export_to = "bindings/")]
pub struct Snapshot {
    lots: Vec<LotSnapshot>,
}

impl Snapshot {
    /// Build a canonical snapshot from lots in any order.
    pub fn new(mut lots: Vec<LotSnapshot>) -> Self {
        lots.sort_by_key(|l| l.id);
        Self { lots }
    }

    /// A snapshot with no lots.
    pub const fn empty() -> Self {
        Self { lots: Vec::new() }
    }

    /// Lots in ascending id order.
    pub fn lots(&self) -> &[LotSnapshot] {
        &self.lots
    }

    /// Consume the snapshot, returning its lots.
    pub fn into_lots(self) -> Vec<LotSnapshot> {
        self.lots
    }

    /// Look up a single lot.
    pub fn lot(&self, id: LotId) -> Option<&LotSnapshot> {
        self.lots
            .binary_search_by_key(&id, |l| l.id)
            .ok()
            .and_then(|idx| self.lots.get(idx))
    }

    /// Whether the snapshot has no lots.
    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    /// Number of lots.
    pub fn len(&self) -> usize {
        self.lots.len()
    }
}

impl From<LotSnapshot> for Snapshot {
    fn from(lot: LotSnapshot) -> Self {
        Self { lots: vec![lot] }
    }
}

/// A lot entry within a [`Delta`]: only the spots that changed or were added,
/// plus the ids of spots that disappeared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ChangedLot {
    /// Lot identifier.
    pub id: LotId,
    /// Lot name, carried so clients can render lots they have not seen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub name: Option<String>,
    /// Changed or newly added spots.
    pub spots: Vec<SpotSnapshot>,
    /// Spots present in the previous snapshot but gone now.
    #[serde(rename = "removedSpotIds")]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[ts(as = "Option<Vec<SpotId>>", optional)]
    pub removed_spot_ids: Vec<SpotId>,
}

/// Minimal difference between two snapshots of the same scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Delta {
    /// Version of the scope after this delta is applied.
    #[ts(type = "number")]
    pub version: u64,
    /// Lots with changed, added or removed spots, and newly added lots.
    pub lots: Vec<ChangedLot>,
    /// Lots present in the previous snapshot but gone now.
    #[serde(rename = "removedLotIds")]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[ts(as = "Option<Vec<LotId>>", optional)]
    pub removed_lot_ids: Vec<LotId>,
}

impl Delta {
    /// Whether the delta describes no change at all.
    ///
    /// An empty delta is never broadcast; the scheduler sends a heartbeat
    /// instead.
    pub fn is_empty(&self) -> bool {
        self.lots.is_empty() && self.removed_lot_ids.is_empty()
    }
}
