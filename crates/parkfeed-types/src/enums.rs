//! Enumeration types for the availability feed.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::LotId;

/// Occupancy state of a single parking spot.
///
/// Stored and transmitted in lowercase (`"available"`, `"occupied"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum SpotStatus {
    /// Free to park in.
    Available,
    /// A vehicle is currently parked.
    Occupied,
    /// Held for an upcoming reservation.
    Reserved,
    /// Closed for maintenance.
    Maintenance,
}

impl SpotStatus {
    /// The lowercase wire/storage representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Occupied => "occupied",
            Self::Reserved => "reserved",
            Self::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for SpotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status string that does not name a known [`SpotStatus`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown spot status: {0:?}")]
pub struct ParseStatusError(pub String);

impl FromStr for SpotStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "occupied" => Ok(Self::Occupied),
            "reserved" => Ok(Self::Reserved),
            "maintenance" => Ok(Self::Maintenance),
            other => Err(ParseStatusError(other.to_owned())),
        }
    }
}

/// An addressable subscription unit.
///
/// The global scope carries every lot; a lot scope carries exactly one.
/// Each scope owns its own snapshot, version counter and subscriber set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    /// The feed covering all lots.
    Global,
    /// The feed for a single lot.
    Lot(LotId),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Lot(id) => write!(f, "lot:{id}"),
        }
    }
}
