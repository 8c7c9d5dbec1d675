//! Type-safe identifier wrappers around storage row ids.
//!
//! Lots and spots are keyed by the integer primary keys of the relational
//! store. Wrapping them prevents a spot id from being used where a lot id
//! is expected. On the wire both serialize as plain JSON integers.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A path or query segment that is not a valid positive integer id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid identifier: {0:?}")]
pub struct ParseIdError(pub String);

/// Generates a newtype wrapper around an `i64` row id with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[serde(transparent)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(#[ts(type = "number")] pub i64);

        impl $name {
            /// Return the inner `i64` value.
            pub const fn into_inner(self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        /// Parses a strictly positive decimal id. Signs, whitespace and
        /// anything that is not an ASCII digit are rejected.
        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(ParseIdError(s.to_owned()));
                }
                let value = s
                    .parse::<i64>()
                    .map_err(|e| ParseIdError(format!("{s} ({e})")))?;
                if value == 0 {
                    return Err(ParseIdError(s.to_owned()));
                }
                Ok(Self(value))
            }
        }
    };
}

define_id! {
    /// Unique identifier for a parking lot.
    LotId
}

define_id! {
    /// Unique identifier for a single parking spot within a lot.
    SpotId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positive_ids() {
        assert_eq!("42".parse::<LotId>(), Ok(LotId(42)));
        assert_eq!("007".parse::<SpotId>(), Ok(SpotId(7)));
    }

    #[test]
    fn rejects_malformed_ids() {
        for raw in ["", "abc", "12a", "-3", "+3", " 4", "0", "99999999999999999999"] {
            assert!(raw.parse::<LotId>().is_err(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn serializes_as_plain_integer() {
        let json = serde_json::to_string(&LotId(9)).unwrap_or_default();
        assert_eq!(json, "9");
    }
}
