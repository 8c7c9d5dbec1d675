//! Push-channel events.
//!
//! Every frame on an availability stream is one [`FeedEvent`]: a named
//! event type plus a JSON payload. Each variant has its own payload struct
//! and serializer, so a field added to one frame type cannot leak into
//! another.
//!
//! | Event | Payload | When |
//! |-------|---------|------|
//! | `snapshot` | [`SnapshotPayload`] | once, on attach |
//! | `delta` | [`Delta`] | a tick found changes |
//! | `ping` | [`HeartbeatPayload`] | a tick found no changes |
//! | `error` | [`ErrorPayload`] | terminal; the stream closes after it |

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::structs::{Delta, LotSnapshot};

/// Full state sent to a subscriber when it attaches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SnapshotPayload {
    /// Scope version the snapshot corresponds to.
    #[ts(type = "number")]
    pub version: u64,
    /// All lots in the scope.
    pub lots: Vec<LotSnapshot>,
}

/// Liveness frame carrying the unchanged version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HeartbeatPayload {
    /// Current scope version.
    #[ts(type = "number")]
    pub version: u64,
    /// Server time in epoch milliseconds.
    #[ts(type = "number")]
    pub ts: i64,
}

/// Terminal error frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ErrorPayload {
    /// Human-readable reason the stream is closing.
    pub message: String,
}

/// One event on an availability stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// Full state on attach.
    Snapshot(SnapshotPayload),
    /// Incremental change.
    Delta(Delta),
    /// No change since the last frame.
    Ping(HeartbeatPayload),
    /// Terminal failure.
    Error(ErrorPayload),
}

impl FeedEvent {
    /// Event name for [`FeedEvent::Snapshot`].
    pub const SNAPSHOT: &'static str = "snapshot";
    /// Event name for [`FeedEvent::Delta`].
    pub const DELTA: &'static str = "delta";
    /// Event name for [`FeedEvent::Ping`].
    pub const PING: &'static str = "ping";
    /// Event name for [`FeedEvent::Error`].
    pub const ERROR: &'static str = "error";

    /// Build an error event from any message.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            message: message.into(),
        })
    }

    /// The event name written on the wire.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Snapshot(_) => Self::SNAPSHOT,
            Self::Delta(_) => Self::DELTA,
            Self::Ping(_) => Self::PING,
            Self::Error(_) => Self::ERROR,
        }
    }

    /// Whether the stream must close after this event.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Serialize the payload (without the event name) to JSON.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] if serialization fails.
    pub fn payload_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Snapshot(p) => serde_json::to_string(p),
            Self::Delta(d) => serde_json::to_string(d),
            Self::Ping(p) => serde_json::to_string(p),
            Self::Error(p) => serde_json::to_string(p),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_match_wire_protocol() {
        let ping = FeedEvent::Ping(HeartbeatPayload { version: 1, ts: 0 });
        assert_eq!(ping.name(), "ping");
        assert_eq!(FeedEvent::Delta(Delta::default()).name(), "delta");
        assert_eq!(FeedEvent::error("x").name(), "error");
        assert!(FeedEvent::error("x").is_terminal());
        assert!(!ping.is_terminal());
    }

    #[test]
    fn ping_payload_shape() {
        let ping = FeedEvent::Ping(HeartbeatPayload {
            version: 7,
            ts: 1_700_000_000_000,
        });
        assert_eq!(
            ping.payload_json().unwrap_or_default(),
            r#"{"version":7,"ts":1700000000000}"#
        );
    }

    #[test]
    fn error_payload_shape() {
        let err = FeedEvent::error("invalid lot id");
        assert_eq!(
            err.payload_json().unwrap_or_default(),
            r#"{"message":"invalid lot id"}"#
        );
    }
}
