//! Subscriber sinks: the outbound half of one client's push channel.
//!
//! A [`Frame`] is an event serialized once and shared by every sink in a
//! scope. A [`Sink`] accepts frames without blocking; a sink that cannot
//! take a frame is dead and gets pruned by its
//! [`SubscriberSet`](crate::registry::SubscriberSet).

use std::sync::Arc;

use parkfeed_types::FeedEvent;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::SinkError;

/// An event name plus its JSON payload, ready to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    event: &'static str,
    data: Arc<str>,
    terminal: bool,
}

impl Frame {
    /// Serialize an event into a frame.
    ///
    /// # Errors
    ///
    /// Returns the [`serde_json::Error`] if the payload cannot be serialized.
    pub fn encode(event: &FeedEvent) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event: event.name(),
            data: Arc::from(event.payload_json()?),
            terminal: event.is_terminal(),
        })
    }

    /// The event name (`snapshot`, `delta`, `ping`, `error`).
    pub const fn event(&self) -> &'static str {
        self.event
    }

    /// The JSON payload.
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Whether the channel must close after this frame.
    pub const fn is_terminal(&self) -> bool {
        self.terminal
    }
}

/// A live, write-capable, closable push channel.
pub trait Sink: Send + Sync {
    /// Queue a frame for delivery without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the channel is closed or cannot accept more
    /// frames.
    fn send(&self, frame: Frame) -> Result<(), SinkError>;

    /// Whether the receiving side has gone away.
    fn is_closed(&self) -> bool;
}

/// A sink backed by a bounded tokio channel.
///
/// The transport owns the receiver and writes frames to the client; when it
/// drops the receiver the sink reports itself closed.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Frame>,
}

impl ChannelSink {
    /// Create a sink and the receiver the transport drains.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

impl Sink for ChannelSink {
    fn send(&self, frame: Frame) -> Result<(), SinkError> {
        self.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => SinkError::Full,
            TrySendError::Closed(_) => SinkError::Closed,
        })
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
