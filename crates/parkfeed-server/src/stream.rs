//! Server-Sent Events handlers for the availability feed.
//!
//! Each connection gets its own bounded [`ChannelSink`]. The response body
//! is a [`FeedStream`] that drains the sink's receiver and owns the
//! [`Subscription`], so when the client disconnects and axum drops the
//! body, the sink is detached on the spot.
//!
//! Every stream opens with a `retry:` reconnect hint. A stream that cannot
//! be served (malformed lot id, unknown lot) sends one `error` event after
//! the hint and ends.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use futures::Stream;
use parkfeed_core::{ChannelSink, Frame, Subscription};
use parkfeed_types::{FeedEvent, LotId, Scope};
use tokio::sync::mpsc;
use tracing::debug;

use crate::state::AppState;

/// An SSE response body bound to one subscription.
pub struct FeedStream {
    prelude: VecDeque<Event>,
    frames: Option<mpsc::Receiver<Frame>>,
    subscription: Option<Subscription>,
}

impl FeedStream {
    fn attached(retry: Event, frames: mpsc::Receiver<Frame>, subscription: Subscription) -> Self {
        Self {
            prelude: VecDeque::from([retry]),
            frames: Some(frames),
            subscription: Some(subscription),
        }
    }

    fn rejected(retry: Event, message: impl Into<String>) -> Self {
        let mut prelude = VecDeque::from([retry]);
        if let Ok(frame) = Frame::encode(&FeedEvent::error(message)) {
            prelude.push_back(to_event(&frame));
        }
        Self {
            prelude,
            frames: None,
            subscription: None,
        }
    }

    /// End the stream and detach from the feed.
    fn close(&mut self) {
        self.frames = None;
        if let Some(subscription) = self.subscription.take() {
            subscription.detach();
        }
    }
}

impl Stream for FeedStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if let Some(event) = this.prelude.pop_front() {
            return Poll::Ready(Some(Ok(event)));
        }
        let Some(frames) = this.frames.as_mut() else {
            return Poll::Ready(None);
        };

        match frames.poll_recv(cx) {
            Poll::Ready(Some(frame)) => {
                if frame.is_terminal() {
                    this.close();
                }
                Poll::Ready(Some(Ok(to_event(&frame))))
            }
            Poll::Ready(None) => {
                this.close();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

fn to_event(frame: &Frame) -> Event {
    Event::default().event(frame.event()).data(frame.data())
}

async fn open(state: &AppState, scope: Scope) -> FeedStream {
    let retry = Event::default().retry(state.retry_hint());
    let (sink, frames) = ChannelSink::channel(state.sink_buffer());

    match state.feed.subscribe(scope, Arc::new(sink)).await {
        Ok(subscription) => {
            debug!(%scope, sink_id = %subscription.sink_id(), "Stream opened");
            FeedStream::attached(retry, frames, subscription)
        }
        Err(e) => {
            debug!(%scope, error = %e, "Stream rejected");
            FeedStream::rejected(retry, e.to_string())
        }
    }
}

/// Stream every lot.
///
/// # Route
///
/// `GET /api/availability/stream`
pub async fn global_stream(State(state): State<Arc<AppState>>) -> Sse<FeedStream> {
    Sse::new(open(&state, Scope::Global).await)
}

/// Stream a single lot.
///
/// # Route
///
/// `GET /api/availability/lots/{lot_id}/stream`
pub async fn lot_stream(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Sse<FeedStream> {
    let stream = match raw.parse::<LotId>() {
        Ok(id) => open(&state, Scope::Lot(id)).await,
        Err(e) => {
            debug!(lot_id = raw, error = %e, "Rejecting malformed lot id");
            FeedStream::rejected(
                Event::default().retry(state.retry_hint()),
                format!("invalid lot id: {raw}"),
            )
        }
    };
    Sse::new(stream)
}
