//! Subscriber registries and broadcast fan-out.
//!
//! A [`SubscriberSet`] holds the sinks attached to one scope and writes
//! events to them, pruning any sink that is closed or refuses a frame. A
//! [`ScopeMap`] keeps the global scope and the per-lot scopes as two
//! independent registries.

use std::collections::HashMap;
use std::sync::Arc;

use parkfeed_types::{FeedEvent, LotId, Scope};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::sink::{Frame, Sink};

/// Identifier of one attached sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SinkId(Uuid);

impl SinkId {
    /// A fresh, time-ordered identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SinkId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for SinkId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Entry {
    id: SinkId,
    sink: Arc<dyn Sink>,
    /// Whether the sink has received its initial snapshot. Deltas are only
    /// meaningful to sinks that have a baseline.
    primed: bool,
}

/// The sinks attached to one scope.
#[derive(Default)]
pub struct SubscriberSet {
    entries: Vec<Entry>,
}

impl SubscriberSet {
    /// An empty set.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Attach a sink. It starts unprimed.
    pub fn insert(&mut self, sink: Arc<dyn Sink>) -> SinkId {
        let id = SinkId::new();
        self.entries.push(Entry {
            id,
            sink,
            primed: false,
        });
        id
    }

    /// Detach a sink. Returns whether it was present.
    pub fn remove(&mut self, id: SinkId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    /// Whether the sink is attached.
    pub fn contains(&self, id: SinkId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// Number of attached sinks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no sinks are attached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of sinks still waiting for their initial snapshot.
    pub fn unprimed(&self) -> usize {
        self.entries.iter().filter(|e| !e.primed).count()
    }

    /// Write `event` to every live sink, pruning dead ones.
    ///
    /// Deltas skip sinks that have not been primed. Returns the number of
    /// sinks the frame was delivered to.
    pub fn publish(&mut self, event: &FeedEvent) -> usize {
        let Some(frame) = encode(event) else {
            return 0;
        };
        let primed_only = matches!(event, FeedEvent::Delta(_));
        self.deliver(&frame, |e| e.primed || !primed_only, |_| {})
    }

    /// Send the initial snapshot to every unprimed sink and mark them
    /// primed. Returns the number of sinks primed.
    pub fn prime(&mut self, snapshot: &FeedEvent) -> usize {
        let Some(frame) = encode(snapshot) else {
            return 0;
        };
        self.deliver(&frame, |e| !e.primed, |e| e.primed = true)
    }

    /// Send a terminal event to every unprimed sink and detach them.
    ///
    /// Used when the scope turns out to be invalid before any snapshot was
    /// produced. Returns the number of sinks detached.
    pub fn reject_unprimed(&mut self, event: &FeedEvent) -> usize {
        let frame = encode(event);
        let before = self.entries.len();
        self.entries.retain(|e| {
            if e.primed {
                return true;
            }
            if let Some(frame) = &frame {
                let _ = e.sink.send(frame.clone());
            }
            false
        });
        before.saturating_sub(self.entries.len())
    }

    /// Write `event` to a single sink, pruning it on failure. Returns
    /// whether it was delivered.
    pub fn send_to(&mut self, id: SinkId, event: &FeedEvent) -> bool {
        let Some(frame) = encode(event) else {
            return false;
        };
        self.deliver(&frame, |e| e.id == id, |_| {}) > 0
    }

    /// Write `frame` to every entry matching `select`, apply `on_sent` to
    /// each successful one, and drop closed or failing sinks.
    fn deliver(
        &mut self,
        frame: &Frame,
        select: impl Fn(&Entry) -> bool,
        on_sent: impl Fn(&mut Entry),
    ) -> usize {
        let mut delivered: usize = 0;
        self.entries.retain_mut(|entry| {
            if entry.sink.is_closed() {
                debug!(sink_id = %entry.id, "Pruning closed sink");
                return false;
            }
            if !select(entry) {
                return true;
            }
            match entry.sink.send(frame.clone()) {
                Ok(()) => {
                    on_sent(entry);
                    delivered = delivered.saturating_add(1);
                    true
                }
                Err(e) => {
                    debug!(sink_id = %entry.id, error = %e, event = frame.event(), "Pruning sink after failed write");
                    false
                }
            }
        });
        delivered
    }
}

fn encode(event: &FeedEvent) -> Option<Frame> {
    match Frame::encode(event) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(event = event.name(), error = %e, "Failed to serialize feed event");
            None
        }
    }
}

/// Per-scope values: one slot for the global scope and a map for lots.
#[derive(Debug)]
pub struct ScopeMap<T> {
    global: Option<T>,
    lots: HashMap<LotId, T>,
}

impl<T> Default for ScopeMap<T> {
    fn default() -> Self {
        Self {
            global: None,
            lots: HashMap::new(),
        }
    }
}

impl<T> ScopeMap<T> {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// The value for `scope`, if present.
    pub fn get(&self, scope: Scope) -> Option<&T> {
        match scope {
            Scope::Global => self.global.as_ref(),
            Scope::Lot(id) => self.lots.get(&id),
        }
    }

    /// The value for `scope`, inserting `make()` if absent.
    pub fn get_or_insert_with(&mut self, scope: Scope, make: impl FnOnce() -> T) -> &T {
        match scope {
            Scope::Global => self.global.get_or_insert_with(make),
            Scope::Lot(id) => self.lots.entry(id).or_insert_with(make),
        }
    }

    /// Remove and return the value for `scope`.
    pub fn remove(&mut self, scope: Scope) -> Option<T> {
        match scope {
            Scope::Global => self.global.take(),
            Scope::Lot(id) => self.lots.remove(&id),
        }
    }

    /// Every present scope and its value, global first then lots by id.
    pub fn iter(&self) -> impl Iterator<Item = (Scope, &T)> {
        let mut lots: Vec<(Scope, &T)> = self
            .lots
            .iter()
            .map(|(id, v)| (Scope::Lot(*id), v))
            .collect();
        lots.sort_by_key(|(scope, _)| *scope);
        self.global
            .as_ref()
            .map(|v| (Scope::Global, v))
            .into_iter()
            .chain(lots)
    }

    /// Number of present scopes.
    pub fn len(&self) -> usize {
        self.lots.len().saturating_add(usize::from(self.global.is_some()))
    }

    /// Whether no scope is present.
    pub fn is_empty(&self) -> bool {
        self.global.is_none() && self.lots.is_empty()
    }
}
