//! Per-scope scheduling and the feed manager.
//!
//! [`AvailabilityFeed`] owns every live scope. A scope comes into existence
//! when its first sink attaches, warms up a snapshot (from the cache when
//! one survived, otherwise from a fresh build), and then runs one timer
//! task that polls, diffs and publishes:
//!
//! ```text
//! Idle -> subscribe -> WarmingUp -> Active -> last detach -> Idle
//!                          |           |
//!                     first build   tick: rebuild -> diff -> ping | delta
//! ```
//!
//! # Locking
//!
//! The scope map lock is taken only to create or retire a scope, and always
//! before a scope's own lock. Neither is held across an `.await`. A scope
//! runs at most one build at a time: the `building` flag is set before the
//! storage query starts and cleared once its result is recorded.
//!
//! # Teardown
//!
//! Detaching the last sink retires the scope synchronously: the in-memory
//! snapshot and version are dropped, the scope leaves the map, and its timer
//! handle is released. The timer task itself is not aborted; a tick already
//! in flight completes, sees the scope retired, and exits.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use parkfeed_types::{
    FeedEvent, HeartbeatPayload, LotId, LotSnapshot, Scope, Snapshot, SnapshotPayload,
};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::builder::{AvailabilitySource, SnapshotBuilder};
use crate::clock::Clock;
use crate::config::FeedConfig;
use crate::diff::diff;
use crate::error::{FeedError, StorageError};
use crate::registry::{ScopeMap, SinkId, SubscriberSet};
use crate::sink::Sink;
use crate::store::{SnapshotCache, SnapshotStore};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Lifecycle phase of a live scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopePhase {
    /// No snapshot has been established yet.
    WarmingUp,
    /// A snapshot exists and ticks publish against it.
    Active,
}

/// Point-in-time view of one live scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeStats {
    /// The scope.
    pub scope: Scope,
    /// Attached sinks.
    pub subscribers: usize,
    /// Current version, 0 while warming up.
    pub version: u64,
    /// Lifecycle phase.
    pub phase: ScopePhase,
}

/// A snapshot together with the version it was published at.
type Versioned = (Arc<Snapshot>, u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tick {
    Continue,
    Stop,
}

#[derive(Default)]
struct ScopeState {
    subscribers: SubscriberSet,
    snapshot: Option<Arc<Snapshot>>,
    version: u64,
    building: bool,
    retired: bool,
    timer: Option<JoinHandle<()>>,
}

struct ScopeCell {
    scope: Scope,
    state: Mutex<ScopeState>,
}

struct FeedInner {
    builder: SnapshotBuilder,
    store: SnapshotStore,
    clock: Arc<dyn Clock>,
    config: FeedConfig,
    scopes: Mutex<ScopeMap<Arc<ScopeCell>>>,
    running_timers: AtomicUsize,
}

/// Decrements the running timer count when a timer task exits, however it
/// exits.
struct TimerGuard(Arc<FeedInner>);

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.0.running_timers.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The availability feed manager.
///
/// Cheap to clone; clones share all scopes.
#[derive(Clone)]
pub struct AvailabilityFeed {
    inner: Arc<FeedInner>,
}

impl AvailabilityFeed {
    /// Create a manager over a storage source and an optional cache.
    pub fn new(
        source: Arc<dyn AvailabilitySource>,
        cache: Option<Arc<dyn SnapshotCache>>,
        clock: Arc<dyn Clock>,
        config: FeedConfig,
    ) -> Self {
        Self {
            inner: Arc::new(FeedInner {
                builder: SnapshotBuilder::new(source),
                store: SnapshotStore::new(cache, config.snapshot_ttl_secs),
                clock,
                config,
                scopes: Mutex::new(ScopeMap::new()),
                running_timers: AtomicUsize::new(0),
            }),
        }
    }

    /// Attach `sink` to `scope`.
    ///
    /// The sink receives a `snapshot` frame as soon as the scope has one;
    /// if another caller is already building it, the sink gets a `ping`
    /// first and the snapshot when that build lands. A transient storage
    /// failure is not an error: the sink stays attached and the next tick
    /// retries.
    ///
    /// The returned [`Subscription`] detaches the sink when dropped.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::InvalidTarget`] when the scope names a lot that
    /// does not exist. The sink has then already received a terminal
    /// `error` frame and been detached.
    pub async fn subscribe(
        &self,
        scope: Scope,
        sink: Arc<dyn Sink>,
    ) -> Result<Subscription, FeedError> {
        let (cell, sink_id) = self.inner.attach(scope, sink);
        let subscription = Subscription {
            inner: Arc::clone(&self.inner),
            cell: Arc::clone(&cell),
            sink_id,
            attached: true,
        };

        match self.inner.ensure_snapshot(&cell, sink_id).await {
            Ok(()) => Ok(subscription),
            Err(FeedError::Storage(e)) => {
                warn!(%scope, error = %e, "Initial snapshot failed, retrying on next tick");
                self.inner.ping_one(&cell, sink_id);
                Ok(subscription)
            }
            Err(e) => Err(e),
        }
    }

    /// The in-memory snapshot and version of a live scope.
    pub fn current_snapshot(&self, scope: Scope) -> Option<(Arc<Snapshot>, u64)> {
        let cell = lock(&self.inner.scopes).get(scope).map(Arc::clone)?;
        let state = lock(&cell.state);
        state
            .snapshot
            .as_ref()
            .map(|s| (Arc::clone(s), state.version))
    }

    /// Build the current global snapshot on demand, outside any scope.
    ///
    /// # Errors
    ///
    /// Propagates the source's [`StorageError`].
    pub async fn build_global(&self) -> Result<Snapshot, StorageError> {
        self.inner.builder.build_global().await
    }

    /// Build one lot's current snapshot on demand, outside any scope.
    ///
    /// # Errors
    ///
    /// Propagates the source's [`StorageError`].
    pub async fn build_lot(&self, id: LotId) -> Result<Option<LotSnapshot>, StorageError> {
        self.inner.builder.build_lot(id).await
    }

    /// Every live scope, global first then lots by id.
    pub fn scope_stats(&self) -> Vec<ScopeStats> {
        let scopes = lock(&self.inner.scopes);
        scopes
            .iter()
            .map(|(scope, cell)| {
                let state = lock(&cell.state);
                ScopeStats {
                    scope,
                    subscribers: state.subscribers.len(),
                    version: state.version,
                    phase: if state.snapshot.is_some() {
                        ScopePhase::Active
                    } else {
                        ScopePhase::WarmingUp
                    },
                }
            })
            .collect()
    }

    /// Number of timer tasks that have not exited yet.
    pub fn running_timers(&self) -> usize {
        self.inner.running_timers.load(Ordering::SeqCst)
    }

    /// The scheduling parameters.
    pub fn config(&self) -> &FeedConfig {
        &self.inner.config
    }
}

impl FeedInner {
    /// Register the sink, creating the scope and its timer if needed.
    fn attach(self: &Arc<Self>, scope: Scope, sink: Arc<dyn Sink>) -> (Arc<ScopeCell>, SinkId) {
        let mut scopes = lock(&self.scopes);
        let cell = Arc::clone(scopes.get_or_insert_with(scope, || {
            Arc::new(ScopeCell {
                scope,
                state: Mutex::new(ScopeState::default()),
            })
        }));

        let mut state = lock(&cell.state);
        let sink_id = state.subscribers.insert(sink);
        if state.timer.is_none() {
            state.timer = Some(self.spawn_timer(Arc::clone(&cell)));
            info!(%scope, "Scope activated");
        }
        debug!(%scope, %sink_id, subscribers = state.subscribers.len(), "Sink attached");
        drop(state);
        drop(scopes);

        (cell, sink_id)
    }

    /// Remove a sink and retire the scope if it was the last one.
    fn detach(&self, cell: &Arc<ScopeCell>, sink_id: SinkId) {
        let removed = lock(&cell.state).subscribers.remove(sink_id);
        if removed {
            debug!(scope = %cell.scope, %sink_id, "Sink detached");
        }
        self.retire_if_empty(cell);
    }

    /// Tear the scope down if it has no subscribers. Returns whether the
    /// scope is retired.
    fn retire_if_empty(&self, cell: &Arc<ScopeCell>) -> bool {
        let mut scopes = lock(&self.scopes);
        let mut state = lock(&cell.state);
        if state.retired {
            return true;
        }
        if !state.subscribers.is_empty() {
            return false;
        }

        state.retired = true;
        state.snapshot = None;
        state.version = 0;
        state.timer = None;
        drop(state);

        if scopes.get(cell.scope).is_some_and(|c| Arc::ptr_eq(c, cell)) {
            scopes.remove(cell.scope);
        }
        info!(scope = %cell.scope, "Scope released");
        true
    }

    fn spawn_timer(self: &Arc<Self>, cell: Arc<ScopeCell>) -> JoinHandle<()> {
        self.running_timers.fetch_add(1, Ordering::SeqCst);
        let guard = TimerGuard(Arc::clone(self));
        let period = self.config.poll_interval();

        tokio::spawn(async move {
            let inner = &guard.0;
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the warm-up covers it.
            interval.tick().await;

            loop {
                interval.tick().await;
                if inner.run_tick(&cell).await == Tick::Stop {
                    break;
                }
            }
            debug!(scope = %cell.scope, "Scope timer stopped");
        })
    }

    /// Make sure the scope has a snapshot and prime the waiting sinks.
    async fn ensure_snapshot(&self, cell: &Arc<ScopeCell>, sink_id: SinkId) -> Result<(), FeedError> {
        let scope = cell.scope;
        {
            let mut state = lock(&cell.state);
            if state.retired {
                return Ok(());
            }
            if let Some(snapshot) = state.snapshot.clone() {
                if matches!(scope, Scope::Lot(_)) && snapshot.is_empty() {
                    state.subscribers.reject_unprimed(&invalid_target(scope));
                    drop(state);
                    self.retire_if_empty(cell);
                    return Err(FeedError::InvalidTarget(scope));
                }
                let event = snapshot_event(&snapshot, state.version);
                state.subscribers.prime(&event);
                return Ok(());
            }
            if state.building {
                let ping = self.ping(state.version);
                state.subscribers.send_to(sink_id, &ping);
                return Ok(());
            }
            state.building = true;
        }

        let result = self.warm_up(scope).await;
        let outcome = self.finish_warm_up(cell, result);
        self.retire_if_empty(cell);
        outcome
    }

    /// Establish a baseline: the cached snapshot if one survived, otherwise
    /// a fresh build persisted at the version after the cached one.
    ///
    /// An empty cached lot snapshot is the trace of a removed lot and counts
    /// as a miss, so storage decides whether the lot exists.
    async fn warm_up(&self, scope: Scope) -> Result<Option<Versioned>, StorageError> {
        let (cached, cached_version) = self.store.load(scope).await;
        let cached = cached
            .filter(|(snapshot, _)| !(matches!(scope, Scope::Lot(_)) && snapshot.is_empty()));
        if let Some((snapshot, version)) = cached {
            debug!(%scope, version, "Warmed up from cache");
            return Ok(Some((Arc::new(snapshot), version)));
        }

        let Some(snapshot) = self.builder.build(scope).await? else {
            return Ok(None);
        };
        let version = cached_version.unwrap_or(0).saturating_add(1);
        let snapshot = Arc::new(snapshot);
        self.store.save(scope, &snapshot, version).await;
        debug!(%scope, version, lots = snapshot.len(), "Warmed up from storage");
        Ok(Some((snapshot, version)))
    }

    /// Record a warm-up result and deliver it to the waiting sinks.
    fn finish_warm_up(
        &self,
        cell: &ScopeCell,
        result: Result<Option<Versioned>, StorageError>,
    ) -> Result<(), FeedError> {
        let mut state = lock(&cell.state);
        state.building = false;
        if state.retired {
            return Ok(());
        }

        match result? {
            None => {
                let rejected = state.subscribers.reject_unprimed(&invalid_target(cell.scope));
                debug!(scope = %cell.scope, rejected, "Subscription target does not exist");
                Err(FeedError::InvalidTarget(cell.scope))
            }
            Some((snapshot, version)) => {
                let event = snapshot_event(&snapshot, version);
                state.snapshot = Some(snapshot);
                state.version = version;
                let primed = state.subscribers.prime(&event);
                info!(scope = %cell.scope, version, primed, "Snapshot established");
                Ok(())
            }
        }
    }

    /// One poll of one scope.
    async fn run_tick(&self, cell: &Arc<ScopeCell>) -> Tick {
        let scope = cell.scope;
        let prev = {
            let mut state = lock(&cell.state);
            if state.retired {
                return Tick::Stop;
            }
            if state.subscribers.is_empty() {
                drop(state);
                self.retire_if_empty(cell);
                return Tick::Stop;
            }
            if state.building {
                let ping = self.ping(state.version);
                state.subscribers.publish(&ping);
                return Tick::Continue;
            }
            state.building = true;
            state.snapshot.clone()
        };

        let Some(prev) = prev else {
            // No baseline yet: the warm-up failed earlier. Retry it, which
            // primes the waiting sinks with a snapshot rather than a delta.
            let result = self.warm_up(scope).await;
            if let Err(FeedError::Storage(e)) = self.finish_warm_up(cell, result) {
                warn!(%scope, error = %e, "Snapshot build failed, retrying on next tick");
            }
            return if self.retire_if_empty(cell) {
                Tick::Stop
            } else {
                Tick::Continue
            };
        };

        let built = self.builder.build(scope).await;

        let mut persist: Option<Versioned> = None;
        {
            let mut state = lock(&cell.state);
            state.building = false;
            if state.retired {
                return Tick::Stop;
            }

            match built {
                Err(e) => {
                    warn!(%scope, error = %e, "Snapshot build failed, retrying on next tick");
                }
                Ok(next) => {
                    // A lot that vanished diffs against an empty snapshot,
                    // publishing its removal.
                    let next = next.unwrap_or_default();
                    let candidate = state.version.saturating_add(1);
                    let delta = diff(&prev, &next, candidate);
                    if delta.is_empty() {
                        let ping = self.ping(state.version);
                        state.subscribers.publish(&ping);
                    } else {
                        let changed = delta.lots.len();
                        let removed = delta.removed_lot_ids.len();
                        let next = Arc::new(next);
                        state.version = candidate;
                        state.snapshot = Some(Arc::clone(&next));
                        let delivered = state.subscribers.publish(&FeedEvent::Delta(delta));
                        debug!(%scope, version = candidate, changed, removed, delivered, "Delta published");
                        persist = Some((next, candidate));
                    }
                }
            }
        }

        if let Some((snapshot, version)) = persist {
            self.store.save(scope, &snapshot, version).await;
        }

        if self.retire_if_empty(cell) {
            Tick::Stop
        } else {
            Tick::Continue
        }
    }

    /// Send a ping to a single sink.
    fn ping_one(&self, cell: &ScopeCell, sink_id: SinkId) {
        let mut state = lock(&cell.state);
        let ping = self.ping(state.version);
        state.subscribers.send_to(sink_id, &ping);
    }

    fn ping(&self, version: u64) -> FeedEvent {
        FeedEvent::Ping(HeartbeatPayload {
            version,
            ts: self.clock.now_millis(),
        })
    }
}

fn snapshot_event(snapshot: &Snapshot, version: u64) -> FeedEvent {
    FeedEvent::Snapshot(SnapshotPayload {
        version,
        lots: snapshot.lots().to_vec(),
    })
}

fn invalid_target(scope: Scope) -> FeedEvent {
    FeedEvent::error(FeedError::InvalidTarget(scope).to_string())
}

/// A sink's attachment to a scope.
///
/// Dropping the subscription detaches the sink; if it was the scope's last
/// sink the scope is retired on the spot.
pub struct Subscription {
    inner: Arc<FeedInner>,
    cell: Arc<ScopeCell>,
    sink_id: SinkId,
    attached: bool,
}

impl Subscription {
    /// The scope the sink is attached to.
    pub fn scope(&self) -> Scope {
        self.cell.scope
    }

    /// The attached sink's id.
    pub const fn sink_id(&self) -> SinkId {
        self.sink_id
    }

    /// Detach now rather than on drop.
    pub fn detach(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if std::mem::take(&mut self.attached) {
            self.inner.detach(&self.cell, self.sink_id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl core::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscription")
            .field("scope", &self.cell.scope)
            .field("sink_id", &self.sink_id)
            .field("attached", &self.attached)
            .finish()
    }
}
