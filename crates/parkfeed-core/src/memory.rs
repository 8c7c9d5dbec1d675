//! In-memory collaborators.
//!
//! [`MemorySource`] and [`MemoryCache`] stand in for `PostgreSQL` and
//! Dragonfly in tests and local runs. Both can be switched into a failing
//! mode, and the source can be held mid-query to exercise concurrent
//! warm-ups.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use parkfeed_types::{LotId, LotSnapshot, Snapshot};
use tokio::sync::{Notify, RwLock, RwLockWriteGuard};

use crate::builder::AvailabilitySource;
use crate::error::{CacheError, StorageError};
use crate::store::SnapshotCache;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A mutable, in-process set of lots.
#[derive(Debug, Default)]
pub struct MemorySource {
    lots: Mutex<Vec<LotSnapshot>>,
    builds: AtomicUsize,
    failing: AtomicBool,
    gate: RwLock<()>,
    entered: Notify,
}

impl MemorySource {
    /// A source serving `lots`.
    pub fn new(lots: Vec<LotSnapshot>) -> Self {
        Self {
            lots: Mutex::new(lots),
            ..Self::default()
        }
    }

    /// Replace every lot.
    pub fn set_lots(&self, lots: Vec<LotSnapshot>) {
        *lock(&self.lots) = lots;
    }

    /// Insert or replace one lot.
    pub fn upsert_lot(&self, lot: LotSnapshot) {
        let mut lots = lock(&self.lots);
        lots.retain(|l| l.id != lot.id);
        lots.push(lot);
    }

    /// Delete one lot.
    pub fn remove_lot(&self, id: LotId) {
        lock(&self.lots).retain(|l| l.id != id);
    }

    /// Make every query fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of queries answered or attempted so far.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// Block every query until the returned guard is dropped.
    pub async fn hold(&self) -> RwLockWriteGuard<'_, ()> {
        self.gate.write().await
    }

    /// Wait until a query has started.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    async fn begin(&self) -> Result<(), StorageError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        let _pass = self.gate.read().await;
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::new("memory source is failing"));
        }
        Ok(())
    }
}

#[async_trait]
impl AvailabilitySource for MemorySource {
    async fn query_all_lots_with_spots(&self) -> Result<Snapshot, StorageError> {
        self.begin().await?;
        Ok(Snapshot::new(lock(&self.lots).clone()))
    }

    async fn query_lot_with_spots(&self, id: LotId) -> Result<Option<LotSnapshot>, StorageError> {
        self.begin().await?;
        Ok(lock(&self.lots).iter().find(|l| l.id == id).cloned())
    }
}

/// A key/value cache kept in a hash map. TTLs are recorded, not enforced.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, u64)>>,
    failing: AtomicBool,
}

impl MemoryCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Store a raw value with no TTL, bypassing the failure switch.
    pub fn insert_raw(&self, key: &str, value: &str) {
        lock(&self.entries).insert(key.to_owned(), (value.to_owned(), 0));
    }

    /// The raw value at `key`.
    pub fn value_of(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).map(|(v, _)| v.clone())
    }

    /// The TTL the value at `key` was written with.
    pub fn ttl_of(&self, key: &str) -> Option<u64> {
        lock(&self.entries).get(key).map(|(_, ttl)| *ttl)
    }

    /// Drop every entry, as if all TTLs had lapsed.
    pub fn expire_all(&self) {
        lock(&self.entries).clear();
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::new("memory cache is failing"));
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.check()?;
        Ok(self.value_of(key))
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError> {
        self.check()?;
        lock(&self.entries).insert(key.to_owned(), (value.to_owned(), ttl_secs));
        Ok(())
    }
}
