//! Cache-backed snapshot and version persistence.
//!
//! [`SnapshotStore`] mirrors each scope's latest snapshot and version into
//! a shared cache with a TTL, so a restarted process can resume from the
//! last published state instead of starting a fresh version sequence.
//!
//! The cache is optional and never authoritative. When it is absent, errors
//! or holds unreadable data, reads return `None` and writes are dropped;
//! the scheduler's in-memory copy carries on alone and callers cannot tell
//! the difference.
//!
//! # Key Patterns
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `availability:snapshot:global` | JSON | Global snapshot |
//! | `availability:snapshot:lot:{id}` | JSON | Single-lot snapshot |
//! | `availability:version:global` | Integer | Global version |
//! | `availability:version:lot:{id}` | Integer | Single-lot version |

use std::sync::Arc;

use async_trait::async_trait;
use parkfeed_types::{LotSnapshot, Scope, Snapshot};
use tracing::{debug, warn};

use crate::error::CacheError;

/// A string key/value cache with per-key expiry.
#[async_trait]
pub trait SnapshotCache: Send + Sync {
    /// Read the value at `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Write `value` at `key`, expiring after `ttl_secs`.
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError>;
}

/// Cache key holding the snapshot of `scope`.
pub fn snapshot_key(scope: Scope) -> String {
    format!("availability:snapshot:{scope}")
}

/// Cache key holding the version of `scope`.
pub fn version_key(scope: Scope) -> String {
    format!("availability:version:{scope}")
}

/// Optional cache mirror for scope snapshots and versions.
#[derive(Clone)]
pub struct SnapshotStore {
    cache: Option<Arc<dyn SnapshotCache>>,
    ttl_secs: u64,
}

impl SnapshotStore {
    /// A store writing through `cache` with the given TTL.
    pub fn new(cache: Option<Arc<dyn SnapshotCache>>, ttl_secs: u64) -> Self {
        Self { cache, ttl_secs }
    }

    /// A store with no cache: every read misses, every write is dropped.
    pub fn in_memory() -> Self {
        Self {
            cache: None,
            ttl_secs: 0,
        }
    }

    /// Whether a cache is configured.
    pub const fn has_cache(&self) -> bool {
        self.cache.is_some()
    }

    /// The cached snapshot for `scope`.
    pub async fn get(&self, scope: Scope) -> Option<Snapshot> {
        let raw = self.read(&snapshot_key(scope)).await?;
        match serde_json::from_str::<Snapshot>(&raw) {
            Ok(snapshot) => Some(Snapshot::new(
                snapshot
                    .into_lots()
                    .into_iter()
                    .map(|lot| LotSnapshot::new(lot.id, lot.name, lot.spots))
                    .collect(),
            )),
            Err(e) => {
                warn!(%scope, error = %e, "Discarding unreadable cached snapshot");
                None
            }
        }
    }

    /// Cache the snapshot for `scope`.
    pub async fn set(&self, scope: Scope, snapshot: &Snapshot) {
        match serde_json::to_string(snapshot) {
            Ok(json) => self.write(&snapshot_key(scope), &json).await,
            Err(e) => warn!(%scope, error = %e, "Failed to serialize snapshot for cache"),
        }
    }

    /// The cached version for `scope`.
    pub async fn get_version(&self, scope: Scope) -> Option<u64> {
        let raw = self.read(&version_key(scope)).await?;
        match raw.trim().parse::<u64>() {
            Ok(version) => Some(version),
            Err(e) => {
                warn!(%scope, value = raw, error = %e, "Discarding unreadable cached version");
                None
            }
        }
    }

    /// Cache the version for `scope`.
    pub async fn set_version(&self, scope: Scope, version: u64) {
        self.write(&version_key(scope), &version.to_string()).await;
    }

    /// Cache both snapshot and version.
    pub async fn save(&self, scope: Scope, snapshot: &Snapshot, version: u64) {
        if self.cache.is_none() {
            return;
        }
        self.set(scope, snapshot).await;
        self.set_version(scope, version).await;
        debug!(%scope, version, "Snapshot persisted to cache");
    }

    /// Load a previously published state: the snapshot, if cached, with its
    /// version (1 if the version key expired first), plus the cached
    /// version on its own when no snapshot survived.
    pub async fn load(&self, scope: Scope) -> (Option<(Snapshot, u64)>, Option<u64>) {
        if self.cache.is_none() {
            return (None, None);
        }
        let version = self.get_version(scope).await;
        let snapshot = self
            .get(scope)
            .await
            .map(|s| (s, version.unwrap_or(1).max(1)));
        (snapshot, version)
    }

    async fn read(&self, key: &str) -> Option<String> {
        let cache = self.cache.as_ref()?;
        match cache.get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Cache read failed, continuing without cache");
                None
            }
        }
    }

    async fn write(&self, key: &str, value: &str) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        if let Err(e) = cache.set(key, value, self.ttl_secs).await {
            warn!(key, error = %e, "Cache write failed, continuing without cache");
        }
    }
}
