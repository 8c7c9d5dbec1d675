//! `Dragonfly` (Redis-compatible) snapshot cache.
//!
//! `Dragonfly` mirrors each live scope's latest snapshot and version so a
//! restarted process resumes the version sequence instead of starting over.
//! Every key carries a TTL; the cache is never the source of truth and the
//! engine runs without it when it is unreachable. Key patterns are owned by
//! [`parkfeed_core::store`].

use async_trait::async_trait;
use fred::prelude::*;
use fred::types::Expiration;
use parkfeed_core::{CacheError, SnapshotCache};

use crate::error::DbError;

/// Snapshot cache client for a `Dragonfly` (or any Redis-compatible) server.
#[derive(Clone)]
pub struct DragonflyPool {
    client: Client,
}

impl DragonflyPool {
    /// Open a client for `url` (`redis://host:port[/db]`) and wait until it
    /// is connected.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] for a malformed URL, or
    /// [`DbError::Dragonfly`] if the server cannot be reached.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let config = Config::from_url(url)
            .map_err(|e| DbError::Config(format!("Invalid Dragonfly URL: {e}")))?;
        let client = Builder::from_config(config).build()?;
        client.init().await?;

        tracing::info!("Connected to Dragonfly");
        Ok(Self { client })
    }

    /// Store `value` at `key`, expiring after `ttl_secs` seconds.
    ///
    /// A zero TTL stores the key without expiry.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the write fails.
    pub async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), DbError> {
        let expire = (ttl_secs > 0).then(|| Expiration::EX(i64::try_from(ttl_secs).unwrap_or(i64::MAX)));
        let _: () = self.client.set(key, value, expire, None, false).await?;
        Ok(())
    }

    /// Read the string at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the read fails.
    pub async fn get_string(&self, key: &str) -> Result<Option<String>, DbError> {
        let value: Option<String> = self.client.get(key).await?;
        Ok(value)
    }

    /// Remaining TTL of `key` in seconds, `None` if the key is missing or
    /// has no expiry.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the read fails.
    pub async fn ttl(&self, key: &str) -> Result<Option<u64>, DbError> {
        let ttl: i64 = self.client.ttl(key).await?;
        Ok(u64::try_from(ttl).ok())
    }

    /// Delete a key from `Dragonfly`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the delete fails.
    pub async fn delete(&self, key: &str) -> Result<(), DbError> {
        let _: u32 = self.client.del(key).await?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotCache for DragonflyPool {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.get_string(key).await?)
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError> {
        Ok(self.set_with_ttl(key, value, ttl_secs).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_unparseable_url() {
        let result = DragonflyPool::connect("definitely not a url").await;
        assert!(matches!(result, Err(DbError::Config(_))));
    }
}
