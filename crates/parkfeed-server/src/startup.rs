//! Wiring from configuration to a running [`AppState`].
//!
//! [`build_state`] connects `PostgreSQL`, optionally connects `Dragonfly`,
//! and constructs the [`AvailabilityFeed`]. An unreachable cache is logged
//! and skipped; the feed still serves from the database alone.

use std::sync::Arc;

use parkfeed_core::{AvailabilityFeed, ParkfeedConfig, SnapshotCache, SystemClock};
use parkfeed_db::{DbError, DragonflyPool, PostgresConfig, PostgresPool};
use tracing::{info, warn};

use crate::state::AppState;

/// Errors that can occur while starting the availability server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The database could not be reached.
    #[error("database error: {0}")]
    Database(#[from] DbError),
}

/// Build the shared application state from configuration.
///
/// # Errors
///
/// Returns [`StartupError::Database`] if `PostgreSQL` cannot be reached.
/// A failed `Dragonfly` connection is not an error.
pub async fn build_state(config: &ParkfeedConfig) -> Result<Arc<AppState>, StartupError> {
    let postgres = PostgresPool::connect(&PostgresConfig::from_infrastructure(
        &config.infrastructure,
    ))
    .await?;
    let source = Arc::new(postgres.source());

    let cache: Option<Arc<dyn SnapshotCache>> = match config.infrastructure.cache_url() {
        Some(url) => match DragonflyPool::connect(url).await {
            Ok(pool) => Some(Arc::new(pool)),
            Err(e) => {
                warn!(error = %e, "Dragonfly unavailable, running without snapshot cache");
                None
            }
        },
        None => {
            info!("No Dragonfly URL configured, running without snapshot cache");
            None
        }
    };

    let feed = AvailabilityFeed::new(
        source,
        cache,
        Arc::new(SystemClock),
        config.feed,
    );
    info!(
        poll_interval_ms = config.feed.poll_interval_ms,
        snapshot_ttl_secs = config.feed.snapshot_ttl_secs,
        "Availability feed ready"
    );

    Ok(Arc::new(AppState::new(feed)))
}
