//! Availability server binary for Parkfeed.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `PARKFEED_CONFIG` or `parkfeed-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Connect `PostgreSQL` and, when configured, `Dragonfly`
//! 4. Serve the HTTP API until `Ctrl-C`

use std::path::PathBuf;

use parkfeed_core::config::LoggingConfig;
use parkfeed_core::{ConfigError, ParkfeedConfig};
use parkfeed_server::{build_state, start_server, ServerConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "parkfeed-config.yaml";

/// Application entry point for the availability server.
///
/// # Errors
///
/// Returns an error if configuration, database connection, or the
/// server itself fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    init_tracing(&config.logging);

    info!(
        host = config.server.host,
        port = config.server.port,
        poll_interval_ms = config.feed.poll_interval_ms,
        cache = config.infrastructure.cache_url().is_some(),
        "parkfeed-server starting"
    );

    let state = build_state(&config).await?;
    start_server(&ServerConfig::from(&config.server), state).await?;

    info!("parkfeed-server stopped");
    Ok(())
}

/// Load configuration, falling back to defaults when no file exists.
fn load_config() -> Result<ParkfeedConfig, ConfigError> {
    let path = std::env::var("PARKFEED_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);

    if path.exists() {
        ParkfeedConfig::from_file(&path)
    } else {
        ParkfeedConfig::parse("")
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
