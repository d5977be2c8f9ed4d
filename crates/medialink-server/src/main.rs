//! Medialink - cached media fetch service
//!
//! Accepts fetch requests for a source URL and quality, produces a
//! playable MP4 via yt-dlp, and serves repeat requests from an on-disk
//! content-keyed cache that a background janitor keeps bounded in age.

mod cache;
mod error;
mod fetcher;
mod janitor;
mod key;
mod server;
mod types;

use crate::cache::MediaCache;
use crate::error::{MediaServerError, Result};
use crate::fetcher::MediaFetcher;
use crate::server::{start_server, ServerState, SharedState};
use crate::types::ServerConfig;
use log_ring::{LogRing, RingLayer};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;

    // Every emission reaches both the process output and the ring that
    // backs /logs; the ring is handed to the server by reference.
    let logs = Arc::new(LogRing::new(config.log_buffer_size));

    let env_filter =
        EnvFilter::from_default_env().add_directive("medialink_server=info".parse()?);
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(RingLayer::new(logs.clone()));

    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    };

    info!("Starting Medialink server...");
    info!("Port: {}", config.port);
    info!("Cache dir: {:?}", config.cache_dir);
    info!("Cache max age: {} seconds", config.cache_max_age_secs);
    info!("Cleanup interval: {} seconds", config.cleanup_interval_secs);
    info!("Log buffer size: {}", config.log_buffer_size);

    let cache = Arc::new(MediaCache::open(config.cache_dir.clone()).await);
    let fetcher = MediaFetcher::new(config.cookies_dir.clone(), config.ytdlp_bin.clone());

    // The janitor shares the server's cache handle
    tokio::spawn(janitor::run(
        cache.clone(),
        Duration::from_secs(config.cleanup_interval_secs),
        Duration::from_secs(config.cache_max_age_secs),
    ));

    let state: SharedState = Arc::new(ServerState::new(cache, fetcher, logs));

    start_server(state, config.port)
        .await
        .map_err(|e| MediaServerError::Config(format!("Server error: {}", e)))?;

    Ok(())
}

fn load_config() -> Result<ServerConfig> {
    let defaults = ServerConfig::default();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(defaults.port);

    let cache_dir = std::env::var("CACHE_DIR")
        .map(PathBuf::from)
        .unwrap_or(defaults.cache_dir);

    let cache_max_age_secs = std::env::var("CACHE_MAX_AGE_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(defaults.cache_max_age_secs);

    let cleanup_interval_secs = std::env::var("CLEANUP_INTERVAL_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(defaults.cleanup_interval_secs);

    let log_buffer_size = std::env::var("LOG_BUFFER_SIZE")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(defaults.log_buffer_size);

    let cookies_dir = std::env::var("COOKIES_DIR")
        .map(PathBuf::from)
        .unwrap_or(defaults.cookies_dir);

    let ytdlp_bin = std::env::var("YTDLP_BIN").unwrap_or(defaults.ytdlp_bin);

    Ok(ServerConfig {
        port,
        cache_dir,
        cache_max_age_secs,
        cleanup_interval_secs,
        log_buffer_size,
        cookies_dir,
        ytdlp_bin,
    })
}
