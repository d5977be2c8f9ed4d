//! Core types for the medialink server

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Body of a `POST /fetch` request
#[derive(Debug, Clone, Deserialize)]
pub struct FetchRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub quality: String,
}

/// Whether the on-disk cache is usable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Enabled,
    Disabled,
    Error,
}

/// Statistics about the cache, derived from the backing directory
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub status: CacheStatus,
    pub total_size: u64,
    pub files: u64,
}

/// Aggregate result of a janitor sweep
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SweepStats {
    pub removed: u64,
    pub bytes_removed: u64,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub cache: CacheStats,
}

/// Configuration for the server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub cache_dir: PathBuf,
    pub cache_max_age_secs: u64,
    pub cleanup_interval_secs: u64,
    pub log_buffer_size: usize,
    pub cookies_dir: PathBuf,
    pub ytdlp_bin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            cache_dir: PathBuf::from("./cache"),
            cache_max_age_secs: 24 * 60 * 60,     // 24 hours
            cleanup_interval_secs: 6 * 60 * 60,   // 6 hours
            log_buffer_size: 1000,
            cookies_dir: PathBuf::from("."),
            ytdlp_bin: "yt-dlp".to_string(),
        }
    }
}
