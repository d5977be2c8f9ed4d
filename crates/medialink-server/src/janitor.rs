//! Periodic cache eviction
//!
//! Sweeps the cache directory and removes artifacts older than a
//! configured age. Best-effort: a file that vanishes or resists
//! removal is logged and skipped, never failing the sweep.

use crate::cache::MediaCache;
use crate::error::{MediaServerError, Result};
use crate::key::ARTIFACT_EXT;
use crate::types::SweepStats;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Remove cached artifacts older than `max_age`.
///
/// `max_age` of zero removes every artifact (manual cache clear).
/// Only files carrying the artifact extension directly under the cache
/// root are candidates; subdirectories and other files are never
/// touched. Returns an error only when the cache root itself cannot be
/// enumerated.
pub async fn sweep(cache: &MediaCache, max_age: Duration) -> Result<SweepStats> {
    let Some(dir) = cache.dir() else {
        debug!("Cache sweep skipped, caching disabled");
        return Ok(SweepStats::default());
    };

    let mut entries = fs::read_dir(dir).await.map_err(|e| {
        MediaServerError::Cache(format!(
            "failed to read cache directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    let now = SystemTime::now();
    let mut stats = SweepStats::default();

    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        if !name.to_string_lossy().ends_with(ARTIFACT_EXT) {
            continue;
        }

        let path = entry.path();
        // The file may already be gone; concurrent sweeps and lookups
        // are tolerated, not errors.
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        if meta.is_dir() {
            continue;
        }

        let expired = if max_age.is_zero() {
            true
        } else {
            match meta.modified() {
                Ok(modified) => now
                    .duration_since(modified)
                    .map(|age| age > max_age)
                    .unwrap_or(false),
                Err(_) => false,
            }
        };
        if !expired {
            continue;
        }

        match fs::remove_file(&path).await {
            Ok(()) => {
                stats.removed += 1;
                stats.bytes_removed += meta.len();
                debug!(path = %path.display(), size = meta.len(), "Removed expired cache file");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to remove expired cache file");
            }
        }
    }

    if stats.removed > 0 {
        info!(
            removed = stats.removed,
            bytes_removed = stats.bytes_removed,
            "Cache sweep completed"
        );
    } else {
        debug!("Cache sweep completed, no expired files");
    }

    Ok(stats)
}

/// Run periodic sweeps until the task is dropped.
///
/// One sweep at a time: the loop awaits each sweep before the next
/// tick, and missed ticks are skipped rather than queued.
pub async fn run(cache: Arc<MediaCache>, period: Duration, max_age: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick fires immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if let Err(e) = sweep(&cache, max_age).await {
            warn!(error = %e, "Cache sweep failed");
        }
    }
}
