//! Content-keyed artifact cache backed by a flat directory
//!
//! There is no in-memory index: the directory listing is the source of
//! truth, and existence is derived on demand. Artifacts only become
//! visible at their final path once complete (the fetcher renames them
//! into place), so a lookup hit is always a whole file.

use crate::key::ARTIFACT_EXT;
use crate::types::{CacheStats, CacheStatus};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// On-disk cache of fetched media artifacts
pub struct MediaCache {
    /// Backing directory, or `None` when the cache is disabled
    dir: Option<PathBuf>,
}

impl MediaCache {
    /// Open the cache rooted at `dir`, creating the directory if
    /// needed.
    ///
    /// If the directory cannot be created the cache degrades to
    /// disabled rather than failing: every lookup misses and callers
    /// fall back to uncached output locations.
    pub async fn open(dir: PathBuf) -> Self {
        match fs::create_dir_all(&dir).await {
            Ok(()) => {
                debug!(dir = %dir.display(), "Cache directory initialized");
                Self { dir: Some(dir) }
            }
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Caching disabled, cache directory unusable");
                Self { dir: None }
            }
        }
    }

    /// A cache that never hits, for degraded operation
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// The backing directory, if the cache is enabled
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// The final on-disk path for a key, if the cache is enabled
    pub fn entry_path(&self, key: &str) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.join(key))
    }

    /// Look up a key; a hit returns the artifact path.
    ///
    /// A disabled cache always misses.
    pub async fn lookup(&self, key: &str) -> Option<PathBuf> {
        let path = self.entry_path(key)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }

    /// Declare the artifact at `path` canonical for `key`.
    ///
    /// Placement at the path named by the key is already the
    /// registration; this verifies the file landed and logs.
    pub async fn register(&self, key: &str, path: &Path) {
        match fs::metadata(path).await {
            Ok(meta) => {
                debug!(key, path = %path.display(), size = meta.len(), "Registered cache entry")
            }
            Err(e) => {
                warn!(key, path = %path.display(), error = %e, "Registered path is not readable")
            }
        }
    }

    /// Current cache statistics.
    ///
    /// Enumerates the backing directory non-recursively and counts
    /// artifact files only. O(files) per call, which is acceptable at
    /// the expected file counts; revisit before pointing this at a
    /// large cache.
    pub async fn stats(&self) -> CacheStats {
        let Some(dir) = &self.dir else {
            return CacheStats {
                status: CacheStatus::Disabled,
                total_size: 0,
                files: 0,
            };
        };

        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to read cache directory for stats");
                return CacheStats {
                    status: CacheStatus::Error,
                    total_size: 0,
                    files: 0,
                };
            }
        };

        let mut files = 0u64;
        let mut total_size = 0u64;
        while let Ok(Some(entry)) = entries.next_entry().await {
            if !entry.file_name().to_string_lossy().ends_with(ARTIFACT_EXT) {
                continue;
            }
            // Entries can vanish between listing and stat
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if meta.is_dir() {
                continue;
            }
            files += 1;
            total_size += meta.len();
        }

        CacheStats {
            status: CacheStatus::Enabled,
            total_size,
            files,
        }
    }
}
