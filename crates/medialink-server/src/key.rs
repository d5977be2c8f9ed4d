//! Cache key derivation
//!
//! Maps a source URL and quality selector to the on-disk artifact
//! filename, which doubles as the cache key.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

/// Extension of every cached artifact
pub const ARTIFACT_EXT: &str = ".mp4";

static YOUTUBE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/)([a-zA-Z0-9_-]{11})")
        .unwrap()
});

static INSTAGRAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"instagram\.com/p/([a-zA-Z0-9_-]+)").unwrap());

/// Extract a stable content identifier from a source URL.
///
/// Known source patterns yield the platform's own media id. Anything
/// else falls back to a fixed-width hash of the full URL, so two
/// distinct URLs never collide just because they share a length.
pub fn content_id(url: &str) -> String {
    if let Some(caps) = YOUTUBE_RE.captures(url) {
        return caps[1].to_string();
    }
    if let Some(caps) = INSTAGRAM_RE.captures(url) {
        return caps[1].to_string();
    }

    let digest = Sha256::digest(url.as_bytes());
    format!("u{}", &hex::encode(digest)[..16])
}

/// Normalize a quality label by stripping one trailing resolution
/// suffix ("720p" -> "720"), so equivalent labels collapse to one key.
pub fn normalize_quality(quality: &str) -> &str {
    quality.strip_suffix('p').unwrap_or(quality)
}

/// The artifact filename for a (URL, quality) pair.
///
/// This filename is the cache key: `<contentID>_<quality>.mp4`.
pub fn cache_file_name(url: &str, quality: &str) -> String {
    format!(
        "{}_{}{}",
        content_id(url),
        normalize_quality(quality),
        ARTIFACT_EXT
    )
}
