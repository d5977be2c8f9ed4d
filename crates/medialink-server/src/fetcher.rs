//! External yt-dlp fetch collaborator
//!
//! Invokes yt-dlp to produce exactly one merged MP4 artifact at the
//! requested output path, or leaves nothing visible there on failure.

use crate::error::{MediaServerError, Result};
use crate::key;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, error, info};

/// Runs yt-dlp downloads with per-source cookies and format selection
pub struct MediaFetcher {
    cookies_dir: PathBuf,
    ytdlp_bin: String,
}

impl MediaFetcher {
    pub fn new(cookies_dir: PathBuf, ytdlp_bin: String) -> Self {
        Self {
            cookies_dir,
            ytdlp_bin,
        }
    }

    /// The yt-dlp format selector and cookie file for a source URL
    fn source_profile(url: &str, quality: &str) -> (String, &'static str) {
        if url.contains("instagram.com/") {
            (
                format!("bestvideo[width<={q}]+bestaudio/best", q = quality),
                "instagram.txt",
            )
        } else {
            (
                format!(
                    "bestvideo[height<={q}]+bestaudio/best[height<={q}]",
                    q = quality
                ),
                "youtube.txt",
            )
        }
    }

    /// Download and mux the media at `url` into `output`.
    ///
    /// The download lands in a `.part.mp4` sibling and is renamed into
    /// place on success, so `output` never holds a partial artifact.
    /// Failure surfaces yt-dlp's captured output as the diagnostic.
    pub async fn fetch(&self, url: &str, quality: &str, output: &Path) -> Result<()> {
        let quality = key::normalize_quality(quality);
        let (format, cookie_file) = Self::source_profile(url, quality);

        let cookie_path = self.cookies_dir.join(cookie_file);
        if fs::metadata(&cookie_path).await.is_err() {
            error!(path = %cookie_path.display(), "Cookie file not found");
            return Err(MediaServerError::CookieMissing(cookie_path));
        }

        let partial = partial_path(output);

        info!(
            url,
            quality,
            format = %format,
            output = %output.display(),
            "Starting yt-dlp download"
        );

        let result = Command::new(&self.ytdlp_bin)
            .arg("--cookies")
            .arg(&cookie_path)
            .arg("-f")
            .arg(&format)
            .arg("--merge-output-format")
            .arg("mp4")
            .arg("-o")
            .arg(&partial)
            .arg(url)
            .output()
            .await
            .map_err(|e| MediaServerError::Fetch(format!("failed to run yt-dlp: {}", e)))?;

        if !result.status.success() {
            let diagnostic = format!(
                "yt-dlp exited with {}: {}{}",
                result.status,
                String::from_utf8_lossy(&result.stderr),
                String::from_utf8_lossy(&result.stdout),
            );
            error!(url, error = %diagnostic, "yt-dlp download failed");
            // Leave no partial output behind
            let _ = fs::remove_file(&partial).await;
            return Err(MediaServerError::Fetch(diagnostic));
        }

        if fs::metadata(&partial).await.is_err() {
            error!(url, path = %partial.display(), "Output file was not created");
            return Err(MediaServerError::Fetch(
                "media file was not created".to_string(),
            ));
        }

        fs::rename(&partial, output).await?;
        debug!(url, output = %output.display(), "yt-dlp download completed");
        Ok(())
    }
}

/// Sibling path the download is written to before the final rename
fn partial_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_default();
    name.push(".part.mp4");
    output.with_file_name(name)
}
