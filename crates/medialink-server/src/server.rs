//! HTTP server for the media fetch service
//!
//! Provides /health, /fetch, /cache/status, /cache (DELETE), and /logs
//! endpoints.

use crate::cache::MediaCache;
use crate::error::Result;
use crate::fetcher::MediaFetcher;
use crate::janitor;
use crate::key;
use crate::types::{FetchRequest, HealthResponse, SweepStats};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, Utc};
use log_ring::{LogEntry, LogLevel, LogRing};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::sync::Mutex;
use tokio_util::io::ReaderStream;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

/// Shared state for the HTTP server
pub struct ServerState {
    pub cache: Arc<MediaCache>,
    pub fetcher: MediaFetcher,
    pub logs: Arc<LogRing>,
    pub started_at: DateTime<Utc>,
    /// Per-key in-flight markers so concurrent misses on one key wait
    /// on a single fetch instead of issuing duplicates
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ServerState {
    pub fn new(cache: Arc<MediaCache>, fetcher: MediaFetcher, logs: Arc<LogRing>) -> Self {
        Self {
            cache,
            fetcher,
            logs,
            started_at: Utc::now(),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    async fn key_guard(&self, key: &str) -> Arc<Mutex<()>> {
        let mut map = self.inflight.lock().await;
        map.entry(key.to_string()).or_default().clone()
    }

    /// Prune the entry for `key` once no request holds it.
    ///
    /// Callers drop their guard clone before releasing, so a strong
    /// count of one means only the map's own reference remains.
    async fn release_key(&self, key: &str) {
        let mut map = self.inflight.lock().await;
        if let Some(guard) = map.get(key) {
            if Arc::strong_count(guard) == 1 {
                map.remove(key);
            }
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct ClearCacheResponse {
    message: String,
    #[serde(flatten)]
    stats: SweepStats,
}

#[derive(Deserialize)]
struct LogsQuery {
    level: Option<String>,
    limit: Option<String>,
}

#[derive(Serialize)]
struct LogsResponse {
    logs: Vec<LogEntry>,
    count: usize,
}

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/fetch", post(fetch_media))
        .route("/cache/status", get(cache_status))
        .route("/cache", delete(clear_cache))
        .route("/logs", get(get_logs))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let cache = state.cache.stats().await;
    let uptime_secs = (Utc::now() - state.started_at).num_seconds() as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        cache,
    })
}

/// Fetch media for a (url, quality) pair, serving from cache on a hit
async fn fetch_media(State(state): State<SharedState>, Json(req): Json<FetchRequest>) -> Response {
    if req.url.is_empty() || req.quality.is_empty() {
        warn!(url = %req.url, quality = %req.quality, "Invalid fetch request");
        return error_response(StatusCode::BAD_REQUEST, "url and quality are required");
    }

    let cache_key = key::cache_file_name(&req.url, &req.quality);

    // Serialize concurrent requests for the same key; waiters see a
    // cache hit once the first fetch has registered.
    let guard = state.key_guard(&cache_key).await;
    let result = {
        let _held = guard.lock().await;
        fetch_and_serve(&state, &req, &cache_key).await
    };
    drop(guard);
    state.release_key(&cache_key).await;

    match result {
        Ok(response) => response,
        Err(e) => {
            error!(url = %req.url, quality = %req.quality, error = %e, "Media fetch failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

async fn fetch_and_serve(
    state: &ServerState,
    req: &FetchRequest,
    cache_key: &str,
) -> Result<Response> {
    if let Some(path) = state.cache.lookup(cache_key).await {
        info!(url = %req.url, quality = %req.quality, key = cache_key, "Cache hit");
        return serve_artifact(&path, cache_key, true).await;
    }

    info!(url = %req.url, quality = %req.quality, key = cache_key, "Cache miss, fetching");

    if let Some(final_path) = state.cache.entry_path(cache_key) {
        state
            .fetcher
            .fetch(&req.url, &req.quality, &final_path)
            .await?;
        state.cache.register(cache_key, &final_path).await;
        serve_artifact(&final_path, cache_key, false).await
    } else {
        // Degraded mode: fetch into a one-shot temporary directory and
        // stream from the open handle. Removing the directory once the
        // file is open leaves the handle readable until the response
        // body is drained.
        let tmp = tempfile::tempdir()?;
        let output = tmp.path().join(cache_key);
        state.fetcher.fetch(&req.url, &req.quality, &output).await?;
        let file = fs::File::open(&output).await?;
        let len = file.metadata().await?.len();
        drop(tmp);
        let stream = ReaderStream::new(file);
        Ok(artifact_response(
            cache_key,
            false,
            len,
            Body::from_stream(stream),
        ))
    }
}

/// Stream a cached artifact from disk
async fn serve_artifact(path: &Path, cache_key: &str, hit: bool) -> Result<Response> {
    let file = fs::File::open(path).await?;
    let len = file.metadata().await?.len();
    let stream = ReaderStream::new(file);

    Ok(artifact_response(cache_key, hit, len, Body::from_stream(stream)))
}

fn artifact_response(cache_key: &str, hit: bool, len: u64, body: Body) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::CONTENT_LENGTH, len)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", cache_key),
        )
        .header("X-Cache", if hit { "HIT" } else { "MISS" })
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Cache statistics endpoint
async fn cache_status(State(state): State<SharedState>) -> Response {
    Json(state.cache.stats().await).into_response()
}

/// Manual cache clear: sweep with zero max age
async fn clear_cache(State(state): State<SharedState>) -> Response {
    info!("Cache clear requested");
    match janitor::sweep(&state.cache, Duration::ZERO).await {
        Ok(stats) => Json(ClearCacheResponse {
            message: "Cache cleared successfully".to_string(),
            stats,
        })
        .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to clear cache");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

/// Recent logs, filtered by minimum severity.
///
/// An unrecognized level falls back to Info; an unparseable or
/// non-positive limit is ignored.
async fn get_logs(State(state): State<SharedState>, Query(query): Query<LogsQuery>) -> Response {
    let level = query
        .level
        .as_deref()
        .and_then(LogLevel::parse)
        .unwrap_or(LogLevel::Info);
    let limit = query
        .limit
        .as_deref()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(0);

    let logs = state.logs.filtered(level, limit);
    Json(LogsResponse {
        count: logs.len(),
        logs,
    })
    .into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use std::path::PathBuf;
    use tempfile::tempdir;
    use tower::ServiceExt;

    async fn create_test_state(cache_dir: PathBuf, cookies_dir: PathBuf) -> SharedState {
        let cache = Arc::new(MediaCache::open(cache_dir).await);
        let fetcher = MediaFetcher::new(cookies_dir, "yt-dlp".to_string());
        let logs = Arc::new(LogRing::new(32));
        Arc::new(ServerState::new(cache, fetcher, logs))
    }

    fn json_post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let dir = tempdir().unwrap();
        let state =
            create_test_state(dir.path().join("cache"), dir.path().to_path_buf()).await;
        let router = create_router(state);

        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert!(json["uptime_secs"].as_u64().is_some());
        assert_eq!(json["cache"]["status"], "enabled");
    }

    #[tokio::test]
    async fn test_cache_status_reflects_artifacts() {
        let dir = tempdir().unwrap();
        let cache_dir = dir.path().join("cache");
        let state = create_test_state(cache_dir.clone(), dir.path().to_path_buf()).await;
        let router = create_router(state);

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/cache/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["status"], "enabled");
        assert_eq!(json["total_size"], 0);
        assert_eq!(json["files"], 0);

        fs::write(cache_dir.join("abc_720.mp4"), vec![0u8; 1000])
            .await
            .unwrap();

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/cache/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["total_size"], 1000);
        assert_eq!(json["files"], 1);
    }

    #[tokio::test]
    async fn test_fetch_rejects_missing_fields() {
        let dir = tempdir().unwrap();
        let state =
            create_test_state(dir.path().join("cache"), dir.path().to_path_buf()).await;
        let router = create_router(state);

        let response = router
            .oneshot(json_post("/fetch", r#"{"url": "", "quality": "720p"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("required"));
    }

    #[tokio::test]
    async fn test_fetch_miss_without_cookies_is_server_error() {
        let dir = tempdir().unwrap();
        // Cookies dir deliberately empty, so the collaborator fails fast
        let state =
            create_test_state(dir.path().join("cache"), dir.path().join("cookies")).await;
        let router = create_router(state);

        let response = router
            .oneshot(json_post(
                "/fetch",
                r#"{"url": "https://youtu.be/dQw4w9WgXcQ", "quality": "720p"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("Cookie file"));
    }

    #[tokio::test]
    async fn test_fetch_serves_cached_artifact_as_hit() {
        let dir = tempdir().unwrap();
        let cache_dir = dir.path().join("cache");
        let state = create_test_state(cache_dir.clone(), dir.path().to_path_buf()).await;

        // Pre-place the artifact at the path its key implies
        let cache_key = key::cache_file_name("https://youtu.be/dQw4w9WgXcQ", "720p");
        fs::write(cache_dir.join(&cache_key), b"cached video bytes")
            .await
            .unwrap();

        let router = create_router(state);
        let response = router
            .oneshot(json_post(
                "/fetch",
                r#"{"url": "https://youtu.be/dQw4w9WgXcQ", "quality": "720p"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["X-Cache"], "HIT");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"cached video bytes");
    }

    #[tokio::test]
    async fn test_clear_cache_removes_artifacts() {
        let dir = tempdir().unwrap();
        let cache_dir = dir.path().join("cache");
        let state = create_test_state(cache_dir.clone(), dir.path().to_path_buf()).await;

        fs::write(cache_dir.join("a_720.mp4"), vec![0u8; 100])
            .await
            .unwrap();
        fs::write(cache_dir.join("b_1080.mp4"), vec![0u8; 200])
            .await
            .unwrap();

        let router = create_router(state);
        let response = router
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/cache")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["message"], "Cache cleared successfully");
        assert_eq!(json["removed"], 2);
        assert_eq!(json["bytes_removed"], 300);
        assert!(fs::read_dir(&cache_dir).await.is_ok());
        assert!(fs::metadata(cache_dir.join("a_720.mp4")).await.is_err());
    }

    #[tokio::test]
    async fn test_logs_endpoint_filters_and_limits() {
        let dir = tempdir().unwrap();
        let state =
            create_test_state(dir.path().join("cache"), dir.path().to_path_buf()).await;

        state.logs.add(LogEntry::new(LogLevel::Info, "A"));
        state.logs.add(LogEntry::new(LogLevel::Error, "B"));
        state.logs.add(LogEntry::new(LogLevel::Debug, "C"));
        state.logs.add(LogEntry::new(LogLevel::Warn, "D"));

        let router = create_router(state);

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/logs?level=WARN")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["count"], 2);
        assert_eq!(json["logs"][0]["msg"], "B");
        assert_eq!(json["logs"][1]["msg"], "D");

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/logs?level=warn&limit=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["count"], 1);
        assert_eq!(json["logs"][0]["msg"], "D");

        // Default level is Info; Debug entries are excluded
        let response = router
            .oneshot(Request::builder().uri("/logs").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["count"], 3);
    }

    #[tokio::test]
    async fn test_release_key_prunes_inflight_map() {
        let dir = tempdir().unwrap();
        let state =
            create_test_state(dir.path().join("cache"), dir.path().to_path_buf()).await;

        let guard = state.key_guard("abc_720.mp4").await;
        assert_eq!(state.inflight.lock().await.len(), 1);

        drop(guard);
        state.release_key("abc_720.mp4").await;
        assert!(state.inflight.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_releases_leave_no_inflight_entry() {
        let dir = tempdir().unwrap();
        let state =
            create_test_state(dir.path().join("cache"), dir.path().to_path_buf()).await;

        // Two requests for one key finishing close together
        let first = state.key_guard("abc_720.mp4").await;
        let second = state.key_guard("abc_720.mp4").await;

        drop(first);
        state.release_key("abc_720.mp4").await;
        // The second holder keeps the entry alive
        assert_eq!(state.inflight.lock().await.len(), 1);

        drop(second);
        state.release_key("abc_720.mp4").await;
        assert!(state.inflight.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_logs_bad_limit_is_ignored() {
        let dir = tempdir().unwrap();
        let state =
            create_test_state(dir.path().join("cache"), dir.path().to_path_buf()).await;

        state.logs.add(LogEntry::new(LogLevel::Info, "A"));
        state.logs.add(LogEntry::new(LogLevel::Warn, "B"));

        let router = create_router(state);

        for uri in ["/logs?limit=abc", "/logs?limit=-1", "/logs?limit=0"] {
            let response = router
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{}", uri);
            let json = body_json(response).await;
            assert_eq!(json["count"], 2, "{}", uri);
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_with_disabled_cache_streams_fetched_bytes() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        fs::write(dir.path().join("youtube.txt"), b"# cookies")
            .await
            .unwrap();

        // Stand-in downloader that writes fixed bytes to the -o target
        let script = dir.path().join("fake-downloader.sh");
        fs::write(
            &script,
            "#!/bin/sh\nwhile [ \"$1\" != \"-o\" ]; do shift; done\nprintf 'fetched bytes' > \"$2\"\n",
        )
        .await
        .unwrap();
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).unwrap();

        let cache = Arc::new(MediaCache::disabled());
        let fetcher = MediaFetcher::new(
            dir.path().to_path_buf(),
            script.to_string_lossy().into_owned(),
        );
        let logs = Arc::new(LogRing::new(32));
        let state = Arc::new(ServerState::new(cache, fetcher, logs));

        let router = create_router(state);
        let response = router
            .oneshot(json_post(
                "/fetch",
                r#"{"url": "https://youtu.be/dQw4w9WgXcQ", "quality": "720p"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["X-Cache"], "MISS");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"fetched bytes");
    }
}
