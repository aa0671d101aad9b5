//! Shared application state for the lineage server.
//!
//! The graph engine is read-only after build; the only mutation point is the
//! reloader, which constructs a complete replacement engine off-thread and
//! swaps it in under the write guard. Readers clone the `Arc` once per
//! request and keep a consistent snapshot for the request's lifetime.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use lineagelens_core::{load_cache_file, LineageCache, LineageError, LineageGraph};
use tokio::sync::RwLock;

/// Server configuration derived from CLI arguments and environment.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Local cache file
    pub cache_path: Option<PathBuf>,
    /// Port to listen on
    pub port: u16,
    /// Remote bucket holding the cache blob
    pub bucket: Option<String>,
    /// Blob path inside the bucket
    pub blob: Option<String>,
    /// Project identifier for authenticated retrieval
    pub project: Option<String>,
}

/// Shared application state.
pub struct AppState {
    pub config: ServerConfig,
    /// Current engine; `None` until a cache loads successfully.
    pub engine: RwLock<Option<Arc<LineageGraph>>>,
    /// RFC 3339 timestamp of the last successful load.
    pub loaded_at: RwLock<Option<String>>,
}

impl AppState {
    /// State with no cache loaded; every id lookup 404s until a reload.
    pub fn empty(config: ServerConfig) -> Self {
        Self {
            config,
            engine: RwLock::new(None),
            loaded_at: RwLock::new(None),
        }
    }

    /// Create application state, attempting an initial cache load. Startup
    /// proceeds without a cache when loading fails.
    pub async fn new(config: ServerConfig) -> Result<Self> {
        let state = Self::empty(config);
        match state.reload().await {
            Ok(count) => println!("lineagelens: loaded {count} objects"),
            Err(e) => eprintln!("lineagelens: warning: no cache loaded: {e:#}"),
        }
        Ok(state)
    }

    /// Stable engine snapshot for one request.
    pub async fn engine(&self) -> Option<Arc<LineageGraph>> {
        self.engine.read().await.clone()
    }

    pub async fn loaded_at(&self) -> Option<String> {
        self.loaded_at.read().await.clone()
    }

    /// Rebuild the engine from the configured source and swap it in.
    ///
    /// Load and index construction run in a blocking thread pool; the write
    /// guard is held only for the pointer swap.
    pub async fn reload(&self) -> Result<usize> {
        let config = self.config.clone();
        let engine = tokio::task::spawn_blocking(move || -> Result<LineageGraph, LineageError> {
            let cache = load_cache(&config)?;
            Ok(LineageGraph::from_cache(cache))
        })
        .await
        .context("Cache load task was cancelled")??;

        let count = engine.object_count();
        let engine = Arc::new(engine);

        *self.engine.write().await = Some(engine);
        *self.loaded_at.write().await = Some(chrono::Utc::now().to_rfc3339());

        Ok(count)
    }
}

fn load_cache(config: &ServerConfig) -> Result<LineageCache, LineageError> {
    if let (Some(bucket), Some(blob)) = (&config.bucket, &config.blob) {
        return load_remote_cache(bucket, blob, config.project.as_deref());
    }

    let path = config.cache_path.as_ref().ok_or_else(|| {
        LineageError::invalid_cache("no cache configured: set --cache or --bucket/--blob")
    })?;
    load_cache_file(path)
}

/// Fetch the cache blob over HTTPS from the object-storage JSON media
/// endpoint. A bearer token is taken from `LINEAGELENS_TOKEN` when present.
#[cfg(feature = "remote-cache")]
fn load_remote_cache(
    bucket: &str,
    blob: &str,
    project: Option<&str>,
) -> Result<LineageCache, LineageError> {
    let escaped_blob = blob.replace('/', "%2F");
    let url = format!(
        "https://storage.googleapis.com/storage/v1/b/{bucket}/o/{escaped_blob}?alt=media"
    );

    let client = reqwest::blocking::Client::new();
    let mut request = client.get(&url);
    if let Ok(token) = std::env::var("LINEAGELENS_TOKEN") {
        request = request.bearer_auth(token);
    }
    if let Some(project) = project {
        request = request.header("x-goog-user-project", project);
    }

    let response = request
        .send()
        .map_err(|e| LineageError::source_unavailable(bucket, e.to_string()))?;
    if !response.status().is_success() {
        return Err(LineageError::source_unavailable(
            bucket,
            format!("GET {url}: {}", response.status()),
        ));
    }

    let value: serde_json::Value = response
        .json()
        .map_err(|e| LineageError::source_unavailable(bucket, e.to_string()))?;
    LineageCache::from_value(value)
}

#[cfg(not(feature = "remote-cache"))]
fn load_remote_cache(
    bucket: &str,
    _blob: &str,
    _project: Option<&str>,
) -> Result<LineageCache, LineageError> {
    Err(LineageError::source_unavailable(
        bucket,
        "remote cache retrieval requires the remote-cache build",
    ))
}
