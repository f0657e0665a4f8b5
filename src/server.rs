//! Resident HTTP server.
//!
//! Keeps the index and embedding cache warm in memory and answers
//! search/semsearch/reload without touching disk. Reads during a reload
//! see the previous snapshot; the swap happens under a single write lock,
//! so one in-flight mutation at a time is all there is.

use crate::config::IndexConfig;
use crate::index::IndexBuilder;
use crate::persist;
use crate::query;
use crate::semantic::{self, cache::DocCache};
use crate::types::ProjectIndex;
use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

pub struct ServerState {
    config: IndexConfig,
    index: RwLock<Option<ProjectIndex>>,
    cache: RwLock<Option<DocCache>>,
}

pub type SharedState = Arc<ServerState>;

impl ServerState {
    /// Load the persisted index, building and persisting it when absent.
    /// The embedding cache stays lazy until the first semsearch.
    pub async fn initialize(config: IndexConfig) -> Result<SharedState> {
        let index = match persist::load_index(&config.index_path())? {
            Some(index) => index,
            None => {
                tracing::info!("no index on disk, building");
                let builder = IndexBuilder::new(config.clone());
                let index = builder.full_build().await?;
                persist::save_index(&config.index_path(), &index)?;
                index
            }
        };
        let cache = DocCache::load(&config.vectors_path()).unwrap_or(None);

        Ok(Arc::new(ServerState {
            config,
            index: RwLock::new(Some(index)),
            cache: RwLock::new(cache),
        }))
    }
}

pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/search", post(search))
        .route("/semsearch", post(semsearch))
        .route("/reload", post(reload))
        .fallback(not_found)
        .with_state(state)
}

/// Serve until ctrl-c / SIGTERM.
pub async fn run(addr: SocketAddr, config: IndexConfig) -> Result<()> {
    let state = ServerState::initialize(config).await?;
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("serving on http://{addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

#[derive(Deserialize)]
struct SearchBody {
    query: Option<String>,
    #[serde(default)]
    exact: bool,
}

async fn search(State(state): State<SharedState>, body: String) -> Response {
    let Ok(body) = serde_json::from_str::<SearchBody>(&body) else {
        return bad_request("bad request");
    };
    let Some(query) = body.query.filter(|q| !q.trim().is_empty()) else {
        return bad_request("query required");
    };

    let guard = state.index.read();
    let Some(index) = guard.as_ref() else {
        return error_response(StatusCode::NOT_FOUND, "No index found");
    };

    let results: Vec<serde_json::Value> = query::search(index, &query, body.exact)
        .into_iter()
        .map(|(name, location)| json!({ "name": name, "location": location }))
        .collect();

    (StatusCode::OK, Json(json!({ "query": query, "results": results }))).into_response()
}

#[derive(Deserialize)]
struct SemsearchBody {
    query: Option<String>,
    k: Option<usize>,
    model: Option<String>,
}

async fn semsearch(State(state): State<SharedState>, body: String) -> Response {
    let Ok(body) = serde_json::from_str::<SemsearchBody>(&body) else {
        return bad_request("bad request");
    };
    let Some(query) = body.query.filter(|q| !q.trim().is_empty()) else {
        return bad_request("query required");
    };
    let k = body.k.unwrap_or(20);

    match run_semsearch(&state, &query, k, body.model.as_deref()) {
        Ok(results) => {
            (StatusCode::OK, Json(json!({ "query": query, "results": results }))).into_response()
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

fn run_semsearch(
    state: &SharedState,
    query: &str,
    k: usize,
    model: Option<&str>,
) -> Result<Vec<semantic::cache::SemanticHit>> {
    let embedder = semantic::embedder(model)?;

    // Fast path: a warm cache that is still valid for this model.
    {
        let index_guard = state.index.read();
        let index = index_guard
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No index found"))?;
        let cache_guard = state.cache.read();
        if let Some(cache) = cache_guard.as_ref() {
            let entries = semantic::cache::doc_entries(index);
            if cache.is_reusable_for(embedder.model_id(), &entries) {
                return semantic::cache::semantic_search(query, cache, k, &embedder);
            }
        }
    }

    // Slow path: build (or rebuild) the cache, then swap it in.
    let rebuilt = {
        let index_guard = state.index.read();
        let index = index_guard
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No index found"))?;
        semantic::cache::ensure_cache(index, &state.config.vectors_path(), &embedder)?
    };
    let hits = semantic::cache::semantic_search(query, &rebuilt, k, &embedder)?;
    *state.cache.write() = Some(rebuilt);
    Ok(hits)
}

async fn reload(State(state): State<SharedState>) -> Response {
    // Rebuild outside the locks; readers keep the previous snapshot
    // until the swap.
    let builder = IndexBuilder::new(state.config.clone());
    let index = match builder.full_build().await {
        Ok(index) => index,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    };
    if let Err(e) = persist::save_index(&state.config.index_path(), &index) {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
    }

    let files = index.file_count();
    let vectors = match semantic::embedder(None) {
        Ok(embedder) => {
            match semantic::cache::ensure_cache(&index, &state.config.vectors_path(), &embedder) {
                Ok(cache) => {
                    let count = cache.len();
                    *state.cache.write() = Some(cache);
                    count
                }
                Err(e) => {
                    tracing::warn!("cache rebuild failed: {e}");
                    0
                }
            }
        }
        Err(e) => {
            tracing::warn!("embedder unavailable, skipping cache rebuild: {e}");
            0
        }
    };

    *state.index.write() = Some(index);

    (
        StatusCode::OK,
        Json(json!({ "status": "reloaded", "files": files, "vectors": vectors })),
    )
        .into_response()
}

async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "not found")
}

fn bad_request(message: &str) -> Response {
    error_response(StatusCode::BAD_REQUEST, message)
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
