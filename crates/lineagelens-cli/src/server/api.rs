//! REST API handlers for the lineage query adapter.
//!
//! Pure shape transformation over the engine: depth bounds are enforced
//! here, missing ids map to 404, and engine results pass through with the
//! root object attached. With no cache loaded, id-keyed lookups 404 and
//! collection endpoints return empty results.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use lineagelens_core::{
    ColumnLineageResult, DatabaseObject, Direction, LineageGraph, ObjectColumnLineage, ObjectKind,
    Statistics, TableLevelDependency,
};
use serde::{Deserialize, Serialize};

use super::AppState;

type ApiError = (StatusCode, String);

/// Build the API router with all endpoints.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/objects", get(list_objects))
        .route("/objects/{id}", get(get_object))
        .route("/lineage/{id}/full", get(full_lineage))
        .route("/lineage/{id}/forward", get(forward_lineage))
        .route("/lineage/{id}/backward", get(backward_lineage))
        .route("/lineage/{id}/columns", get(object_column_lineage))
        .route("/lineage/{id}/column/{column}", get(column_lineage))
        .route("/search", get(search))
        .route("/schemas", get(schemas))
        .route("/kinds", get(kinds))
        .route("/statistics", get(statistics))
        .route("/reload", post(reload))
}

// === Request/Response types ===

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
struct ListParams {
    #[serde(default = "default_page")]
    page: usize,
    #[serde(default = "default_page_size")]
    page_size: usize,
    schema: Option<String>,
    kind: Option<String>,
}

#[derive(Deserialize)]
struct FullLineageParams {
    #[serde(default = "default_full_depth")]
    upstream_depth: usize,
    #[serde(default = "default_full_depth")]
    downstream_depth: usize,
}

#[derive(Deserialize)]
struct DepthParams {
    #[serde(default = "default_depth")]
    depth: usize,
}

#[derive(Deserialize)]
struct ColumnParams {
    direction: Option<Direction>,
    #[serde(default = "default_column_depth")]
    depth: usize,
}

#[derive(Deserialize)]
struct SearchParams {
    q: String,
    #[serde(default = "default_limit")]
    limit: usize,
    schema: Option<String>,
    kind: Option<String>,
}

fn default_page() -> usize {
    1
}
fn default_page_size() -> usize {
    50
}
fn default_full_depth() -> usize {
    2
}
fn default_depth() -> usize {
    1
}
fn default_column_depth() -> usize {
    3
}
fn default_limit() -> usize {
    20
}

#[derive(Serialize)]
struct ObjectListResponse {
    items: Vec<DatabaseObject>,
    total: usize,
    page: usize,
    page_size: usize,
    total_pages: usize,
}

#[derive(Serialize)]
struct LineageResponse {
    root_object: DatabaseObject,
    nodes: HashMap<String, DatabaseObject>,
    edges: Vec<TableLevelDependency>,
    has_more_upstream: HashMap<String, bool>,
    has_more_downstream: HashMap<String, bool>,
}

#[derive(Serialize)]
struct SearchResult {
    id: String,
    schema: String,
    name: String,
    kind: ObjectKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

#[derive(Serialize)]
struct StatisticsResponse {
    #[serde(flatten)]
    statistics: Statistics,
    cache_loaded_at: Option<String>,
}

#[derive(Serialize)]
struct ReloadResponse {
    status: &'static str,
    objects: usize,
    cache_loaded_at: Option<String>,
}

// === Helpers ===

fn not_found(id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        format!("Object not found: {id}"),
    )
}

fn check_range(field: &str, value: usize, min: usize, max: usize) -> Result<(), ApiError> {
    if value < min || value > max {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("invalid {field}: must be between {min} and {max}"),
        ));
    }
    Ok(())
}

/// Engine snapshot plus the root object, or 404.
async fn engine_and_object(
    state: &AppState,
    id: &str,
) -> Result<(Arc<LineageGraph>, DatabaseObject), ApiError> {
    let Some(engine) = state.engine().await else {
        return Err(not_found(id));
    };
    let Some(obj) = engine.get(id).cloned() else {
        return Err(not_found(id));
    };
    Ok((engine, obj))
}

fn lineage_response(
    root_object: DatabaseObject,
    result: lineagelens_core::LineageResult,
) -> LineageResponse {
    LineageResponse {
        root_object,
        nodes: result.nodes,
        edges: result.edges,
        has_more_upstream: result.has_more_upstream,
        has_more_downstream: result.has_more_downstream,
    }
}

// === Handlers ===

/// GET /api/health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /api/objects - paginated object listing
async fn list_objects(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<ObjectListResponse>, ApiError> {
    check_range("page", params.page, 1, usize::MAX)?;
    check_range("page_size", params.page_size, 1, 200)?;

    let (items, total) = match state.engine().await {
        Some(engine) => {
            let (items, total) = engine.objects_paginated(
                params.page,
                params.page_size,
                params.schema.as_deref(),
                params.kind.as_deref(),
            );
            (items.into_iter().cloned().collect::<Vec<_>>(), total)
        }
        None => (Vec::new(), 0),
    };

    let total_pages = total.div_ceil(params.page_size);

    Ok(Json(ObjectListResponse {
        items,
        total,
        page: params.page,
        page_size: params.page_size,
        total_pages,
    }))
}

/// GET /api/objects/{id}
async fn get_object(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DatabaseObject>, ApiError> {
    let (_, obj) = engine_and_object(&state, &id).await?;
    Ok(Json(obj))
}

/// GET /api/lineage/{id}/full
async fn full_lineage(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<FullLineageParams>,
) -> Result<Json<LineageResponse>, ApiError> {
    check_range("upstream_depth", params.upstream_depth, 0, 10)?;
    check_range("downstream_depth", params.downstream_depth, 0, 10)?;

    let (engine, obj) = engine_and_object(&state, &id).await?;
    let result = engine.full_lineage(&id, params.upstream_depth, params.downstream_depth);
    Ok(Json(lineage_response(obj, result)))
}

/// GET /api/lineage/{id}/forward - incremental downstream expansion
async fn forward_lineage(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<DepthParams>,
) -> Result<Json<LineageResponse>, ApiError> {
    check_range("depth", params.depth, 1, 5)?;

    let (engine, obj) = engine_and_object(&state, &id).await?;
    let result = engine.forward_lineage(&id, params.depth);
    Ok(Json(lineage_response(obj, result)))
}

/// GET /api/lineage/{id}/backward - incremental upstream expansion
async fn backward_lineage(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<DepthParams>,
) -> Result<Json<LineageResponse>, ApiError> {
    check_range("depth", params.depth, 1, 5)?;

    let (engine, obj) = engine_and_object(&state, &id).await?;
    let result = engine.backward_lineage(&id, params.depth);
    Ok(Json(lineage_response(obj, result)))
}

/// GET /api/lineage/{id}/column/{column}
async fn column_lineage(
    State(state): State<Arc<AppState>>,
    Path((id, column)): Path<(String, String)>,
    Query(params): Query<ColumnParams>,
) -> Result<Json<ColumnLineageResult>, ApiError> {
    check_range("depth", params.depth, 1, 10)?;

    let (engine, _) = engine_and_object(&state, &id).await?;
    let direction = params.direction.unwrap_or(Direction::Both);
    Ok(Json(engine.column_lineage(&id, &column, direction, params.depth)))
}

/// GET /api/lineage/{id}/columns - per-column lineage for the object
async fn object_column_lineage(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ObjectColumnLineage>, ApiError> {
    let (engine, _) = engine_and_object(&state, &id).await?;
    Ok(Json(engine.object_column_lineage(&id)))
}

/// GET /api/search
async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SearchResult>>, ApiError> {
    if params.q.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "invalid q: must not be empty".to_string(),
        ));
    }
    check_range("limit", params.limit, 1, 100)?;

    let results = match state.engine().await {
        Some(engine) => engine
            .search(
                &params.q,
                params.limit,
                params.schema.as_deref(),
                params.kind.as_deref(),
            )
            .into_iter()
            .map(|obj| SearchResult {
                id: obj.id.clone(),
                schema: obj.schema_name.clone(),
                name: obj.name.clone(),
                kind: obj.kind,
                description: obj.description.clone(),
            })
            .collect(),
        None => Vec::new(),
    };

    Ok(Json(results))
}

/// GET /api/schemas
async fn schemas(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(match state.engine().await {
        Some(engine) => engine.schemas(),
        None => Vec::new(),
    })
}

/// GET /api/kinds
async fn kinds(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(match state.engine().await {
        Some(engine) => engine.kinds(),
        None => Vec::new(),
    })
}

/// GET /api/statistics
async fn statistics(State(state): State<Arc<AppState>>) -> Json<StatisticsResponse> {
    let statistics = match state.engine().await {
        Some(engine) => engine.statistics(),
        None => Statistics::default(),
    };

    Json(StatisticsResponse {
        statistics,
        cache_loaded_at: state.loaded_at().await,
    })
}

/// POST /api/reload - rebuild the engine from the configured source
async fn reload(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let objects = state
        .reload()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")))?;

    Ok(Json(ReloadResponse {
        status: "reloaded",
        objects,
        cache_loaded_at: state.loaded_at().await,
    }))
}
