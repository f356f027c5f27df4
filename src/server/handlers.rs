use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

use super::AppState;
use crate::error::ExplorerResult;
use crate::lod::surface::{DrawCommand, RecordingSurface};
use crate::lod::{render_frame, FrameRequest, FrameStats, LodConfig};
use crate::loader::LoadProgress;
use crate::models::{GraphData, Params};
use crate::optimizer::{
    IndexInfo, OptimizeOptions, OptimizedResult, PaginatedResult, PaginationConfig, Projection,
    QueryAnalysis, SchemaInspector,
};
use crate::sanitizer::generate_node_coordinates;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub params: Params,
}

#[derive(Debug, Deserialize)]
pub struct FrontierRequest {
    pub node_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaginateRequest {
    pub query: String,
    #[serde(default)]
    pub params: Params,
    #[serde(flatten)]
    pub page: PaginationConfig,
}

#[derive(Debug, Deserialize)]
pub struct OptimizedRequest {
    pub query: String,
    #[serde(default)]
    pub params: Params,
    pub projection: Option<Projection>,
    #[serde(default = "default_limit")]
    pub default_limit: Option<usize>,
}

fn default_limit() -> Option<usize> {
    OptimizeOptions::default().default_limit
}

#[derive(Debug, Deserialize)]
pub struct ProgressQuery {
    pub total_nodes: Option<usize>,
    pub total_links: Option<usize>,
    pub visible: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    #[serde(flatten)]
    pub progress: LoadProgress,
    pub batch_count: usize,
    pub exhausted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub should_load_more: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClearCacheRequest {
    pub pattern: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateIndexRequest {
    pub label: String,
    pub property: String,
}

#[derive(Debug, Deserialize)]
pub struct RenderRequest {
    pub graph: GraphData,
    #[serde(flatten)]
    pub frame: FrameRequest,
    #[serde(default)]
    pub lod: LodConfig,
    /// Seed for scattering nodes that arrive without coordinates.
    #[serde(default)]
    pub seed: u64,
}

#[derive(Debug, Serialize)]
pub struct RenderResponse {
    pub stats: FrameStats,
    pub commands: Vec<DrawCommand>,
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.executor.run("RETURN 1", &Params::new()).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "service": "graph-explorer-rs",
                "database": "connected",
                "sessions": state.sessions.len(),
            })),
        ),
        Err(e) => {
            error!("Health check query failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": "graph-explorer-rs",
                    "database": "query failed",
                    "error": e.to_string(),
                })),
            )
        }
    }
}

pub async fn create_session(State(state): State<AppState>) -> ExplorerResult<impl IntoResponse> {
    let id = state.open_session()?;
    info!("Opened session {}", id);
    Ok((StatusCode::CREATED, Json(json!({ "session_id": id }))))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ExplorerResult<StatusCode> {
    state.close_session(id)?;
    info!("Closed session {}", id);
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, request))]
pub async fn load_initial(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<QueryRequest>,
) -> ExplorerResult<Json<GraphData>> {
    let session = state.session(id)?;
    let mut manager = session.lock().await;
    let data = manager.load_initial(&request.query, &request.params).await?;
    Ok(Json(data))
}

#[instrument(skip(state))]
pub async fn load_neighbors(
    State(state): State<AppState>,
    Path((id, node_id)): Path<(Uuid, String)>,
) -> ExplorerResult<Json<GraphData>> {
    let session = state.session(id)?;
    let mut manager = session.lock().await;
    let data = manager.load_neighbors(&node_id).await?;
    Ok(Json(data))
}

#[instrument(skip(state, request))]
pub async fn expand_frontier(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<FrontierRequest>,
) -> ExplorerResult<Json<GraphData>> {
    let session = state.session(id)?;
    let mut manager = session.lock().await;
    let data = manager.expand_frontier(&request.node_ids).await?;
    Ok(Json(data))
}

#[instrument(skip(state, request))]
pub async fn execute_paginated(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PaginateRequest>,
) -> ExplorerResult<Json<PaginatedResult>> {
    let session = state.session(id)?;
    let manager = session.lock().await;
    let page = manager
        .execute_paginated(&request.query, &request.params, &request.page)
        .await?;
    Ok(Json(page))
}

#[instrument(skip(state, request))]
pub async fn execute_optimized(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<OptimizedRequest>,
) -> ExplorerResult<Json<OptimizedResult>> {
    let session = state.session(id)?;
    let manager = session.lock().await;
    let options = OptimizeOptions {
        projection: request.projection,
        default_limit: request.default_limit,
    };
    let result = manager
        .execute_optimized(&request.query, &request.params, &options)
        .await?;
    Ok(Json(result))
}

#[instrument(skip(state, request))]
pub async fn analyze_query(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<QueryRequest>,
) -> ExplorerResult<Json<QueryAnalysis>> {
    let session = state.session(id)?;
    let manager = session.lock().await;
    let analysis = manager.analyze_query(&request.query, &request.params).await?;
    Ok(Json(analysis))
}

pub async fn get_progress(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ProgressQuery>,
) -> ExplorerResult<Json<ProgressResponse>> {
    let session = state.session(id)?;
    let manager = session.lock().await;
    Ok(Json(ProgressResponse {
        progress: manager.get_progress(query.total_nodes, query.total_links),
        batch_count: manager.loader().batch_count(),
        exhausted: manager.loader().is_exhausted(),
        should_load_more: query.visible.map(|v| manager.should_load_more(v)),
    }))
}

pub async fn clear_cache(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    request: Option<Json<ClearCacheRequest>>,
) -> ExplorerResult<Json<serde_json::Value>> {
    let Json(request) = request.unwrap_or_default();
    let session = state.session(id)?;
    let cleared = session
        .lock()
        .await
        .clear_cache(request.pattern.as_deref())
        .await;
    Ok(Json(json!({ "cleared": cleared })))
}

pub async fn list_indexes(State(state): State<AppState>) -> ExplorerResult<Json<Vec<IndexInfo>>> {
    Ok(Json(state.executor.list_indexes().await?))
}

/// Creating an index invalidates every session's cached results.
#[instrument(skip(state))]
pub async fn create_index(
    State(state): State<AppState>,
    Json(request): Json<CreateIndexRequest>,
) -> ExplorerResult<StatusCode> {
    state
        .executor
        .create_index(&request.label, &request.property)
        .await?;

    let sessions: Vec<_> = state
        .sessions
        .iter()
        .map(|entry| Arc::clone(&entry.value().handle))
        .collect();
    for session in sessions {
        session.lock().await.clear_cache(None).await;
    }
    Ok(StatusCode::CREATED)
}

pub async fn render(
    State(state): State<AppState>,
    Json(request): Json<RenderRequest>,
) -> ExplorerResult<Json<RenderResponse>> {
    request.lod.validate()?;

    let RenderRequest {
        mut graph,
        frame,
        lod,
        seed,
    } = request;

    if graph.nodes.iter().any(|n| n.position().is_none()) {
        let mut rng = StdRng::seed_from_u64(seed);
        graph.nodes = generate_node_coordinates(&graph.nodes, frame.width, frame.height, &mut rng);
    }

    let mut surface = RecordingSurface::new();
    let culling = state.config.culling_config();
    let stats = render_frame(&mut surface, &graph, &frame, &culling, &lod);
    Ok(Json(RenderResponse {
        stats,
        commands: surface.into_commands(),
    }))
}
