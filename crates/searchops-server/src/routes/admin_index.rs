//! Admin index routes: create, bulk, blue/green reindex, rollback.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use searchops_core::{Document, Error};
use searchops_engine::AliasState;
use searchops_index::{BlueGreenReport, BlueGreenRequest, BulkReport, RollbackReport};
use serde::{Deserialize, Serialize};

use super::{ok, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/index/create", post(create_index))
        .route("/admin/index/bulk", post(bulk_index))
        .route("/admin/index/reindex", post(blue_green_reindex))
        .route("/admin/index/rollback", post(rollback))
        .route("/admin/index/state", get(index_state))
}

#[derive(Deserialize)]
struct CreateIndexParams {
    version: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateIndexResponse {
    index: String,
    alias_state: AliasState,
}

async fn create_index(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CreateIndexParams>,
) -> ApiResult<CreateIndexResponse> {
    if params.version == 0 {
        return Err(Error::BadRequest("version must be at least 1".to_string()).into());
    }
    let index = state.config.index.index_name(params.version);
    if state.engine.index_exists(&index).await? {
        return Err(Error::Conflict(format!("index {} already exists", index)).into());
    }
    state
        .engine
        .create_index(&index, &state.config.index.template)
        .await?;
    let alias_state = state.alias_manager().current_state().await?;
    Ok(ok(CreateIndexResponse { index, alias_state }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkRequest {
    target_alias: Option<String>,
    documents: Vec<Document>,
}

async fn bulk_index(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BulkRequest>,
) -> ApiResult<BulkReport> {
    if request.documents.is_empty() {
        return Err(Error::BadRequest("documents must be non-empty".to_string()).into());
    }
    for document in &request.documents {
        document.validate()?;
    }
    let target = request
        .target_alias
        .unwrap_or_else(|| state.config.index.write_alias.clone());
    let report = state.bulk_indexer().run(request.documents, &target).await?;
    Ok(ok(report))
}

async fn blue_green_reindex(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BlueGreenRequest>,
) -> ApiResult<BlueGreenReport> {
    let report = state.orchestrator().reindex(&request).await?;
    Ok(ok(report))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexCount {
    index: String,
    count: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexStateResponse {
    alias_state: AliasState,
    indices: Vec<IndexCount>,
}

/// Operator view: where the aliases point and how many documents each
/// bound generation holds.
async fn index_state(State(state): State<Arc<AppState>>) -> ApiResult<IndexStateResponse> {
    let alias_state = state.alias_manager().current_state().await?;

    let mut bound: Vec<String> = alias_state
        .read_targets
        .iter()
        .chain(alias_state.write_targets.iter())
        .cloned()
        .collect();
    bound.sort();
    bound.dedup();

    let mut indices = Vec::with_capacity(bound.len());
    for index in bound {
        let count = state.engine.count(&index).await?;
        indices.push(IndexCount { index, count });
    }
    Ok(ok(IndexStateResponse {
        alias_state,
        indices,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RollbackRequest {
    current_index: String,
    rollback_to_index: String,
}

async fn rollback(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RollbackRequest>,
) -> ApiResult<RollbackReport> {
    let report = state
        .rollback_service()
        .rollback(&request.current_index, &request.rollback_to_index)
        .await?;
    Ok(ok(report))
}
