//! Public search surface: search, suggest, health.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use searchops_engine::{AliasState, SearchHit};
use searchops_query::{compose_search, compose_suggest, SearchRequest, SortMode, SuggestRequest};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ok, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/search", get(search))
        .route("/api/suggest", get(suggest))
        .route("/api/health", get(health))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchParams {
    q: String,
    category: Option<String>,
    author: Option<String>,
    /// Comma-separated tag list.
    tags: Option<String>,
    sort: Option<SortMode>,
    page: Option<usize>,
    size: Option<usize>,
    published_from: Option<DateTime<Utc>>,
    published_to: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    total: u64,
    took_ms: u64,
    page: usize,
    size: usize,
    hits: Vec<SearchHit>,
}

async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> ApiResult<SearchResponse> {
    let mut request = SearchRequest::new(params.q);
    request.category = params.category;
    request.author = params.author;
    request.tags = params
        .tags
        .map(|t| {
            t.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    if let Some(sort) = params.sort {
        request.sort = sort;
    }
    request.page = params.page.unwrap_or(0);
    request.size = params.size.unwrap_or(10);
    request.published_from = params.published_from;
    request.published_to = params.published_to;
    request.validate()?;

    let body = compose_search(&request);
    let result = state
        .engine
        .search(&state.config.index.read_alias, &body)
        .await?;
    state.slowlog.record(&request.query, result.took_ms, result.total);

    Ok(ok(SearchResponse {
        total: result.total,
        took_ms: result.took_ms,
        page: request.page,
        size: request.size,
        hits: result.hits,
    }))
}

#[derive(Deserialize)]
struct SuggestParams {
    q: String,
    category: Option<String>,
    size: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Suggestion {
    id: Uuid,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<f64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SuggestResponse {
    suggestions: Vec<Suggestion>,
}

async fn suggest(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SuggestParams>,
) -> ApiResult<SuggestResponse> {
    let mut request = SuggestRequest::new(params.q);
    request.category = params.category;
    if let Some(size) = params.size {
        request.size = size;
    }
    request.validate()?;

    let body = compose_suggest(&request);
    let result = state
        .engine
        .search(&state.config.index.read_alias, &body)
        .await?;

    Ok(ok(SuggestResponse {
        suggestions: result
            .hits
            .into_iter()
            .map(|hit| Suggestion {
                id: hit.document.id,
                title: hit.document.title,
                score: hit.score,
            })
            .collect(),
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    alias_state: AliasState,
}

async fn health(State(state): State<Arc<AppState>>) -> ApiResult<HealthResponse> {
    let alias_state = state.alias_manager().current_state().await?;
    let status = if alias_state.read_targets.len() == 1 {
        "up"
    } else {
        "degraded"
    };
    Ok(ok(HealthResponse {
        status,
        alias_state,
    }))
}
