//! Admin performance route: latency benchmark with optional baseline diff.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use searchops_eval::{BenchmarkResult, PerformanceComparison};
use serde::{Deserialize, Serialize};

use super::{ok, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/admin/performance/benchmark", post(run_benchmark))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct BenchmarkRequest {
    dataset_id: Option<String>,
    top_k: Option<usize>,
    iterations: Option<usize>,
    warmups: Option<usize>,
    target_index: Option<String>,
    report_id_prefix: Option<String>,
    baseline_report_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BenchmarkResponse {
    result: BenchmarkResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    comparison: Option<PerformanceComparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comparison_path: Option<String>,
}

async fn run_benchmark(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BenchmarkRequest>,
) -> ApiResult<BenchmarkResponse> {
    let defaults = &state.config.benchmark;
    let dataset_id = request
        .dataset_id
        .unwrap_or_else(|| defaults.dataset_id.clone());
    let prefix = request
        .report_id_prefix
        .unwrap_or_else(|| "bench".to_string());

    let result = state
        .benchmarker()
        .run(
            &dataset_id,
            request.top_k.unwrap_or(defaults.top_k),
            request.iterations.unwrap_or(defaults.iterations),
            request.warmups.unwrap_or(defaults.warmups),
            request.target_index.as_deref(),
            &prefix,
        )
        .await?;

    let (comparison, comparison_path) = match &request.baseline_report_id {
        Some(baseline) => {
            let (comparison, path) = state
                .performance_comparator()
                .compare(baseline, &result.run_id)?;
            (Some(comparison), Some(path.display().to_string()))
        }
        None => (None, None),
    };

    Ok(ok(BenchmarkResponse {
        result,
        comparison,
        comparison_path,
    }))
}
