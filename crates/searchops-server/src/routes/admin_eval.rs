//! Admin evaluation routes: run, report, regression comparison.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::post;
use axum::{Json, Router};
use searchops_eval::{ComparisonReport, EvaluationReport, EvaluationRunResult};
use searchops_query::{MultiMatchType, RankingTuning};
use serde::{Deserialize, Serialize};

use super::{ok, ApiResult};
use crate::state::AppState;

const DEFAULT_TOP_K: usize = 10;
const DEFAULT_WORST_QUERIES: usize = 5;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/eval/run", post(run_evaluation))
        .route("/admin/eval/regression", post(run_regression))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EvalRunParams {
    dataset_id: String,
    top_k: Option<usize>,
    worst_queries: Option<usize>,
    generate_report: Option<bool>,
    target_index: Option<String>,
    multi_match_type: Option<MultiMatchType>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EvalRunResponse {
    run: EvaluationRunResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<EvaluationReport>,
}

async fn run_evaluation(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EvalRunParams>,
) -> ApiResult<EvalRunResponse> {
    let top_k = params.top_k.unwrap_or(DEFAULT_TOP_K);
    let run = state
        .evaluation_runner()
        .run(
            &params.dataset_id,
            top_k,
            params.target_index.as_deref(),
            params.multi_match_type,
            None,
        )
        .await?;

    let report = if params.generate_report.unwrap_or(true) {
        let worst = params.worst_queries.unwrap_or(DEFAULT_WORST_QUERIES);
        Some(state.report_writer().write(&run, worst, None)?)
    } else {
        None
    };
    Ok(ok(EvalRunResponse { run, report }))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RegressionRequest {
    dataset_id: Option<String>,
    baseline_report_id: Option<String>,
    top_k: Option<usize>,
    worst_queries: Option<usize>,
    target_index: Option<String>,
    report_id_prefix: Option<String>,
    multi_match_type: Option<MultiMatchType>,
    ranking_tuning: Option<RankingTuning>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegressionResponse {
    report: EvaluationReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    comparison: Option<ComparisonReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comparison_path: Option<String>,
}

async fn run_regression(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegressionRequest>,
) -> ApiResult<RegressionResponse> {
    let dataset_id = request
        .dataset_id
        .unwrap_or_else(|| state.config.benchmark.dataset_id.clone());
    let top_k = request.top_k.unwrap_or(DEFAULT_TOP_K);
    let worst = request.worst_queries.unwrap_or(DEFAULT_WORST_QUERIES);

    if let Some(tuning) = &request.ranking_tuning {
        tuning.validate()?;
    }
    let run = state
        .evaluation_runner()
        .run(
            &dataset_id,
            top_k,
            request.target_index.as_deref(),
            request.multi_match_type,
            request.ranking_tuning.clone(),
        )
        .await?;
    let report = state
        .report_writer()
        .write(&run, worst, request.report_id_prefix.as_deref())?;

    let (comparison, comparison_path) = match &request.baseline_report_id {
        Some(baseline) => {
            let (comparison, path) =
                state
                    .report_comparator()
                    .compare(baseline, &report.report_id, worst)?;
            (Some(comparison), Some(path.display().to_string()))
        }
        None => (None, None),
    };

    Ok(ok(RegressionResponse {
        report,
        comparison,
        comparison_path,
    }))
}
