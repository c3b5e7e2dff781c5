//! Evaluation runner: execute a query set and score the hits.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use searchops_core::{DatasetPaths, Error, Result};
use searchops_engine::SearchEngine;
use searchops_query::{compose_search, MultiMatchType, RankingTuning, SearchRequest};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::{EvalDataset, EvalQuery};
use crate::metrics::{compute_metrics, EvaluatedHit, QueryMetrics};

/// Mean metrics across a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationSummary {
    pub top_k: usize,
    pub total_queries: usize,
    pub mean_precision_at_k: f64,
    pub mean_recall_at_k: f64,
    pub mean_mrr: f64,
    pub mean_ndcg_at_k: f64,
}

/// One query's evaluated hits and metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryEvaluation {
    pub query_id: String,
    pub intent: String,
    pub metrics: QueryMetrics,
    pub hits: Vec<EvaluatedHit>,
    /// Hits that carried a judgement.
    pub judged_hits: usize,
    /// Hits with a positive grade (same as `metrics.relevant_retrieved`).
    pub relevant_hits: usize,
    /// Engine-reported total match count.
    pub total_hits: u64,
}

/// A full evaluation run, ready for the report writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRunResult {
    pub dataset_id: String,
    pub top_k: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub target_index: String,
    pub summary: EvaluationSummary,
    pub results: Vec<QueryEvaluation>,
}

/// Executes a dataset's queries and pairs hits to judgements.
pub struct EvaluationRunner {
    engine: Arc<dyn SearchEngine>,
    read_alias: String,
    datasets: DatasetPaths,
}

impl EvaluationRunner {
    pub fn new(
        engine: Arc<dyn SearchEngine>,
        read_alias: impl Into<String>,
        datasets: DatasetPaths,
    ) -> Self {
        Self {
            engine,
            read_alias: read_alias.into(),
            datasets,
        }
    }

    pub async fn run(
        &self,
        dataset_id: &str,
        top_k: usize,
        target_index: Option<&str>,
        multi_match_type: Option<MultiMatchType>,
        ranking_tuning: Option<RankingTuning>,
    ) -> Result<EvaluationRunResult> {
        if top_k == 0 {
            return Err(Error::BadRequest("topK must be at least 1".to_string()));
        }
        let dataset = EvalDataset::load(&self.datasets, dataset_id)?;
        let target = target_index.unwrap_or(&self.read_alias).to_string();
        info!(
            "evaluating dataset {} against {} (topK={}, {} queries)",
            dataset_id,
            target,
            top_k,
            dataset.queries.len()
        );

        let started_at = Utc::now();
        let clock = Instant::now();

        let mut results = Vec::with_capacity(dataset.queries.len());
        for query in &dataset.queries {
            let evaluation = self
                .evaluate_query(&dataset, query, top_k, &target, multi_match_type, &ranking_tuning)
                .await?;
            results.push(evaluation);
        }

        let completed_at = Utc::now();
        let summary = summarize(&results, top_k);
        info!(
            "evaluation of {} done: meanNdcg={:.4}, meanRecall={:.4}",
            dataset_id, summary.mean_ndcg_at_k, summary.mean_recall_at_k
        );

        Ok(EvaluationRunResult {
            dataset_id: dataset_id.to_string(),
            top_k,
            started_at,
            completed_at,
            elapsed_ms: clock.elapsed().as_millis() as u64,
            target_index: target,
            summary,
            results,
        })
    }

    async fn evaluate_query(
        &self,
        dataset: &EvalDataset,
        query: &EvalQuery,
        top_k: usize,
        target: &str,
        multi_match_type: Option<MultiMatchType>,
        ranking_tuning: &Option<RankingTuning>,
    ) -> Result<QueryEvaluation> {
        let request = to_search_request(query, top_k, multi_match_type, ranking_tuning);
        let body = compose_search(&request);
        let result = self.engine.search(target, &body).await.map_err(|e| {
            Error::Engine(format!(
                "evaluation query {} against {}: {}",
                query.query_id, target, e
            ))
        })?;

        let grades = dataset.grades_for(&query.query_id);
        let hits: Vec<EvaluatedHit> = result
            .hits
            .iter()
            .take(top_k)
            .enumerate()
            .map(|(i, hit)| {
                let grade = grades.get(&hit.document.id).copied();
                EvaluatedHit {
                    rank: i + 1,
                    document: hit.document.clone(),
                    score: hit.score,
                    grade,
                    judged: grade.is_some(),
                }
            })
            .collect();

        let judgement_grades: Vec<u8> = grades.values().copied().collect();
        let metrics = compute_metrics(&hits, &judgement_grades, top_k);
        debug!(
            "query {}: ndcg={:.4}, recall={:.4}, {} hits",
            query.query_id, metrics.ndcg_at_k, metrics.recall_at_k, result.total
        );

        let judged_hits = hits.iter().filter(|h| h.judged).count();
        let relevant_hits = metrics.relevant_retrieved;
        Ok(QueryEvaluation {
            query_id: query.query_id.clone(),
            intent: query.intent.clone(),
            metrics,
            hits,
            judged_hits,
            relevant_hits,
            total_hits: result.total,
        })
    }
}

/// Translate an evaluation query into a search request at `size = top_k`.
fn to_search_request(
    query: &EvalQuery,
    top_k: usize,
    multi_match_type: Option<MultiMatchType>,
    ranking_tuning: &Option<RankingTuning>,
) -> SearchRequest {
    let mut request = SearchRequest::new(query.query_text.clone());
    request.size = top_k;
    if let Some(mm) = multi_match_type {
        request.multi_match_type = mm;
    }
    if let Some(tuning) = ranking_tuning {
        request.ranking_tuning = tuning.clone();
    }
    if let Some(filters) = &query.filters {
        request.category = filters.category.clone();
        request.tags = filters.tags.clone();
        request.author = filters.author.clone();
        request.published_from = filters.published_at_from;
        request.published_to = filters.published_at_to;
    }
    request
}

/// Arithmetic means; an empty run reports zeros and `top_k = 0`.
fn summarize(results: &[QueryEvaluation], top_k: usize) -> EvaluationSummary {
    if results.is_empty() {
        return EvaluationSummary::default();
    }
    let n = results.len() as f64;
    EvaluationSummary {
        top_k,
        total_queries: results.len(),
        mean_precision_at_k: results.iter().map(|r| r.metrics.precision_at_k).sum::<f64>() / n,
        mean_recall_at_k: results.iter().map(|r| r.metrics.recall_at_k).sum::<f64>() / n,
        mean_mrr: results.iter().map(|r| r.metrics.mrr).sum::<f64>() / n,
        mean_ndcg_at_k: results.iter().map(|r| r.metrics.ndcg_at_k).sum::<f64>() / n,
    }
}
