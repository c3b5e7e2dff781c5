//! Evaluation report persistence: `metrics.json` + `summary.md` per run.

use std::cmp::Ordering;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use searchops_core::{Error, ReportPaths, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::runner::{EvaluationRunResult, EvaluationSummary, QueryEvaluation};

/// One row of the worst-query table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorstQueryEntry {
    pub query_id: String,
    pub intent: String,
    pub precision_at_k: f64,
    pub recall_at_k: f64,
    pub mrr: f64,
    pub ndcg_at_k: f64,
    pub judged_hits: usize,
    pub relevant_hits: usize,
    pub total_hits: u64,
}

impl WorstQueryEntry {
    fn from_evaluation(evaluation: &QueryEvaluation) -> Self {
        Self {
            query_id: evaluation.query_id.clone(),
            intent: evaluation.intent.clone(),
            precision_at_k: evaluation.metrics.precision_at_k,
            recall_at_k: evaluation.metrics.recall_at_k,
            mrr: evaluation.metrics.mrr,
            ndcg_at_k: evaluation.metrics.ndcg_at_k,
            judged_hits: evaluation.judged_hits,
            relevant_hits: evaluation.relevant_hits,
            total_hits: evaluation.total_hits,
        }
    }
}

/// The persisted `metrics.json` schema. Field names are part of the report
/// contract consumed by the comparator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationReport {
    pub report_id: String,
    pub dataset_id: String,
    pub top_k: usize,
    pub total_queries: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub summary: EvaluationSummary,
    pub worst_queries: Vec<WorstQueryEntry>,
}

/// Writes and reads evaluation reports under the configured base directory.
pub struct ReportWriter {
    reports: ReportPaths,
}

impl ReportWriter {
    pub fn new(reports: ReportPaths) -> Self {
        Self { reports }
    }

    /// Persist a run as `reports/{report_id}/{metrics.json, summary.md}`.
    pub fn write(
        &self,
        result: &EvaluationRunResult,
        worst_queries_count: usize,
        report_id_prefix: Option<&str>,
    ) -> Result<EvaluationReport> {
        if worst_queries_count == 0 {
            return Err(Error::BadRequest(
                "worstQueries must be at least 1".to_string(),
            ));
        }

        let stamp = result.started_at.format("%Y%m%d_%H%M%S").to_string();
        let report_id = match report_id_prefix {
            Some(prefix) if !prefix.is_empty() => format!("{}_{}", prefix, stamp),
            _ => stamp,
        };

        let report = EvaluationReport {
            report_id: report_id.clone(),
            dataset_id: result.dataset_id.clone(),
            top_k: result.top_k,
            total_queries: result.results.len(),
            started_at: result.started_at,
            completed_at: result.completed_at,
            elapsed_ms: result.elapsed_ms,
            summary: result.summary.clone(),
            worst_queries: worst_queries(&result.results, worst_queries_count),
        };

        let dir = self.reports.evaluation_dir(&report_id);
        std::fs::create_dir_all(&dir)?;
        std::fs::write(
            dir.join("metrics.json"),
            serde_json::to_string_pretty(&report)?,
        )?;
        std::fs::write(dir.join("summary.md"), render_summary(&report))?;
        info!("wrote evaluation report {}", dir.display());
        Ok(report)
    }

    /// Load a previously written report; `NotFound` when absent.
    pub fn load(&self, report_id: &str) -> Result<EvaluationReport> {
        let path = self.reports.evaluation_dir(report_id).join("metrics.json");
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(format!("report {} not found", report_id))
            } else {
                Error::Io(e)
            }
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn report_dir(&self, report_id: &str) -> PathBuf {
        self.reports.evaluation_dir(report_id)
    }
}

/// Worst queries: ascending nDCG, ties broken by ascending Recall@K.
fn worst_queries(results: &[QueryEvaluation], count: usize) -> Vec<WorstQueryEntry> {
    let mut sorted: Vec<&QueryEvaluation> = results.iter().collect();
    sorted.sort_by(|a, b| {
        a.metrics
            .ndcg_at_k
            .partial_cmp(&b.metrics.ndcg_at_k)
            .unwrap_or(Ordering::Equal)
            .then(
                a.metrics
                    .recall_at_k
                    .partial_cmp(&b.metrics.recall_at_k)
                    .unwrap_or(Ordering::Equal),
            )
    });
    sorted
        .into_iter()
        .take(count)
        .map(WorstQueryEntry::from_evaluation)
        .collect()
}

fn render_summary(report: &EvaluationReport) -> String {
    let mut md = String::new();
    md.push_str(&format!("# Evaluation report {}\n\n", report.report_id));
    md.push_str(&format!(
        "- Dataset: {}\n- Top K: {}\n- Queries: {}\n- Started: {}\n- Elapsed: {} ms\n\n",
        report.dataset_id,
        report.top_k,
        report.total_queries,
        report.started_at.to_rfc3339(),
        report.elapsed_ms
    ));

    md.push_str("## Summary\n\n| Metric | Mean |\n|---|---|\n");
    md.push_str(&format!(
        "| Precision@K | {:.4} |\n",
        report.summary.mean_precision_at_k
    ));
    md.push_str(&format!(
        "| Recall@K | {:.4} |\n",
        report.summary.mean_recall_at_k
    ));
    md.push_str(&format!("| MRR | {:.4} |\n", report.summary.mean_mrr));
    md.push_str(&format!(
        "| nDCG@K | {:.4} |\n\n",
        report.summary.mean_ndcg_at_k
    ));

    md.push_str("## Worst Queries\n\n");
    md.push_str(
        "| Query | Intent | nDCG@K | Recall@K | Precision@K | MRR | Judged | Relevant | Total |\n",
    );
    md.push_str("|---|---|---|---|---|---|---|---|---|\n");
    for entry in &report.worst_queries {
        md.push_str(&format!(
            "| {} | {} | {:.4} | {:.4} | {:.4} | {:.4} | {} | {} | {} |\n",
            entry.query_id,
            entry.intent,
            entry.ndcg_at_k,
            entry.recall_at_k,
            entry.precision_at_k,
            entry.mrr,
            entry.judged_hits,
            entry.relevant_hits,
            entry.total_hits
        ));
    }
    md
}
