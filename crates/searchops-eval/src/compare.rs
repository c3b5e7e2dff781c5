//! Diffing two evaluation reports.

use std::collections::BTreeSet;
use std::path::PathBuf;

use searchops_core::{ReportPaths, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::report::{EvaluationReport, ReportWriter};

/// One mean metric before/after.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDelta {
    pub name: String,
    pub before: f64,
    pub after: f64,
    pub delta: f64,
}

/// How a query moved between the two worst-query tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorstQueryChangeKind {
    Improved,
    Regressed,
    Unchanged,
    RemovedFromWorst,
    NewInWorst,
}

/// Per-query worst-table transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorstQueryChange {
    pub query_id: String,
    pub kind: WorstQueryChangeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before_ndcg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_ndcg: Option<f64>,
    /// nDCG movement; positive is better.
    pub delta: f64,
}

/// The full comparison of two reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub before_report_id: String,
    pub after_report_id: String,
    pub metrics_delta: Vec<MetricDelta>,
    pub worst_query_changes: Vec<WorstQueryChange>,
    pub improvements: Vec<WorstQueryChange>,
    pub regressions: Vec<WorstQueryChange>,
}

/// Loads two persisted reports and writes a markdown diff.
pub struct ReportComparator {
    reports: ReportPaths,
    writer: ReportWriter,
}

impl ReportComparator {
    pub fn new(reports: ReportPaths) -> Self {
        Self {
            writer: ReportWriter::new(reports.clone()),
            reports,
        }
    }

    /// Compare `after` against `before`, persisting
    /// `reports/comparisons/{after}_vs_{before}.md`. Returns the comparison
    /// and the file path.
    pub fn compare(
        &self,
        before_report_id: &str,
        after_report_id: &str,
        top_queries: usize,
    ) -> Result<(ComparisonReport, PathBuf)> {
        let before = self.writer.load(before_report_id)?;
        let after = self.writer.load(after_report_id)?;

        let comparison = diff_reports(&before, &after, top_queries);

        let dir = self.reports.comparisons_dir();
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}_vs_{}.md", after_report_id, before_report_id));
        std::fs::write(&path, render_comparison(&comparison))?;
        info!("wrote comparison {}", path.display());
        Ok((comparison, path))
    }
}

fn diff_reports(
    before: &EvaluationReport,
    after: &EvaluationReport,
    top_queries: usize,
) -> ComparisonReport {
    let metrics_delta = vec![
        metric_delta(
            "precisionAtK",
            before.summary.mean_precision_at_k,
            after.summary.mean_precision_at_k,
        ),
        metric_delta(
            "recallAtK",
            before.summary.mean_recall_at_k,
            after.summary.mean_recall_at_k,
        ),
        metric_delta("mrr", before.summary.mean_mrr, after.summary.mean_mrr),
        metric_delta(
            "ndcgAtK",
            before.summary.mean_ndcg_at_k,
            after.summary.mean_ndcg_at_k,
        ),
    ];

    // Union of worst-query ids, iterated in a stable order.
    let query_ids: BTreeSet<String> = before
        .worst_queries
        .iter()
        .chain(after.worst_queries.iter())
        .map(|w| w.query_id.clone())
        .collect();

    let mut worst_query_changes = Vec::with_capacity(query_ids.len());
    for query_id in query_ids {
        let before_ndcg = before
            .worst_queries
            .iter()
            .find(|w| w.query_id == query_id)
            .map(|w| w.ndcg_at_k);
        let after_ndcg = after
            .worst_queries
            .iter()
            .find(|w| w.query_id == query_id)
            .map(|w| w.ndcg_at_k);

        let (kind, delta) = match (before_ndcg, after_ndcg) {
            (Some(b), Some(a)) => {
                let delta = a - b;
                let kind = if delta > 0.0 {
                    WorstQueryChangeKind::Improved
                } else if delta < 0.0 {
                    WorstQueryChangeKind::Regressed
                } else {
                    WorstQueryChangeKind::Unchanged
                };
                (kind, delta)
            }
            (Some(b), None) => (WorstQueryChangeKind::RemovedFromWorst, 1.0 - b),
            (None, Some(a)) => (WorstQueryChangeKind::NewInWorst, -a),
            (None, None) => unreachable!("query id came from the union"),
        };
        worst_query_changes.push(WorstQueryChange {
            query_id,
            kind,
            before_ndcg,
            after_ndcg,
            delta,
        });
    }

    let mut improvements: Vec<WorstQueryChange> = worst_query_changes
        .iter()
        .filter(|c| c.delta > 0.0)
        .cloned()
        .collect();
    improvements.sort_by(|a, b| {
        b.delta
            .abs()
            .partial_cmp(&a.delta.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    improvements.truncate(top_queries);

    let mut regressions: Vec<WorstQueryChange> = worst_query_changes
        .iter()
        .filter(|c| c.delta < 0.0)
        .cloned()
        .collect();
    regressions.sort_by(|a, b| {
        b.delta
            .abs()
            .partial_cmp(&a.delta.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    regressions.truncate(top_queries);

    ComparisonReport {
        before_report_id: before.report_id.clone(),
        after_report_id: after.report_id.clone(),
        metrics_delta,
        worst_query_changes,
        improvements,
        regressions,
    }
}

fn metric_delta(name: &str, before: f64, after: f64) -> MetricDelta {
    MetricDelta {
        name: name.to_string(),
        before,
        after,
        delta: after - before,
    }
}

fn render_comparison(comparison: &ComparisonReport) -> String {
    let mut md = String::new();
    md.push_str(&format!(
        "# Evaluation comparison: {} vs {}\n\n",
        comparison.after_report_id, comparison.before_report_id
    ));

    md.push_str("## Mean metrics\n\n| Metric | Before | After | Delta |\n|---|---|---|---|\n");
    for delta in &comparison.metrics_delta {
        md.push_str(&format!(
            "| {} | {:.4} | {:.4} | {:+.4} |\n",
            delta.name, delta.before, delta.after, delta.delta
        ));
    }

    let render_changes = |md: &mut String, title: &str, changes: &[WorstQueryChange]| {
        md.push_str(&format!("\n## {}\n\n", title));
        if changes.is_empty() {
            md.push_str("(none)\n");
            return;
        }
        md.push_str("| Query | Kind | Before nDCG | After nDCG | Delta |\n|---|---|---|---|---|\n");
        for change in changes {
            let fmt = |v: Option<f64>| {
                v.map(|x| format!("{:.4}", x))
                    .unwrap_or_else(|| "-".to_string())
            };
            md.push_str(&format!(
                "| {} | {:?} | {} | {} | {:+.4} |\n",
                change.query_id,
                change.kind,
                fmt(change.before_ndcg),
                fmt(change.after_ndcg),
                change.delta
            ));
        }
    };

    render_changes(&mut md, "Improvements", &comparison.improvements);
    render_changes(&mut md, "Regressions", &comparison.regressions);
    render_changes(&mut md, "All worst-query changes", &comparison.worst_query_changes);
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::QueryMetrics;
    use crate::runner::{EvaluationRunResult, EvaluationSummary, QueryEvaluation};
    use chrono::{TimeZone, Utc};

    fn evaluation(query_id: &str, ndcg: f64) -> QueryEvaluation {
        QueryEvaluation {
            query_id: query_id.to_string(),
            intent: "i".to_string(),
            metrics: QueryMetrics {
                precision_at_k: 0.5,
                recall_at_k: 0.5,
                mrr: 0.5,
                ndcg_at_k: ndcg,
                relevant_judgements: 1,
                relevant_retrieved: 1,
            },
            hits: vec![],
            judged_hits: 1,
            relevant_hits: 1,
            total_hits: 3,
        }
    }

    fn write_report(
        writer: &ReportWriter,
        minute: u32,
        ndcg_mean: f64,
        worst: Vec<QueryEvaluation>,
    ) -> String {
        let n = worst.len();
        let result = EvaluationRunResult {
            dataset_id: "blog".to_string(),
            top_k: 5,
            started_at: Utc.with_ymd_and_hms(2025, 3, 4, 12, minute, 0).unwrap(),
            completed_at: Utc.with_ymd_and_hms(2025, 3, 4, 12, minute, 1).unwrap(),
            elapsed_ms: 1000,
            target_index: "docs_read".to_string(),
            summary: EvaluationSummary {
                top_k: 5,
                total_queries: n,
                mean_precision_at_k: 0.5,
                mean_recall_at_k: 0.5,
                mean_mrr: 0.5,
                mean_ndcg_at_k: ndcg_mean,
            },
            results: worst,
        };
        writer.write(&result, 10, None).unwrap().report_id
    }

    #[test]
    fn test_identical_reports_yield_zero_deltas() {
        let dir = tempfile::tempdir().unwrap();
        let reports = ReportPaths::new(dir.path());
        let writer = ReportWriter::new(reports.clone());
        let before = write_report(&writer, 0, 0.6, vec![evaluation("q1", 0.3)]);
        let after = write_report(&writer, 1, 0.6, vec![evaluation("q1", 0.3)]);

        let (comparison, path) = ReportComparator::new(reports)
            .compare(&before, &after, 5)
            .unwrap();
        assert!(comparison.metrics_delta.iter().all(|d| d.delta == 0.0));
        assert!(comparison.improvements.is_empty());
        assert!(comparison.regressions.is_empty());
        assert_eq!(comparison.worst_query_changes.len(), 1);
        assert_eq!(
            comparison.worst_query_changes[0].kind,
            WorstQueryChangeKind::Unchanged
        );
        assert!(path.ends_with(format!("{}_vs_{}.md", after, before)));
        assert!(path.exists());
    }

    #[test]
    fn test_classification_of_all_transitions() {
        let dir = tempfile::tempdir().unwrap();
        let reports = ReportPaths::new(dir.path());
        let writer = ReportWriter::new(reports.clone());
        let before = write_report(
            &writer,
            0,
            0.5,
            vec![
                evaluation("improved", 0.2),
                evaluation("regressed", 0.4),
                evaluation("removed", 0.3),
            ],
        );
        let after = write_report(
            &writer,
            1,
            0.7,
            vec![
                evaluation("improved", 0.5),
                evaluation("regressed", 0.1),
                evaluation("fresh", 0.25),
            ],
        );

        let (comparison, _) = ReportComparator::new(reports)
            .compare(&before, &after, 5)
            .unwrap();

        let find = |id: &str| {
            comparison
                .worst_query_changes
                .iter()
                .find(|c| c.query_id == id)
                .unwrap()
        };
        assert_eq!(find("improved").kind, WorstQueryChangeKind::Improved);
        assert!((find("improved").delta - 0.3).abs() < 1e-12);
        assert_eq!(find("regressed").kind, WorstQueryChangeKind::Regressed);
        assert_eq!(find("removed").kind, WorstQueryChangeKind::RemovedFromWorst);
        assert!((find("removed").delta - 0.7).abs() < 1e-12);
        assert_eq!(find("fresh").kind, WorstQueryChangeKind::NewInWorst);
        assert!((find("fresh").delta + 0.25).abs() < 1e-12);

        // Mean nDCG delta surfaces in the metric table.
        let ndcg = comparison
            .metrics_delta
            .iter()
            .find(|d| d.name == "ndcgAtK")
            .unwrap();
        assert!((ndcg.delta - 0.2).abs() < 1e-12);

        // Improvements ranked by |delta|: removed (0.7) then improved (0.3).
        assert_eq!(comparison.improvements[0].query_id, "removed");
        assert_eq!(comparison.improvements[1].query_id, "improved");
        // Regressions: regressed (-0.3) then fresh (-0.25).
        assert_eq!(comparison.regressions[0].query_id, "regressed");
        assert_eq!(comparison.regressions[1].query_id, "fresh");
    }

    #[test]
    fn test_missing_report_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let reports = ReportPaths::new(dir.path());
        let comparator = ReportComparator::new(reports);
        assert!(matches!(
            comparator.compare("ghost_a", "ghost_b", 3),
            Err(searchops_core::Error::NotFound(_))
        ));
    }

    #[test]
    fn test_top_queries_truncates_lists() {
        let dir = tempfile::tempdir().unwrap();
        let reports = ReportPaths::new(dir.path());
        let writer = ReportWriter::new(reports.clone());
        let before = write_report(
            &writer,
            0,
            0.5,
            vec![evaluation("a", 0.1), evaluation("b", 0.2), evaluation("c", 0.3)],
        );
        let after = write_report(
            &writer,
            1,
            0.5,
            vec![evaluation("a", 0.9), evaluation("b", 0.5), evaluation("c", 0.4)],
        );

        let (comparison, _) = ReportComparator::new(reports)
            .compare(&before, &after, 1)
            .unwrap();
        assert_eq!(comparison.improvements.len(), 1);
        assert_eq!(comparison.improvements[0].query_id, "a");
        assert_eq!(comparison.worst_query_changes.len(), 3);
    }
}
