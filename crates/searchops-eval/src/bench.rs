//! Latency benchmarking over a query set, with percentile summaries.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use searchops_core::{DatasetPaths, Error, ReportPaths, Result};
use searchops_engine::SearchEngine;
use searchops_query::{compose_search, SearchRequest};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::EvalDataset;

/// Summary statistics over a latency sample set (milliseconds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyStats {
    pub min: u64,
    pub p50: u64,
    pub p95: u64,
    pub max: u64,
    pub avg: f64,
}

impl LatencyStats {
    /// Compute stats over a non-empty sample set.
    pub fn from_samples(samples: &[u64]) -> Self {
        let mut sorted = samples.to_vec();
        sorted.sort_unstable();
        Self {
            min: sorted[0],
            p50: percentile(&sorted, 0.50),
            p95: percentile(&sorted, 0.95),
            max: sorted[sorted.len() - 1],
            avg: sorted.iter().sum::<u64>() as f64 / sorted.len() as f64,
        }
    }
}

/// Nearest-rank percentile over an ascending sample list:
/// `index = clamp(ceil(p * n) - 1, 0, n - 1)`.
pub fn percentile(sorted: &[u64], p: f64) -> u64 {
    let n = sorted.len();
    let index = ((p * n as f64).ceil() as i64 - 1).clamp(0, n as i64 - 1);
    sorted[index as usize]
}

/// One query's recorded samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryLatency {
    pub query_id: String,
    pub samples: Vec<u64>,
    pub stats: LatencyStats,
}

/// A persisted benchmark run (`metrics.json` schema).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkResult {
    pub run_id: String,
    pub dataset_id: String,
    pub top_k: usize,
    pub iterations: usize,
    pub warmups: usize,
    pub target_index: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub total_samples: usize,
    /// Recorded samples per wall-clock second.
    pub qps: f64,
    pub overall: LatencyStats,
    pub per_query: Vec<QueryLatency>,
}

/// Runs warmup+iterate latency collection against the engine.
pub struct PerformanceBenchmarker {
    engine: Arc<dyn SearchEngine>,
    read_alias: String,
    datasets: DatasetPaths,
    reports: ReportPaths,
}

impl PerformanceBenchmarker {
    pub fn new(
        engine: Arc<dyn SearchEngine>,
        read_alias: impl Into<String>,
        datasets: DatasetPaths,
        reports: ReportPaths,
    ) -> Self {
        Self {
            engine,
            read_alias: read_alias.into(),
            datasets,
            reports,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        &self,
        dataset_id: &str,
        top_k: usize,
        iterations: usize,
        warmups: usize,
        target_index: Option<&str>,
        report_id_prefix: &str,
    ) -> Result<BenchmarkResult> {
        if iterations == 0 {
            return Err(Error::BadRequest(
                "iterations must be at least 1".to_string(),
            ));
        }
        if top_k == 0 {
            return Err(Error::BadRequest("topK must be at least 1".to_string()));
        }
        let dataset = EvalDataset::load(&self.datasets, dataset_id)?;
        let target = target_index.unwrap_or(&self.read_alias).to_string();
        info!(
            "benchmarking {} queries against {} ({} warmups, {} iterations)",
            dataset.queries.len(),
            target,
            warmups,
            iterations
        );

        let started_at = Utc::now();
        let clock = Instant::now();
        let mut per_query = Vec::with_capacity(dataset.queries.len());
        let mut pooled: Vec<u64> = Vec::with_capacity(dataset.queries.len() * iterations);

        for query in &dataset.queries {
            let mut request = SearchRequest::new(query.query_text.clone());
            request.size = top_k;
            let body = compose_search(&request);

            for _ in 0..warmups {
                self.engine.search(&target, &body).await?;
            }

            let mut samples = Vec::with_capacity(iterations);
            for _ in 0..iterations {
                let result = self.engine.search(&target, &body).await?;
                samples.push(result.took_ms);
            }
            pooled.extend_from_slice(&samples);
            per_query.push(QueryLatency {
                query_id: query.query_id.clone(),
                stats: LatencyStats::from_samples(&samples),
                samples,
            });
        }

        let completed_at = Utc::now();
        let elapsed_ms = clock.elapsed().as_millis() as u64;
        let total_samples = pooled.len();
        let elapsed_secs = elapsed_ms as f64 / 1000.0;
        let qps = if elapsed_secs > 0.0 {
            total_samples as f64 / elapsed_secs
        } else {
            total_samples as f64
        };

        let stamp = started_at.format("%Y%m%d_%H%M%S").to_string();
        let run_id = format!("{}_{}_{}", report_id_prefix, dataset_id, stamp);

        let result = BenchmarkResult {
            run_id: run_id.clone(),
            dataset_id: dataset_id.to_string(),
            top_k,
            iterations,
            warmups,
            target_index: target,
            started_at,
            completed_at,
            elapsed_ms,
            total_samples,
            qps,
            overall: LatencyStats::from_samples(&pooled),
            per_query,
        };

        let dir = self.reports.performance_dir(&run_id);
        std::fs::create_dir_all(&dir)?;
        std::fs::write(
            dir.join("metrics.json"),
            serde_json::to_string_pretty(&result)?,
        )?;
        std::fs::write(dir.join("summary.md"), render_summary(&result))?;
        info!("wrote benchmark report {}", dir.display());
        Ok(result)
    }

    /// Load a previously persisted run.
    pub fn load(&self, run_id: &str) -> Result<BenchmarkResult> {
        let path = self.reports.performance_dir(run_id).join("metrics.json");
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(format!("benchmark run {} not found", run_id))
            } else {
                Error::Io(e)
            }
        })?;
        Ok(serde_json::from_str(&raw)?)
    }
}

fn render_summary(result: &BenchmarkResult) -> String {
    let mut md = String::new();
    md.push_str(&format!("# Benchmark {}\n\n", result.run_id));
    md.push_str(&format!(
        "- Dataset: {}\n- Target: {}\n- Iterations: {} (+{} warmups)\n- Samples: {}\n- QPS: {:.2}\n\n",
        result.dataset_id,
        result.target_index,
        result.iterations,
        result.warmups,
        result.total_samples,
        result.qps
    ));
    md.push_str("## Overall latency (ms)\n\n| Min | P50 | P95 | Max | Avg |\n|---|---|---|---|---|\n");
    md.push_str(&format!(
        "| {} | {} | {} | {} | {:.2} |\n\n",
        result.overall.min, result.overall.p50, result.overall.p95, result.overall.max, result.overall.avg
    ));
    md.push_str("## Per query (ms)\n\n| Query | Min | P50 | P95 | Max | Avg |\n|---|---|---|---|---|---|\n");
    for query in &result.per_query {
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} | {:.2} |\n",
            query.query_id,
            query.stats.min,
            query.stats.p50,
            query.stats.p95,
            query.stats.max,
            query.stats.avg
        ));
    }
    md
}

/// One latency statistic before/after.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyDelta {
    pub name: String,
    pub before: f64,
    pub after: f64,
    pub delta: f64,
}

/// Per-query P95 movement; positive delta is a slowdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryP95Delta {
    pub query_id: String,
    pub before_p95: u64,
    pub after_p95: u64,
    pub delta: i64,
}

/// A benchmark-vs-baseline comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceComparison {
    pub before_run_id: String,
    pub after_run_id: String,
    pub latency_delta: Vec<LatencyDelta>,
    pub qps_delta: LatencyDelta,
    pub regressions: Vec<QueryP95Delta>,
    pub improvements: Vec<QueryP95Delta>,
}

/// Diffs two persisted benchmark runs.
pub struct PerformanceComparator {
    reports: ReportPaths,
}

impl PerformanceComparator {
    pub fn new(reports: ReportPaths) -> Self {
        Self { reports }
    }

    pub fn compare(
        &self,
        before_run_id: &str,
        after_run_id: &str,
    ) -> Result<(PerformanceComparison, PathBuf)> {
        let load = |run_id: &str| -> Result<BenchmarkResult> {
            let path = self.reports.performance_dir(run_id).join("metrics.json");
            let raw = std::fs::read_to_string(&path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::NotFound(format!("benchmark run {} not found", run_id))
                } else {
                    Error::Io(e)
                }
            })?;
            Ok(serde_json::from_str(&raw)?)
        };
        let before = load(before_run_id)?;
        let after = load(after_run_id)?;

        let comparison = diff_benchmarks(&before, &after);

        let dir = self.reports.performance_comparisons_dir();
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}_vs_{}.md", after_run_id, before_run_id));
        std::fs::write(&path, render_comparison(&comparison))?;
        info!("wrote performance comparison {}", path.display());
        Ok((comparison, path))
    }
}

fn diff_benchmarks(before: &BenchmarkResult, after: &BenchmarkResult) -> PerformanceComparison {
    let stat = |name: &str, b: f64, a: f64| LatencyDelta {
        name: name.to_string(),
        before: b,
        after: a,
        delta: a - b,
    };
    let latency_delta = vec![
        stat("min", before.overall.min as f64, after.overall.min as f64),
        stat("p50", before.overall.p50 as f64, after.overall.p50 as f64),
        stat("p95", before.overall.p95 as f64, after.overall.p95 as f64),
        stat("max", before.overall.max as f64, after.overall.max as f64),
        stat("avg", before.overall.avg, after.overall.avg),
    ];
    let qps_delta = stat("qps", before.qps, after.qps);

    let mut deltas: Vec<QueryP95Delta> = after
        .per_query
        .iter()
        .filter_map(|after_query| {
            before
                .per_query
                .iter()
                .find(|b| b.query_id == after_query.query_id)
                .map(|before_query| QueryP95Delta {
                    query_id: after_query.query_id.clone(),
                    before_p95: before_query.stats.p95,
                    after_p95: after_query.stats.p95,
                    delta: after_query.stats.p95 as i64 - before_query.stats.p95 as i64,
                })
        })
        .collect();
    deltas.sort_by_key(|d| std::cmp::Reverse(d.delta.abs()));

    PerformanceComparison {
        before_run_id: before.run_id.clone(),
        after_run_id: after.run_id.clone(),
        latency_delta,
        qps_delta,
        regressions: deltas.iter().filter(|d| d.delta > 0).cloned().collect(),
        improvements: deltas.iter().filter(|d| d.delta < 0).cloned().collect(),
    }
}

fn render_comparison(comparison: &PerformanceComparison) -> String {
    let mut md = String::new();
    md.push_str(&format!(
        "# Performance comparison: {} vs {}\n\n",
        comparison.after_run_id, comparison.before_run_id
    ));
    md.push_str("## Overall latency (ms)\n\n| Stat | Before | After | Delta |\n|---|---|---|---|\n");
    for delta in &comparison.latency_delta {
        md.push_str(&format!(
            "| {} | {:.2} | {:.2} | {:+.2} |\n",
            delta.name, delta.before, delta.after, delta.delta
        ));
    }
    md.push_str(&format!(
        "\n## Throughput\n\n| | Before | After | Delta |\n|---|---|---|---|\n| QPS | {:.2} | {:.2} | {:+.2} |\n",
        comparison.qps_delta.before, comparison.qps_delta.after, comparison.qps_delta.delta
    ));

    let render = |md: &mut String, title: &str, rows: &[QueryP95Delta]| {
        md.push_str(&format!("\n## {}\n\n", title));
        if rows.is_empty() {
            md.push_str("(none)\n");
            return;
        }
        md.push_str("| Query | Before P95 | After P95 | Delta |\n|---|---|---|---|\n");
        for row in rows {
            md.push_str(&format!(
                "| {} | {} | {} | {:+} |\n",
                row.query_id, row.before_p95, row.after_p95, row.delta
            ));
        }
    };
    render(&mut md, "Regressions (by |ΔP95|)", &comparison.regressions);
    render(&mut md, "Improvements (by |ΔP95|)", &comparison.improvements);
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use searchops_core::Document;
    use searchops_engine::MemoryEngine;
    use uuid::Uuid;

    #[test]
    fn test_percentile_nearest_rank() {
        let sorted = [10, 20, 30, 40, 50, 60, 70, 80, 90, 100];
        assert_eq!(percentile(&sorted, 0.50), 50);
        assert_eq!(percentile(&sorted, 0.95), 100);
        assert_eq!(percentile(&sorted, 0.0), 10);
        assert_eq!(percentile(&sorted, 1.0), 100);
    }

    #[test]
    fn test_percentile_single_sample() {
        assert_eq!(percentile(&[42], 0.5), 42);
        assert_eq!(percentile(&[42], 0.95), 42);
    }

    #[test]
    fn test_latency_stats() {
        let stats = LatencyStats::from_samples(&[30, 10, 20]);
        assert_eq!(stats.min, 10);
        assert_eq!(stats.max, 30);
        assert_eq!(stats.p50, 20);
        assert!((stats.avg - 20.0).abs() < 1e-12);
    }

    fn seed_engine() -> Arc<MemoryEngine> {
        let engine = Arc::new(MemoryEngine::new());
        engine.seed(
            "docs_v1",
            vec![Document::new(
                Uuid::new_v4(),
                "rust async",
                None,
                "body",
                vec![],
                "dev",
                "author",
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                1.0,
            )
            .unwrap()],
        );
        engine
    }

    fn write_queryset(dir: &std::path::Path) -> DatasetPaths {
        let paths = DatasetPaths::new(dir);
        std::fs::create_dir_all(dir.join("querysets")).unwrap();
        std::fs::create_dir_all(dir.join("judgements")).unwrap();
        std::fs::write(
            paths.queryset_path("perf"),
            r#"[{"queryId": "q1", "queryText": "rust", "intent": "i"},
                {"queryId": "q2", "queryText": "async", "intent": "i"}]"#,
        )
        .unwrap();
        std::fs::write(paths.judgements_path("perf"), "[]").unwrap();
        paths
    }

    #[tokio::test]
    async fn test_run_collects_samples_and_persists() {
        let engine = seed_engine();
        let data_dir = tempfile::tempdir().unwrap();
        let report_dir = tempfile::tempdir().unwrap();
        let reports = ReportPaths::new(report_dir.path());
        let benchmarker = PerformanceBenchmarker::new(
            engine,
            "docs_v1",
            write_queryset(data_dir.path()),
            reports.clone(),
        );

        let result = benchmarker
            .run("perf", 5, 3, 1, None, "bench")
            .await
            .unwrap();
        assert_eq!(result.total_samples, 6); // 2 queries x 3 iterations
        assert_eq!(result.per_query.len(), 2);
        assert_eq!(result.per_query[0].samples.len(), 3);
        assert!(result.qps > 0.0);
        assert!(result.run_id.starts_with("bench_perf_"));

        let dir = reports.performance_dir(&result.run_id);
        assert!(dir.join("metrics.json").exists());
        let summary = std::fs::read_to_string(dir.join("summary.md")).unwrap();
        assert!(summary.contains("Overall latency"));

        let loaded = benchmarker.load(&result.run_id).unwrap();
        assert_eq!(loaded.total_samples, 6);
    }

    #[tokio::test]
    async fn test_zero_iterations_rejected() {
        let engine = seed_engine();
        let data_dir = tempfile::tempdir().unwrap();
        let report_dir = tempfile::tempdir().unwrap();
        let benchmarker = PerformanceBenchmarker::new(
            engine,
            "docs_v1",
            write_queryset(data_dir.path()),
            ReportPaths::new(report_dir.path()),
        );
        assert!(matches!(
            benchmarker.run("perf", 5, 0, 0, None, "bench").await,
            Err(Error::BadRequest(_))
        ));
    }

    fn bench_result(run_id: &str, p95s: &[(&str, u64)], qps: f64) -> BenchmarkResult {
        let per_query: Vec<QueryLatency> = p95s
            .iter()
            .map(|(id, p95)| QueryLatency {
                query_id: id.to_string(),
                samples: vec![*p95],
                stats: LatencyStats {
                    min: *p95,
                    p50: *p95,
                    p95: *p95,
                    max: *p95,
                    avg: *p95 as f64,
                },
            })
            .collect();
        let pooled: Vec<u64> = p95s.iter().map(|(_, p)| *p).collect();
        BenchmarkResult {
            run_id: run_id.to_string(),
            dataset_id: "perf".to_string(),
            top_k: 5,
            iterations: 1,
            warmups: 0,
            target_index: "docs_read".to_string(),
            started_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            completed_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 1).unwrap(),
            elapsed_ms: 1000,
            total_samples: pooled.len(),
            qps,
            overall: LatencyStats::from_samples(&pooled),
            per_query,
        }
    }

    fn persist(reports: &ReportPaths, result: &BenchmarkResult) {
        let dir = reports.performance_dir(&result.run_id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("metrics.json"),
            serde_json::to_string_pretty(result).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn test_comparator_orders_by_p95_delta() {
        let dir = tempfile::tempdir().unwrap();
        let reports = ReportPaths::new(dir.path());
        persist(
            &reports,
            &bench_result("before", &[("q1", 100), ("q2", 50), ("q3", 80)], 20.0),
        );
        persist(
            &reports,
            &bench_result("after", &[("q1", 160), ("q2", 45), ("q3", 95)], 18.0),
        );

        let (comparison, path) = PerformanceComparator::new(reports)
            .compare("before", "after")
            .unwrap();
        // q1 +60, q3 +15 regress; q2 -5 improves.
        assert_eq!(comparison.regressions.len(), 2);
        assert_eq!(comparison.regressions[0].query_id, "q1");
        assert_eq!(comparison.regressions[1].query_id, "q3");
        assert_eq!(comparison.improvements.len(), 1);
        assert_eq!(comparison.improvements[0].query_id, "q2");
        assert!((comparison.qps_delta.delta + 2.0).abs() < 1e-12);
        assert!(path.exists());
    }

    #[test]
    fn test_comparator_missing_run_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let comparator = PerformanceComparator::new(ReportPaths::new(dir.path()));
        assert!(matches!(
            comparator.compare("a", "b"),
            Err(Error::NotFound(_))
        ));
    }
}
