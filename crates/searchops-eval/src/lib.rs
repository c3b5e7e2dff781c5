//! searchops Eval — scoring ranked retrieval against human judgements.
//!
//! Datasets pair a query set with graded judgements. The runner executes the
//! queries, the calculator turns ranked hits into IR metrics, the writer
//! persists comparable reports, and the comparators diff two runs. The
//! benchmarker measures engine-reported latency the same way.

pub mod bench;
pub mod compare;
pub mod dataset;
pub mod metrics;
pub mod report;
pub mod runner;

pub use bench::{
    BenchmarkResult, LatencyStats, PerformanceBenchmarker, PerformanceComparator,
    PerformanceComparison,
};
pub use compare::{ComparisonReport, MetricDelta, ReportComparator, WorstQueryChange};
pub use dataset::{EvalDataset, EvalQuery, Judgement, QueryFilters};
pub use metrics::{compute_metrics, EvaluatedHit, QueryMetrics};
pub use report::{EvaluationReport, ReportWriter, WorstQueryEntry};
pub use runner::{EvaluationRunResult, EvaluationRunner, EvaluationSummary, QueryEvaluation};
