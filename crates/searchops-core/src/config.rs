//! Configuration: engine endpoint, index naming, validation and report defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Index naming and the creation template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Physical index name prefix; generation `n` lives at `{prefix}{n}`.
    pub index_prefix: String,
    /// Alias queried by the public search surface.
    pub read_alias: String,
    /// Alias targeted by bulk writes.
    pub write_alias: String,
    /// Settings + mappings applied when a generation index is created.
    pub template: serde_json::Value,
}

impl IndexConfig {
    /// Physical index name for a generation, e.g. `docs_v3`.
    pub fn index_name(&self, version: u32) -> String {
        format!("{}{}", self.index_prefix, version)
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_prefix: "docs_v".to_string(),
            read_alias: "docs_read".to_string(),
            write_alias: "docs_write".to_string(),
            template: default_template(),
        }
    }
}

/// Default settings + mappings for a document index.
pub fn default_template() -> serde_json::Value {
    serde_json::json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 0,
            "refresh_interval": "1s"
        },
        "mappings": {
            "properties": {
                "id": { "type": "keyword" },
                "title": {
                    "type": "text",
                    "fields": { "keyword": { "type": "keyword", "ignore_above": 256 } }
                },
                "titleAutocomplete": { "type": "search_as_you_type" },
                "summary": { "type": "text" },
                "body": { "type": "text" },
                "tags": { "type": "keyword" },
                "category": { "type": "keyword" },
                "author": { "type": "keyword" },
                "publishedAt": { "type": "date" },
                "popularityScore": { "type": "rank_feature" }
            }
        }
    })
}

/// Defaults for the reindex validator; request options override these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationDefaults {
    pub enable_count: bool,
    pub enable_sample_queries: bool,
    pub enable_hash: bool,
    pub sample_queries: Vec<String>,
    pub sample_top_k: usize,
    pub min_jaccard: f64,
    pub hash_max_docs: usize,
    pub hash_page_size: usize,
}

impl Default for ValidationDefaults {
    fn default() -> Self {
        Self {
            enable_count: true,
            enable_sample_queries: false,
            enable_hash: false,
            sample_queries: Vec::new(),
            sample_top_k: 10,
            min_jaccard: 0.6,
            hash_max_docs: 1000,
            hash_page_size: 200,
        }
    }
}

/// Bulk indexer defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkDefaults {
    pub chunk_size: usize,
    pub max_retries: u32,
}

impl Default for BulkDefaults {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            max_retries: 2,
        }
    }
}

/// Performance benchmark defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkDefaults {
    pub dataset_id: String,
    pub top_k: usize,
    pub iterations: usize,
    pub warmups: usize,
}

impl Default for BenchmarkDefaults {
    fn default() -> Self {
        Self {
            dataset_id: "baseline".to_string(),
            top_k: 10,
            iterations: 10,
            warmups: 2,
        }
    }
}

/// Slow-query logging for the public search surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlowlogConfig {
    pub enabled: bool,
    /// Engine-reported latencies at or above this are logged.
    pub threshold_ms: u64,
    pub path: PathBuf,
}

impl Default for SlowlogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_ms: 1000,
            path: PathBuf::from("logs/slow_queries.log"),
        }
    }
}

/// Filesystem layout for persisted reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPaths {
    /// Root directory; everything below is relative to it.
    pub base: PathBuf,
}

impl ReportPaths {
    pub fn new(base: impl AsRef<Path>) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
        }
    }

    /// `reports/{report_id}` for an evaluation run.
    pub fn evaluation_dir(&self, report_id: &str) -> PathBuf {
        self.base.join(report_id)
    }

    /// `reports/comparisons` for evaluation diffs.
    pub fn comparisons_dir(&self) -> PathBuf {
        self.base.join("comparisons")
    }

    /// `reports/performance/{run_id}` for a benchmark run.
    pub fn performance_dir(&self, run_id: &str) -> PathBuf {
        self.base.join("performance").join(run_id)
    }

    /// `reports/performance/comparisons` for benchmark diffs.
    pub fn performance_comparisons_dir(&self) -> PathBuf {
        self.base.join("performance").join("comparisons")
    }

    /// `reports/reindex/{stamp}_{target}` for a retention manifest.
    pub fn reindex_dir(&self, stamp: &str, target: &str) -> PathBuf {
        self.base.join("reindex").join(format!("{}_{}", stamp, target))
    }
}

impl Default for ReportPaths {
    fn default() -> Self {
        Self::new("reports")
    }
}

/// Filesystem layout for evaluation datasets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetPaths {
    pub root: PathBuf,
}

impl DatasetPaths {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// `docs/eval/querysets/{dataset_id}_queries.json`
    pub fn queryset_path(&self, dataset_id: &str) -> PathBuf {
        self.root
            .join("querysets")
            .join(format!("{}_queries.json", dataset_id))
    }

    /// `docs/eval/judgements/{dataset_id}_judgements.json`
    pub fn judgements_path(&self, dataset_id: &str) -> PathBuf {
        self.root
            .join("judgements")
            .join(format!("{}_judgements.json", dataset_id))
    }
}

impl Default for DatasetPaths {
    fn default() -> Self {
        Self::new("docs/eval")
    }
}

/// Top-level searchops configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server port.
    pub port: u16,
    /// Base URL of the search engine REST endpoint.
    pub engine_url: String,
    pub index: IndexConfig,
    pub validation: ValidationDefaults,
    pub bulk: BulkDefaults,
    pub benchmark: BenchmarkDefaults,
    pub slowlog: SlowlogConfig,
    pub reports: ReportPaths,
    pub datasets: DatasetPaths,
}

impl AppConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env() -> Self {
        let port = std::env::var("SEARCHOPS_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);
        let engine_url = std::env::var("SEARCHOPS_ENGINE_URL")
            .unwrap_or_else(|_| "http://localhost:9200".to_string());
        let reports = std::env::var("SEARCHOPS_REPORTS_DIR")
            .map(ReportPaths::new)
            .unwrap_or_default();
        let datasets = std::env::var("SEARCHOPS_DATASET_DIR")
            .map(DatasetPaths::new)
            .unwrap_or_default();

        Self {
            port,
            engine_url,
            index: IndexConfig::default(),
            validation: ValidationDefaults::default(),
            bulk: BulkDefaults::default(),
            benchmark: BenchmarkDefaults::default(),
            slowlog: SlowlogConfig::default(),
            reports,
            datasets,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            engine_url: "http://localhost:9200".to_string(),
            index: IndexConfig::default(),
            validation: ValidationDefaults::default(),
            bulk: BulkDefaults::default(),
            benchmark: BenchmarkDefaults::default(),
            slowlog: SlowlogConfig::default(),
            reports: ReportPaths::default(),
            datasets: DatasetPaths::default(),
        }
    }
}
