//! Pre-switch reindex validation: count, top-K overlap, content hash.

use std::collections::HashSet;
use std::sync::Arc;

use searchops_core::{Error, Result, ValidationDefaults};
use searchops_engine::SearchEngine;
use searchops_query::{compose_search, SearchRequest};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

/// Per-request validation overrides; `None` falls back to the configured
/// default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationOptions {
    pub enable_count_validation: Option<bool>,
    pub enable_sample_query_validation: Option<bool>,
    pub enable_hash_validation: Option<bool>,
    pub sample_queries: Option<Vec<String>>,
    pub sample_top_k: Option<usize>,
    pub min_jaccard: Option<f64>,
    pub hash_max_docs: Option<usize>,
    pub hash_page_size: Option<usize>,
}

/// Options with defaults applied and bounds checked.
#[derive(Debug, Clone)]
pub struct ResolvedValidation {
    pub enable_count: bool,
    pub enable_sample_queries: bool,
    pub enable_hash: bool,
    pub sample_queries: Vec<String>,
    pub sample_top_k: usize,
    pub min_jaccard: f64,
    pub hash_max_docs: usize,
    pub hash_page_size: usize,
}

impl ValidationOptions {
    pub fn resolve(&self, defaults: &ValidationDefaults) -> Result<ResolvedValidation> {
        let resolved = ResolvedValidation {
            enable_count: self.enable_count_validation.unwrap_or(defaults.enable_count),
            enable_sample_queries: self
                .enable_sample_query_validation
                .unwrap_or(defaults.enable_sample_queries),
            enable_hash: self.enable_hash_validation.unwrap_or(defaults.enable_hash),
            sample_queries: self
                .sample_queries
                .clone()
                .unwrap_or_else(|| defaults.sample_queries.clone()),
            sample_top_k: self.sample_top_k.unwrap_or(defaults.sample_top_k),
            min_jaccard: self.min_jaccard.unwrap_or(defaults.min_jaccard),
            hash_max_docs: self.hash_max_docs.unwrap_or(defaults.hash_max_docs),
            hash_page_size: self.hash_page_size.unwrap_or(defaults.hash_page_size),
        };

        if !(0.0..=1.0).contains(&resolved.min_jaccard) {
            return Err(Error::BadRequest(format!(
                "minJaccard must lie in [0, 1], got {}",
                resolved.min_jaccard
            )));
        }
        if resolved.enable_sample_queries && resolved.sample_top_k == 0 {
            return Err(Error::BadRequest(
                "sampleTopK must be at least 1".to_string(),
            ));
        }
        if resolved.enable_hash && (resolved.hash_max_docs == 0 || resolved.hash_page_size == 0) {
            return Err(Error::BadRequest(
                "hashMaxDocs and hashPageSize must be at least 1".to_string(),
            ));
        }
        Ok(resolved)
    }
}

/// Source/target document count comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountCheck {
    pub source_count: u64,
    pub target_count: u64,
    pub passed: bool,
}

/// Top-K id overlap for one sample query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleQueryDiff {
    pub query: String,
    pub source_top_ids: Vec<Uuid>,
    pub target_top_ids: Vec<Uuid>,
    pub jaccard: f64,
    pub missing_in_target: Vec<Uuid>,
    pub missing_in_source: Vec<Uuid>,
    pub passed: bool,
}

/// Top-K overlap check across all sample queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleQueryCheck {
    pub min_jaccard: f64,
    pub diffs: Vec<SampleQueryDiff>,
    pub passed: bool,
}

/// Content digest comparison over ascending-id scans.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashCheck {
    pub source_digest: String,
    pub target_digest: String,
    pub source_docs: usize,
    pub target_docs: usize,
    pub passed: bool,
}

/// Combined validation outcome. `passed` is the AND of all enabled checks;
/// with no checks enabled it passes vacuously. `reasons` carry each failing
/// check's description verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<CountCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_queries: Option<SampleQueryCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<HashCheck>,
    pub passed: bool,
    pub reasons: Vec<String>,
}

/// Jaccard similarity of two id lists, with the id sets missing from each
/// side. An empty union counts as perfect similarity.
pub fn jaccard_overlap(source: &[Uuid], target: &[Uuid]) -> (f64, Vec<Uuid>, Vec<Uuid>) {
    let source_set: HashSet<Uuid> = source.iter().copied().collect();
    let target_set: HashSet<Uuid> = target.iter().copied().collect();
    let union = source_set.union(&target_set).count();
    if union == 0 {
        return (1.0, Vec::new(), Vec::new());
    }
    let intersection = source_set.intersection(&target_set).count();
    let missing_in_target: Vec<Uuid> = source
        .iter()
        .filter(|id| !target_set.contains(id))
        .copied()
        .collect();
    let missing_in_source: Vec<Uuid> = target
        .iter()
        .filter(|id| !source_set.contains(id))
        .copied()
        .collect();
    (
        intersection as f64 / union as f64,
        missing_in_target,
        missing_in_source,
    )
}

/// Runs the enabled checks against a source/target index pair.
pub struct ReindexValidator {
    engine: Arc<dyn SearchEngine>,
    defaults: ValidationDefaults,
}

impl ReindexValidator {
    pub fn new(engine: Arc<dyn SearchEngine>, defaults: ValidationDefaults) -> Self {
        Self { engine, defaults }
    }

    pub async fn validate(
        &self,
        source: &str,
        target: &str,
        options: &ValidationOptions,
    ) -> Result<ValidationReport> {
        let resolved = options.resolve(&self.defaults)?;
        let mut reasons = Vec::new();

        let count = if resolved.enable_count {
            let check = self.count_check(source, target).await?;
            if !check.passed {
                reasons.push(format!(
                    "count mismatch: {} has {} documents, {} has {}",
                    source, check.source_count, target, check.target_count
                ));
            }
            Some(check)
        } else {
            None
        };

        let sample_queries = if resolved.enable_sample_queries {
            let check = self.sample_query_check(source, target, &resolved).await?;
            for diff in check.diffs.iter().filter(|d| !d.passed) {
                reasons.push(format!(
                    "sample query '{}': jaccard {:.4} below {:.4}; missing in target: {:?}; missing in source: {:?}",
                    diff.query,
                    diff.jaccard,
                    check.min_jaccard,
                    diff.missing_in_target,
                    diff.missing_in_source
                ));
            }
            Some(check)
        } else {
            None
        };

        let content_hash = if resolved.enable_hash {
            let check = self.hash_check(source, target, &resolved).await?;
            if !check.passed {
                if check.source_docs != check.target_docs {
                    reasons.push(format!(
                        "content hash scan mismatch: scanned {} documents in {}, {} in {}",
                        check.source_docs, source, check.target_docs, target
                    ));
                } else {
                    reasons.push(format!(
                        "content hash mismatch over {} documents: {} != {}",
                        check.source_docs, check.source_digest, check.target_digest
                    ));
                }
            }
            Some(check)
        } else {
            None
        };

        let passed = count.as_ref().map_or(true, |c| c.passed)
            && sample_queries.as_ref().map_or(true, |c| c.passed)
            && content_hash.as_ref().map_or(true, |c| c.passed);

        info!(
            "reindex validation {} -> {}: passed={} ({} reasons)",
            source,
            target,
            passed,
            reasons.len()
        );
        Ok(ValidationReport {
            count,
            sample_queries,
            content_hash,
            passed,
            reasons,
        })
    }

    async fn count_check(&self, source: &str, target: &str) -> Result<CountCheck> {
        let source_count = self.engine.count(source).await?;
        let target_count = self.engine.count(target).await?;
        Ok(CountCheck {
            source_count,
            target_count,
            passed: source_count == target_count,
        })
    }

    async fn sample_query_check(
        &self,
        source: &str,
        target: &str,
        resolved: &ResolvedValidation,
    ) -> Result<SampleQueryCheck> {
        let mut diffs = Vec::with_capacity(resolved.sample_queries.len());
        for query in &resolved.sample_queries {
            let mut request = SearchRequest::new(query.clone());
            request.size = resolved.sample_top_k;
            let body = compose_search(&request);

            // Both sides are queried as concrete indices, bypassing aliases.
            let source_top_ids = self.engine.search(source, &body).await?.hit_ids();
            let target_top_ids = self.engine.search(target, &body).await?.hit_ids();

            let (jaccard, missing_in_target, missing_in_source) =
                jaccard_overlap(&source_top_ids, &target_top_ids);
            let passed = jaccard >= resolved.min_jaccard;
            debug!(
                "sample query '{}' on {} vs {}: jaccard {:.4}",
                query, source, target, jaccard
            );
            diffs.push(SampleQueryDiff {
                query: query.clone(),
                source_top_ids,
                target_top_ids,
                jaccard,
                missing_in_target,
                missing_in_source,
                passed,
            });
        }
        let passed = diffs.iter().all(|d| d.passed);
        Ok(SampleQueryCheck {
            min_jaccard: resolved.min_jaccard,
            diffs,
            passed,
        })
    }

    async fn hash_check(
        &self,
        source: &str,
        target: &str,
        resolved: &ResolvedValidation,
    ) -> Result<HashCheck> {
        let (source_digest, source_docs) = self
            .digest_index(source, resolved.hash_max_docs, resolved.hash_page_size)
            .await?;
        let (target_digest, target_docs) = self
            .digest_index(target, resolved.hash_max_docs, resolved.hash_page_size)
            .await?;
        let passed = source_digest == target_digest && source_docs == target_docs;
        Ok(HashCheck {
            source_digest,
            target_digest,
            source_docs,
            target_docs,
            passed,
        })
    }

    /// SHA-256 over document fingerprints in ascending-id scan order,
    /// bounded by `max_docs` and paged by `page_size`.
    async fn digest_index(
        &self,
        index: &str,
        max_docs: usize,
        page_size: usize,
    ) -> Result<(String, usize)> {
        let mut hasher = Sha256::new();
        let mut scanned = 0usize;
        let mut from = 0usize;

        while scanned < max_docs {
            let size = page_size.min(max_docs - scanned);
            let page = self.engine.scan(index, from, size).await?;
            if page.is_empty() {
                break;
            }
            for doc in &page {
                hasher.update(doc.fingerprint().as_bytes());
                hasher.update(b"\n");
            }
            scanned += page.len();
            from += page.len();
            if page.len() < size {
                break;
            }
        }
        Ok((hex::encode(hasher.finalize()), scanned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use searchops_core::Document;
    use searchops_engine::MemoryEngine;

    fn doc(title: &str) -> Document {
        Document::new(
            Uuid::new_v4(),
            title,
            None,
            format!("body about {}", title),
            vec![],
            "cat",
            "author",
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            1.0,
        )
        .unwrap()
    }

    fn validator(engine: Arc<MemoryEngine>) -> ReindexValidator {
        ReindexValidator::new(engine, ValidationDefaults::default())
    }

    fn count_only() -> ValidationOptions {
        ValidationOptions {
            enable_count_validation: Some(true),
            enable_sample_query_validation: Some(false),
            enable_hash_validation: Some(false),
            ..ValidationOptions::default()
        }
    }

    #[tokio::test]
    async fn test_count_mismatch_fails_with_reason() {
        let engine = Arc::new(MemoryEngine::new());
        engine.seed("docs_v1", vec![]);
        engine.seed("docs_v2", vec![]);
        engine.set_count_override("docs_v1", 10);
        engine.set_count_override("docs_v2", 8);

        let report = validator(engine)
            .validate("docs_v1", "docs_v2", &count_only())
            .await
            .unwrap();
        assert!(!report.passed);
        assert!(report.reasons[0].contains("count mismatch"));
        let count = report.count.unwrap();
        assert_eq!(count.source_count, 10);
        assert_eq!(count.target_count, 8);
    }

    #[tokio::test]
    async fn test_no_checks_enabled_passes_vacuously() {
        let engine = Arc::new(MemoryEngine::new());
        let options = ValidationOptions {
            enable_count_validation: Some(false),
            enable_sample_query_validation: Some(false),
            enable_hash_validation: Some(false),
            ..ValidationOptions::default()
        };
        let report = validator(engine)
            .validate("docs_v1", "docs_v2", &options)
            .await
            .unwrap();
        assert!(report.passed);
        assert!(report.count.is_none());
        assert!(report.reasons.is_empty());
    }

    #[test]
    fn test_jaccard_partial_overlap() {
        // {1,2,3} vs {1,4,5}: intersection 1, union 5.
        let a: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let shared = a[0];
        let b_only: Vec<Uuid> = (0..2).map(|_| Uuid::new_v4()).collect();
        let b = vec![shared, b_only[0], b_only[1]];

        let (jaccard, missing_in_target, missing_in_source) = jaccard_overlap(&a, &b);
        assert!((jaccard - 0.2).abs() < 1e-12);
        assert_eq!(missing_in_target, vec![a[1], a[2]]);
        assert_eq!(missing_in_source, b_only);
    }

    #[test]
    fn test_jaccard_empty_union_is_perfect() {
        let (jaccard, missing_in_target, missing_in_source) = jaccard_overlap(&[], &[]);
        assert_eq!(jaccard, 1.0);
        assert!(missing_in_target.is_empty());
        assert!(missing_in_source.is_empty());
    }

    #[tokio::test]
    async fn test_sample_query_check_identical_indices_pass() {
        let engine = Arc::new(MemoryEngine::new());
        let docs = vec![doc("rust async"), doc("rust macros"), doc("go channels")];
        engine.seed("docs_v1", docs.clone());
        engine.seed("docs_v2", docs);

        let options = ValidationOptions {
            enable_count_validation: Some(false),
            enable_sample_query_validation: Some(true),
            enable_hash_validation: Some(false),
            sample_queries: Some(vec!["rust".to_string()]),
            ..ValidationOptions::default()
        };
        let report = validator(engine)
            .validate("docs_v1", "docs_v2", &options)
            .await
            .unwrap();
        assert!(report.passed);
        let check = report.sample_queries.unwrap();
        assert_eq!(check.diffs.len(), 1);
        assert_eq!(check.diffs[0].jaccard, 1.0);
    }

    #[tokio::test]
    async fn test_sample_query_divergence_fails_every_query_must_pass() {
        let engine = Arc::new(MemoryEngine::new());
        engine.seed("docs_v1", vec![doc("rust one"), doc("rust two")]);
        engine.seed("docs_v2", vec![doc("rust other"), doc("rust else")]);

        let options = ValidationOptions {
            enable_count_validation: Some(false),
            enable_sample_query_validation: Some(true),
            enable_hash_validation: Some(false),
            sample_queries: Some(vec!["rust".to_string(), "missing".to_string()]),
            min_jaccard: Some(0.5),
            ..ValidationOptions::default()
        };
        let report = validator(engine)
            .validate("docs_v1", "docs_v2", &options)
            .await
            .unwrap();
        // "rust" diverges entirely; "missing" matches nothing on both
        // sides, which counts as perfect overlap.
        assert!(!report.passed);
        let check = report.sample_queries.unwrap();
        assert!(!check.diffs[0].passed);
        assert_eq!(check.diffs[0].jaccard, 0.0);
        assert!(check.diffs[1].passed);
        assert_eq!(check.diffs[1].jaccard, 1.0);
        assert_eq!(report.reasons.len(), 1);
        assert!(report.reasons[0].contains("sample query 'rust'"));
    }

    #[tokio::test]
    async fn test_hash_check_identical_content_passes() {
        let engine = Arc::new(MemoryEngine::new());
        let docs: Vec<Document> = (0..25).map(|i| doc(&format!("doc {}", i))).collect();
        engine.seed("docs_v1", docs.clone());
        engine.seed("docs_v2", docs);

        let options = ValidationOptions {
            enable_count_validation: Some(false),
            enable_sample_query_validation: Some(false),
            enable_hash_validation: Some(true),
            hash_max_docs: Some(100),
            hash_page_size: Some(7),
            ..ValidationOptions::default()
        };
        let report = validator(engine)
            .validate("docs_v1", "docs_v2", &options)
            .await
            .unwrap();
        assert!(report.passed);
        let check = report.content_hash.unwrap();
        assert_eq!(check.source_digest, check.target_digest);
        assert_eq!(check.source_docs, 25);
        assert_eq!(check.target_docs, 25);
    }

    #[tokio::test]
    async fn test_hash_check_detects_divergent_content() {
        let engine = Arc::new(MemoryEngine::new());
        let docs: Vec<Document> = (0..5).map(|i| doc(&format!("doc {}", i))).collect();
        let mut mutated = docs.clone();
        mutated[3].title = "tampered".to_string();
        engine.seed("docs_v1", docs);
        engine.seed("docs_v2", mutated);

        let options = ValidationOptions {
            enable_count_validation: Some(false),
            enable_sample_query_validation: Some(false),
            enable_hash_validation: Some(true),
            ..ValidationOptions::default()
        };
        let report = validator(engine)
            .validate("docs_v1", "docs_v2", &options)
            .await
            .unwrap();
        assert!(!report.passed);
        assert!(report.reasons[0].contains("content hash mismatch"));
    }

    #[tokio::test]
    async fn test_hash_max_docs_one_scans_one_per_side() {
        let engine = Arc::new(MemoryEngine::new());
        let docs: Vec<Document> = (0..5).map(|i| doc(&format!("doc {}", i))).collect();
        engine.seed("docs_v1", docs.clone());
        engine.seed("docs_v2", docs);

        let options = ValidationOptions {
            enable_count_validation: Some(false),
            enable_sample_query_validation: Some(false),
            enable_hash_validation: Some(true),
            hash_max_docs: Some(1),
            ..ValidationOptions::default()
        };
        let report = validator(engine)
            .validate("docs_v1", "docs_v2", &options)
            .await
            .unwrap();
        let check = report.content_hash.unwrap();
        assert_eq!(check.source_docs, 1);
        assert_eq!(check.target_docs, 1);
        assert!(check.passed);
    }

    #[tokio::test]
    async fn test_min_jaccard_out_of_range_is_bad_request() {
        let engine = Arc::new(MemoryEngine::new());
        let options = ValidationOptions {
            min_jaccard: Some(1.5),
            ..ValidationOptions::default()
        };
        assert!(matches!(
            validator(engine).validate("a", "b", &options).await,
            Err(Error::BadRequest(_))
        ));
    }
}
