//! Query sets and judgement sets, validated on load.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use searchops_core::{DatasetPaths, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Optional facet filters attached to an evaluation query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at_from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at_to: Option<DateTime<Utc>>,
}

/// One query of a query set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalQuery {
    pub query_id: String,
    pub query_text: String,
    pub intent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<QueryFilters>,
}

/// A human relevance grade for a (query, document) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Judgement {
    pub query_id: String,
    pub doc_id: Uuid,
    /// 0 = irrelevant .. 3 = highly relevant.
    pub grade: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A paired query set and judgement set.
#[derive(Debug, Clone)]
pub struct EvalDataset {
    pub dataset_id: String,
    pub queries: Vec<EvalQuery>,
    pub judgements: Vec<Judgement>,
}

impl EvalDataset {
    /// Load `{dataset_id}_queries.json` and `{dataset_id}_judgements.json`
    /// from the dataset root and validate the pairing.
    pub fn load(paths: &DatasetPaths, dataset_id: &str) -> Result<Self> {
        let queries: Vec<EvalQuery> = read_json(&paths.queryset_path(dataset_id))?;
        let judgements: Vec<Judgement> = read_json(&paths.judgements_path(dataset_id))?;
        let mut dataset = Self {
            dataset_id: dataset_id.to_string(),
            queries,
            judgements,
        };
        dataset.validate()?;
        Ok(dataset)
    }

    fn validate(&mut self) -> Result<()> {
        if self.queries.is_empty() {
            return Err(Error::BadRequest(format!(
                "dataset {} has an empty query set",
                self.dataset_id
            )));
        }

        let mut ids = HashSet::new();
        for query in &self.queries {
            if query.query_id.trim().is_empty() {
                return Err(Error::BadRequest(format!(
                    "dataset {} has a query with an empty id",
                    self.dataset_id
                )));
            }
            if query.query_text.trim().is_empty() {
                return Err(Error::BadRequest(format!(
                    "query {} has empty query text",
                    query.query_id
                )));
            }
            if !ids.insert(query.query_id.clone()) {
                return Err(Error::BadRequest(format!(
                    "duplicate query id {} in dataset {}",
                    query.query_id, self.dataset_id
                )));
            }
        }

        let mut seen_pairs = HashSet::new();
        let mut deduped = Vec::with_capacity(self.judgements.len());
        for judgement in self.judgements.drain(..) {
            if judgement.grade > 3 {
                return Err(Error::BadRequest(format!(
                    "judgement for ({}, {}) has grade {}, expected 0..=3",
                    judgement.query_id, judgement.doc_id, judgement.grade
                )));
            }
            if !ids.contains(&judgement.query_id) {
                return Err(Error::BadRequest(format!(
                    "judgement references unknown query id {}",
                    judgement.query_id
                )));
            }
            if !seen_pairs.insert((judgement.query_id.clone(), judgement.doc_id)) {
                warn!(
                    "dropping duplicate judgement for ({}, {})",
                    judgement.query_id, judgement.doc_id
                );
                continue;
            }
            deduped.push(judgement);
        }
        self.judgements = deduped;
        Ok(())
    }

    /// Judgements of one query, as a doc-id → grade map.
    pub fn grades_for(&self, query_id: &str) -> HashMap<Uuid, u8> {
        self.judgements
            .iter()
            .filter(|j| j.query_id == query_id)
            .map(|j| (j.doc_id, j.grade))
            .collect()
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(format!("dataset file {} not found", path.display()))
        } else {
            Error::Io(e)
        }
    })?;
    serde_json::from_str(&raw)
        .map_err(|e| Error::BadRequest(format!("cannot parse {}: {}", path.display(), e)))
}
