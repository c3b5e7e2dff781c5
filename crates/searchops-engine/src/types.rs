//! Wire-level types crossing the engine port.

use searchops_core::Document;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// One scored hit from a search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub document: Document,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub highlights: HashMap<String, Vec<String>>,
}

/// Result of a search call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub total: u64,
    pub took_ms: u64,
    pub hits: Vec<SearchHit>,
}

impl SearchResult {
    /// Document ids of the hits, in rank order.
    pub fn hit_ids(&self) -> Vec<Uuid> {
        self.hits.iter().map(|h| h.document.id).collect()
    }
}

/// A single bulk operation (index a document under its id).
#[derive(Debug, Clone)]
pub struct BulkOp {
    pub id: Uuid,
    pub document: Document,
}

impl BulkOp {
    pub fn index(document: Document) -> Self {
        Self {
            id: document.id,
            document,
        }
    }
}

/// Per-item outcome of a bulk call, in submission order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkItemStatus {
    pub id: Uuid,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BulkItemStatus {
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

/// One step of an alias transaction. Steps in a single
/// `update_aliases` call are applied atomically by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasAction {
    /// Remove `alias` from `index`; `index` may be the wildcard `*`.
    Remove { alias: String, index: String },
    /// Add `alias` to `index`, optionally as the write index.
    Add {
        alias: String,
        index: String,
        is_write_index: bool,
    },
}

/// Snapshot of which indices the read/write aliases resolve to.
///
/// Target lists are sorted so states compare byte-for-byte.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasState {
    pub read_targets: Vec<String>,
    pub write_targets: Vec<String>,
}

impl AliasState {
    pub fn new(mut read_targets: Vec<String>, mut write_targets: Vec<String>) -> Self {
        read_targets.sort();
        write_targets.sort();
        Self {
            read_targets,
            write_targets,
        }
    }

    /// True when both aliases resolve to exactly the one given index.
    pub fn is_exactly(&self, index: &str) -> bool {
        self.read_targets == [index.to_string()] && self.write_targets == [index.to_string()]
    }
}

/// Outcome of a server-side reindex.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReindexStatus {
    pub took_ms: u64,
    /// Per-document failure descriptions reported by the engine.
    pub failures: Vec<String>,
}
