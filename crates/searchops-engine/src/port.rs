//! The abstract engine interface.

use async_trait::async_trait;
use searchops_core::{Document, Result};

use crate::types::{
    AliasAction, AliasState, BulkItemStatus, BulkOp, ReindexStatus, SearchResult,
};

/// Every engine operation the control plane requires.
///
/// `target` parameters accept either a concrete index name or an alias.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Create an index from a settings+mappings template.
    /// Fails with `Conflict` if the index already exists.
    async fn create_index(&self, name: &str, template: &serde_json::Value) -> Result<()>;

    async fn index_exists(&self, name: &str) -> Result<bool>;

    async fn delete_index(&self, name: &str) -> Result<()>;

    async fn count(&self, index: &str) -> Result<u64>;

    /// Page through an index in ascending document-id order.
    ///
    /// The ordering is a hard contract: content hashing is only defined over
    /// a deterministic scan. An engine that cannot order by id must not be
    /// used as the hash backend.
    async fn scan(&self, index: &str, from: usize, size: usize) -> Result<Vec<Document>>;

    /// Execute an engine-native query body against `target`.
    async fn search(&self, target: &str, body: &serde_json::Value) -> Result<SearchResult>;

    /// Submit one batch of index operations. The result preserves per-item
    /// submission order. A transport-level failure is an `Err`; per-item
    /// failures are reported in the statuses.
    async fn bulk(&self, target: &str, ops: &[BulkOp]) -> Result<Vec<BulkItemStatus>>;

    /// Server-side copy of `source` into `target`.
    async fn reindex(
        &self,
        source: &str,
        target: &str,
        wait_for_completion: bool,
        refresh: bool,
    ) -> Result<ReindexStatus>;

    /// Apply alias actions as one atomic transaction.
    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<()>;

    /// Resolve the current targets of the read and write aliases.
    async fn alias_state(&self, read_alias: &str, write_alias: &str) -> Result<AliasState>;

    async fn refresh(&self, index: &str) -> Result<()>;
}
