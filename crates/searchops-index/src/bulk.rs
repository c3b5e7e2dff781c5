//! Chunked bulk indexing with bounded retry over only the failed items.

use std::sync::Arc;
use std::time::Instant;

use searchops_core::{BulkDefaults, Document, Result};
use searchops_engine::{BulkOp, SearchEngine};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

/// A document that never made it into the index, with its last failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkFailure {
    pub id: Uuid,
    pub status: u16,
    pub reason: String,
    /// Pass on which this failure was last observed (1-based).
    pub attempt: u32,
}

/// Outcome of a bulk run. `success + failed == total` always holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkReport {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub failures: Vec<BulkFailure>,
    /// Number of passes executed, including the initial one.
    pub attempts: u32,
    pub took_ms: u64,
}

/// Partial-failure-aware batch writer.
///
/// Documents are submitted in chunks; items the engine rejects are collected
/// and resubmitted on the next pass, up to `max_retries` extra passes. A
/// transport-level error fails the whole chunk into the retry set. No backoff
/// between passes; callers wanting one wrap the indexer.
pub struct BulkIndexer {
    engine: Arc<dyn SearchEngine>,
    chunk_size: usize,
    max_retries: u32,
}

impl BulkIndexer {
    pub fn new(engine: Arc<dyn SearchEngine>, defaults: &BulkDefaults) -> Self {
        Self {
            engine,
            chunk_size: defaults.chunk_size.max(1),
            max_retries: defaults.max_retries,
        }
    }

    /// Index `documents` into `target` (an alias or a concrete index).
    pub async fn run(&self, documents: Vec<Document>, target: &str) -> Result<BulkReport> {
        let started = Instant::now();
        let total = documents.len();
        let mut pending: Vec<BulkOp> = documents.into_iter().map(BulkOp::index).collect();
        let mut failures: Vec<BulkFailure> = Vec::new();
        let mut attempts = 0u32;

        while !pending.is_empty() && attempts <= self.max_retries {
            attempts += 1;
            let mut retry: Vec<BulkOp> = Vec::new();
            failures.clear();

            for chunk in pending.chunks(self.chunk_size) {
                match self.engine.bulk(target, chunk).await {
                    Ok(statuses) => {
                        for (op, status) in chunk.iter().zip(statuses.iter()) {
                            if status.is_error() {
                                failures.push(BulkFailure {
                                    id: op.id,
                                    status: status.status,
                                    reason: status
                                        .error
                                        .clone()
                                        .unwrap_or_else(|| "unknown engine error".to_string()),
                                    attempt: attempts,
                                });
                                retry.push(op.clone());
                            }
                        }
                    }
                    Err(e) => {
                        // The whole chunk becomes a retry candidate.
                        warn!("bulk chunk to {} failed in transit: {}", target, e);
                        for op in chunk {
                            failures.push(BulkFailure {
                                id: op.id,
                                status: 503,
                                reason: e.to_string(),
                                attempt: attempts,
                            });
                            retry.push(op.clone());
                        }
                    }
                }
            }

            debug!(
                "bulk pass {} to {}: {} submitted, {} failed",
                attempts,
                target,
                pending.len(),
                retry.len()
            );
            pending = retry;
        }

        let failed = pending.len();
        Ok(BulkReport {
            total,
            success: total - failed,
            failed,
            failures,
            attempts,
            took_ms: started.elapsed().as_millis() as u64,
        })
    }
}
