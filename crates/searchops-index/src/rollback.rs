//! Guarded rollback: the inverse alias move.

use std::sync::Arc;

use searchops_core::{Error, IndexConfig, Result};
use searchops_engine::{AliasState, SearchEngine};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::alias::AliasManager;

/// Before/after alias snapshots of a rollback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackReport {
    pub current_index: String,
    pub rollback_to_index: String,
    pub alias_before: AliasState,
    pub alias_after: AliasState,
}

/// Moves the alias pair back to a previous generation, but only when the
/// live alias state matches what the operator believes is current. The guard
/// prevents rolling back on a stale mental model of "current".
pub struct RollbackService {
    alias: AliasManager,
}

impl RollbackService {
    pub fn new(engine: Arc<dyn SearchEngine>, index: IndexConfig) -> Self {
        Self {
            alias: AliasManager::new(engine, index),
        }
    }

    pub async fn rollback(
        &self,
        current_index: &str,
        rollback_to_index: &str,
    ) -> Result<RollbackReport> {
        let alias_before = self.alias.current_state().await?;
        if !alias_before.is_exactly(current_index) {
            return Err(Error::Conflict(format!(
                "refusing rollback: aliases do not point only at {} (read={:?}, write={:?})",
                current_index, alias_before.read_targets, alias_before.write_targets
            )));
        }

        self.alias.switch_to_index(rollback_to_index).await?;
        let alias_after = self.alias.current_state().await?;
        info!(
            "rolled back aliases from {} to {}",
            current_index, rollback_to_index
        );

        Ok(RollbackReport {
            current_index: current_index.to_string(),
            rollback_to_index: rollback_to_index.to_string(),
            alias_before,
            alias_after,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use searchops_engine::{AliasAction, MemoryEngine};

    fn service(engine: Arc<MemoryEngine>) -> RollbackService {
        RollbackService::new(engine, IndexConfig::default())
    }

    #[tokio::test]
    async fn test_rollback_moves_aliases_back() {
        let engine = Arc::new(MemoryEngine::new());
        engine.seed("docs_v1", vec![]);
        engine.seed("docs_v2", vec![]);
        AliasManager::new(engine.clone(), IndexConfig::default())
            .switch_to_index("docs_v2")
            .await
            .unwrap();

        let report = service(engine)
            .rollback("docs_v2", "docs_v1")
            .await
            .unwrap();
        assert!(report.alias_before.is_exactly("docs_v2"));
        assert!(report.alias_after.is_exactly("docs_v1"));
    }

    #[tokio::test]
    async fn test_refuses_when_write_alias_is_split() {
        let engine = Arc::new(MemoryEngine::new());
        engine.seed("docs_v1", vec![]);
        engine.seed("docs_v2", vec![]);
        engine.seed("docs_v3", vec![]);
        AliasManager::new(engine.clone(), IndexConfig::default())
            .switch_to_index("docs_v2")
            .await
            .unwrap();
        // A second write target appears behind the operator's back.
        engine
            .update_aliases(&[AliasAction::Add {
                alias: "docs_write".to_string(),
                index: "docs_v3".to_string(),
                is_write_index: false,
            }])
            .await
            .unwrap();

        let result = service(engine.clone()).rollback("docs_v2", "docs_v1").await;
        assert!(matches!(result, Err(Error::Conflict(_))));

        // Nothing moved.
        let state = engine.alias_state("docs_read", "docs_write").await.unwrap();
        assert_eq!(state.read_targets, vec!["docs_v2"]);
        assert_eq!(state.write_targets, vec!["docs_v2", "docs_v3"]);
    }

    #[tokio::test]
    async fn test_refuses_when_current_does_not_match() {
        let engine = Arc::new(MemoryEngine::new());
        engine.seed("docs_v1", vec![]);
        engine.seed("docs_v2", vec![]);
        AliasManager::new(engine.clone(), IndexConfig::default())
            .switch_to_index("docs_v2")
            .await
            .unwrap();

        let result = service(engine).rollback("docs_v1", "docs_v2").await;
        assert!(matches!(result, Err(Error::Conflict(_))));
    }
}
