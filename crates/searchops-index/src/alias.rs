//! The read/write alias pair and its single-transaction switch.

use std::sync::Arc;

use searchops_core::{Error, IndexConfig, Result};
use searchops_engine::{AliasAction, AliasState, SearchEngine};
use tracing::info;

/// Owns mutation of the `docs_read`/`docs_write` alias pair.
///
/// A switch is always one atomic alias transaction; the engine applies all
/// four actions as a single cluster-state update, so readers never observe a
/// half-moved pair.
pub struct AliasManager {
    engine: Arc<dyn SearchEngine>,
    index: IndexConfig,
}

impl AliasManager {
    pub fn new(engine: Arc<dyn SearchEngine>, index: IndexConfig) -> Self {
        Self { engine, index }
    }

    pub fn read_alias(&self) -> &str {
        &self.index.read_alias
    }

    pub fn write_alias(&self) -> &str {
        &self.index.write_alias
    }

    /// Point both aliases at the generation index for `version`.
    pub async fn bootstrap(&self, version: u32) -> Result<()> {
        self.switch_to_index(&self.index.index_name(version)).await
    }

    /// Atomically move both aliases to `target`.
    pub async fn switch_to_index(&self, target: &str) -> Result<()> {
        if !self.engine.index_exists(target).await? {
            return Err(Error::NotFound(format!(
                "cannot switch aliases to missing index {}",
                target
            )));
        }
        let actions = [
            AliasAction::Remove {
                alias: self.index.read_alias.clone(),
                index: "*".to_string(),
            },
            AliasAction::Remove {
                alias: self.index.write_alias.clone(),
                index: "*".to_string(),
            },
            AliasAction::Add {
                alias: self.index.read_alias.clone(),
                index: target.to_string(),
                is_write_index: false,
            },
            AliasAction::Add {
                alias: self.index.write_alias.clone(),
                index: target.to_string(),
                is_write_index: true,
            },
        ];
        self.engine.update_aliases(&actions).await?;
        info!(
            "aliases {}/{} now point at {}",
            self.index.read_alias, self.index.write_alias, target
        );
        Ok(())
    }

    /// Snapshot of the current alias bindings.
    pub async fn current_state(&self) -> Result<AliasState> {
        self.engine
            .alias_state(&self.index.read_alias, &self.index.write_alias)
            .await
    }
}
