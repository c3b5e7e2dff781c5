//! The blue/green migration orchestrator.
//!
//! One migration walks create → reindex → validate → switch → record. A
//! failure at any step aborts the run with the alias pair untouched; there
//! are no retries at this level.

use std::sync::Arc;

use chrono::Utc;
use searchops_core::{Error, IndexConfig, ReportPaths, Result, ValidationDefaults};
use searchops_engine::{AliasState, SearchEngine};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::alias::AliasManager;
use crate::retention::RetentionRecorder;
use crate::validate::{ReindexValidator, ValidationOptions, ValidationReport};

/// A blue/green migration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlueGreenRequest {
    pub source_version: u32,
    pub target_version: u32,
    #[serde(default)]
    pub validation: ValidationOptions,
    #[serde(default = "default_true")]
    pub wait_for_completion: bool,
    #[serde(default = "default_true")]
    pub refresh_after: bool,
}

fn default_true() -> bool {
    true
}

/// Everything a completed migration reports back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlueGreenReport {
    pub source_index: String,
    pub target_index: String,
    pub source_count: u64,
    pub target_count: u64,
    pub reindex_took_ms: u64,
    pub failures: Vec<String>,
    pub alias_before: AliasState,
    pub alias_after: AliasState,
    pub validation: ValidationReport,
    pub retention_manifest_path: String,
}

/// Drives one migration end to end.
pub struct BlueGreenOrchestrator {
    engine: Arc<dyn SearchEngine>,
    index: IndexConfig,
    alias: AliasManager,
    validator: ReindexValidator,
    retention: RetentionRecorder,
}

impl BlueGreenOrchestrator {
    pub fn new(
        engine: Arc<dyn SearchEngine>,
        index: IndexConfig,
        validation_defaults: ValidationDefaults,
        reports: ReportPaths,
    ) -> Self {
        let alias = AliasManager::new(engine.clone(), index.clone());
        let validator = ReindexValidator::new(engine.clone(), validation_defaults);
        let retention = RetentionRecorder::new(reports);
        Self {
            engine,
            index,
            alias,
            validator,
            retention,
        }
    }

    pub async fn reindex(&self, request: &BlueGreenRequest) -> Result<BlueGreenReport> {
        if request.source_version == 0 || request.target_version == 0 {
            return Err(Error::BadRequest(
                "index versions start at 1".to_string(),
            ));
        }
        if request.source_version == request.target_version {
            return Err(Error::BadRequest(format!(
                "source and target versions must differ, both are {}",
                request.source_version
            )));
        }

        let source_index = self.index.index_name(request.source_version);
        let target_index = self.index.index_name(request.target_version);
        info!("blue/green migration {} -> {}", source_index, target_index);

        let alias_before = self.alias.current_state().await?;

        if !self.engine.index_exists(&source_index).await? {
            return Err(Error::NotFound(format!(
                "source index {} does not exist",
                source_index
            )));
        }
        if self.engine.index_exists(&target_index).await? {
            return Err(Error::Conflict(format!(
                "target index {} already exists; delete it or pick a new version",
                target_index
            )));
        }
        self.engine
            .create_index(&target_index, &self.index.template)
            .await?;

        let reindex = self
            .engine
            .reindex(
                &source_index,
                &target_index,
                request.wait_for_completion,
                request.refresh_after,
            )
            .await?;
        if !reindex.failures.is_empty() {
            warn!(
                "reindex {} -> {} reported {} document failures",
                source_index,
                target_index,
                reindex.failures.len()
            );
            return Err(Error::Engine(format!(
                "reindex {} -> {} reported {} document failures: {}",
                source_index,
                target_index,
                reindex.failures.len(),
                reindex.failures.join("; ")
            )));
        }
        info!(
            "reindex {} -> {} complete in {}ms",
            source_index, target_index, reindex.took_ms
        );

        let validation = self
            .validator
            .validate(&source_index, &target_index, &request.validation)
            .await?;
        if !validation.passed {
            // The alias pair has not been touched; the operator can fix the
            // target and re-run the same request.
            return Err(Error::ValidationFailed(validation.reasons.join("; ")));
        }

        self.alias.switch_to_index(&target_index).await?;

        let (source_count, target_count) = match &validation.count {
            Some(count) => (count.source_count, count.target_count),
            None => (
                self.engine.count(&source_index).await?,
                self.engine.count(&target_index).await?,
            ),
        };

        let manifest_path = self.retention.record(
            Utc::now(),
            &source_index,
            &target_index,
            &alias_before,
            source_count,
            target_count,
        )?;

        let alias_after = self.alias.current_state().await?;
        info!(
            "migration {} -> {} switched; manifest at {}",
            source_index,
            target_index,
            manifest_path.display()
        );

        Ok(BlueGreenReport {
            source_index,
            target_index,
            source_count,
            target_count,
            reindex_took_ms: reindex.took_ms,
            failures: reindex.failures,
            alias_before,
            alias_after,
            validation,
            retention_manifest_path: manifest_path.display().to_string(),
        })
    }
}
