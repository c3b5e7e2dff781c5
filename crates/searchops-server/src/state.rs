//! Shared application state.

use std::sync::Arc;

use searchops_core::AppConfig;
use searchops_engine::SearchEngine;
use searchops_eval::{
    EvaluationRunner, PerformanceBenchmarker, PerformanceComparator, ReportComparator, ReportWriter,
};
use searchops_index::{AliasManager, BlueGreenOrchestrator, BulkIndexer, RollbackService};

use crate::slowlog::Slowlog;

/// Configuration plus the engine port, shared by all route handlers.
/// Component services are cheap wrappers over both and are built per use.
pub struct AppState {
    pub config: AppConfig,
    pub engine: Arc<dyn SearchEngine>,
    pub slowlog: Slowlog,
}

impl AppState {
    pub fn new(config: AppConfig, engine: Arc<dyn SearchEngine>) -> Self {
        let slowlog = Slowlog::new(config.slowlog.clone());
        Self {
            config,
            engine,
            slowlog,
        }
    }

    pub fn alias_manager(&self) -> AliasManager {
        AliasManager::new(self.engine.clone(), self.config.index.clone())
    }

    pub fn bulk_indexer(&self) -> BulkIndexer {
        BulkIndexer::new(self.engine.clone(), &self.config.bulk)
    }

    pub fn orchestrator(&self) -> BlueGreenOrchestrator {
        BlueGreenOrchestrator::new(
            self.engine.clone(),
            self.config.index.clone(),
            self.config.validation.clone(),
            self.config.reports.clone(),
        )
    }

    pub fn rollback_service(&self) -> RollbackService {
        RollbackService::new(self.engine.clone(), self.config.index.clone())
    }

    pub fn evaluation_runner(&self) -> EvaluationRunner {
        EvaluationRunner::new(
            self.engine.clone(),
            self.config.index.read_alias.clone(),
            self.config.datasets.clone(),
        )
    }

    pub fn report_writer(&self) -> ReportWriter {
        ReportWriter::new(self.config.reports.clone())
    }

    pub fn report_comparator(&self) -> ReportComparator {
        ReportComparator::new(self.config.reports.clone())
    }

    pub fn benchmarker(&self) -> PerformanceBenchmarker {
        PerformanceBenchmarker::new(
            self.engine.clone(),
            self.config.index.read_alias.clone(),
            self.config.datasets.clone(),
            self.config.reports.clone(),
        )
    }

    pub fn performance_comparator(&self) -> PerformanceComparator {
        PerformanceComparator::new(self.config.reports.clone())
    }
}
