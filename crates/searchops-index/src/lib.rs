//! searchops Index — the index lifecycle control plane.
//!
//! Bulk document writes, atomic alias management, pre-switch reindex
//! validation, the blue/green migration orchestrator, guarded rollback, and
//! retention manifests.

pub mod alias;
pub mod bulk;
pub mod orchestrate;
pub mod retention;
pub mod rollback;
pub mod validate;

pub use alias::AliasManager;
pub use bulk::{BulkFailure, BulkIndexer, BulkReport};
pub use orchestrate::{BlueGreenOrchestrator, BlueGreenReport, BlueGreenRequest};
pub use retention::RetentionRecorder;
pub use rollback::{RollbackReport, RollbackService};
pub use validate::{
    CountCheck, HashCheck, ReindexValidator, SampleQueryCheck, SampleQueryDiff, ValidationOptions,
    ValidationReport,
};
