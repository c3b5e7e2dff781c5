//! searchops Core — configuration, error types, document model.

pub mod config;
pub mod document;
pub mod error;

pub use config::{
    AppConfig, BenchmarkDefaults, BulkDefaults, DatasetPaths, IndexConfig, ReportPaths,
    SlowlogConfig, ValidationDefaults,
};
pub use document::Document;
pub use error::{Error, Result};
