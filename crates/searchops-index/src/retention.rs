//! Retention manifests written after each successful migration.

use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use searchops_core::{ReportPaths, Result};
use searchops_engine::AliasState;
use tracing::info;

/// Writes one manifest per migration under `reports/reindex/`.
pub struct RetentionRecorder {
    reports: ReportPaths,
}

impl RetentionRecorder {
    pub fn new(reports: ReportPaths) -> Self {
        Self { reports }
    }

    /// Record a completed switch. Returns the manifest path.
    pub fn record(
        &self,
        switched_at: DateTime<Utc>,
        source_index: &str,
        target_index: &str,
        alias_before: &AliasState,
        source_count: u64,
        target_count: u64,
    ) -> Result<PathBuf> {
        let stamp = switched_at.format("%Y%m%d_%H%M%S").to_string();
        let dir = self.reports.reindex_dir(&stamp, target_index);
        std::fs::create_dir_all(&dir)?;

        let format_targets = |targets: &[String]| {
            if targets.is_empty() {
                "(none)".to_string()
            } else {
                targets.join(", ")
            }
        };

        let manifest = format!(
            "# Reindex manifest\n\n\
             - Switched at: {}\n\
             - Source index: {}\n\
             - Target index: {}\n\
             - Previous read alias targets: {}\n\
             - Previous write alias targets: {}\n\
             - Source count: {}\n\
             - Target count: {}\n\n\
             The previous index `{}` is retained for rollback. Delete it once\n\
             the new generation has been verified in production.\n",
            switched_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            source_index,
            target_index,
            format_targets(&alias_before.read_targets),
            format_targets(&alias_before.write_targets),
            source_count,
            target_count,
            source_index,
        );

        let path = dir.join("manifest.md");
        std::fs::write(&path, manifest)?;
        info!("wrote retention manifest {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manifest_path_and_content() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = RetentionRecorder::new(ReportPaths::new(dir.path()));
        let switched_at = Utc.with_ymd_and_hms(2025, 2, 3, 10, 30, 0).unwrap();
        let alias_before = AliasState::new(vec!["docs_v1".into()], vec!["docs_v1".into()]);

        let path = recorder
            .record(switched_at, "docs_v1", "docs_v2", &alias_before, 120, 120)
            .unwrap();

        assert_eq!(
            path,
            dir.path()
                .join("reindex")
                .join("20250203_103000_docs_v2")
                .join("manifest.md")
        );
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Source index: docs_v1"));
        assert!(content.contains("Target index: docs_v2"));
        assert!(content.contains("Previous read alias targets: docs_v1"));
        assert!(content.contains("Source count: 120"));
        assert!(content.contains("retained for rollback"));
    }

    #[test]
    fn test_unbound_previous_aliases_render_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = RetentionRecorder::new(ReportPaths::new(dir.path()));
        let path = recorder
            .record(
                Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
                "docs_v1",
                "docs_v2",
                &AliasState::default(),
                0,
                0,
            )
            .unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("Previous read alias targets: (none)"));
    }
}
