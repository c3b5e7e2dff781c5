//! Slow-query log: append-only record of searches over the latency threshold.

use std::io::Write;

use chrono::{SecondsFormat, Utc};
use searchops_core::SlowlogConfig;
use tracing::warn;

/// Appends one tab-separated line per slow query. Logging failures are
/// reported but never fail the request.
pub struct Slowlog {
    config: SlowlogConfig,
}

impl Slowlog {
    pub fn new(config: SlowlogConfig) -> Self {
        Self { config }
    }

    /// Record a search if it crossed the threshold. Returns whether a line
    /// was written.
    pub fn record(&self, query: &str, took_ms: u64, total: u64) -> bool {
        if !self.config.enabled || took_ms < self.config.threshold_ms {
            return false;
        }
        warn!("slow query ({} ms, {} hits): {}", took_ms, total, query);

        let line = format!(
            "{}\t{}ms\t{}hits\t{}\n",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            took_ms,
            total,
            query
        );
        if let Err(e) = self.append(&line) {
            warn!("cannot append to slowlog {}: {}", self.config.path.display(), e);
            return false;
        }
        true
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.config.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.path)?;
        file.write_all(line.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &std::path::Path, enabled: bool, threshold_ms: u64) -> SlowlogConfig {
        SlowlogConfig {
            enabled,
            threshold_ms,
            path: dir.join("logs").join("slow_queries.log"),
        }
    }

    #[test]
    fn test_records_only_above_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let slowlog = Slowlog::new(config(dir.path(), true, 100));

        assert!(!slowlog.record("fast query", 99, 3));
        assert!(slowlog.record("slow query", 100, 3));
        assert!(slowlog.record("slower query", 2500, 0));

        let content =
            std::fs::read_to_string(dir.path().join("logs").join("slow_queries.log")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("slow query"));
        assert!(lines[1].contains("2500ms"));
    }

    #[test]
    fn test_disabled_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let slowlog = Slowlog::new(config(dir.path(), false, 100));
        assert!(!slowlog.record("slow query", 9999, 1));
        assert!(!dir.path().join("logs").join("slow_queries.log").exists());
    }
}
