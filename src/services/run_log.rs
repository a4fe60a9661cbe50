//! Persistent log of ingestion runs and queries.
//!
//! Writes are fire-and-forget; a broken or missing log never fails an
//! ingestion.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

use crate::models::{IngestReport, RetrievalResult, RunLogConfig};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS ingest_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    document_id TEXT NOT NULL,
    display_name TEXT NOT NULL,
    byte_size INTEGER NOT NULL,
    needs_split INTEGER NOT NULL,
    sections INTEGER NOT NULL,
    chunk_count INTEGER NOT NULL,
    embedded_count INTEGER NOT NULL,
    failed_chunk_count INTEGER NOT NULL,
    cost_estimate REAL NOT NULL,
    duration_ms INTEGER NOT NULL,
    success INTEGER NOT NULL,
    error TEXT
);

CREATE TABLE IF NOT EXISTS query_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    query TEXT NOT NULL,
    matches INTEGER NOT NULL,
    candidates INTEGER NOT NULL,
    duration_ms INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_ingest_log_timestamp ON ingest_log(timestamp);
CREATE INDEX IF NOT EXISTS idx_ingest_log_document ON ingest_log(document_id);
CREATE INDEX IF NOT EXISTS idx_query_log_timestamp ON query_log(timestamp);
"#;

pub struct RunLog {
    conn: Connection,
}

impl RunLog {
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "auto_vacuum", "INCREMENTAL")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Open at the configured location. None when logging is disabled or no
    /// writable location exists.
    pub fn from_config(config: &RunLogConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }

        let path = config.path.clone().or_else(default_path)?;
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        Self::open(&path).ok()
    }

    pub fn record(&self, report: &IngestReport) {
        let _ = self.conn.execute(
            "INSERT INTO ingest_log (timestamp, document_id, display_name, byte_size, needs_split,
                                     sections, chunk_count, embedded_count, failed_chunk_count,
                                     cost_estimate, duration_ms, success, error)
             VALUES (datetime('now'), ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                report.source_document_id,
                report.display_name,
                report.byte_size as i64,
                report.needs_split as i32,
                report.sections.len() as i64,
                report.chunk_count as i64,
                report.embedded_count as i64,
                report.failed_chunk_count as i64,
                report.total_cost_estimate,
                report.duration_ms as i64,
                report.success as i32,
                report.error,
            ],
        );
    }

    pub fn record_query(&self, result: &RetrievalResult) {
        let _ = self.conn.execute(
            "INSERT INTO query_log (timestamp, query, matches, candidates, duration_ms)
             VALUES (datetime('now'), ?1, ?2, ?3, ?4)",
            params![
                result.query,
                result.matches.len() as i64,
                result.candidates_examined as i64,
                result.duration_ms as i64,
            ],
        );
    }

    pub fn summary(&self, retention_days: u32) -> RunSummary {
        let query = format!(
            r#"
            SELECT
                COUNT(*) as total_runs,
                COALESCE(SUM(CASE WHEN success = 0 THEN 1 ELSE 0 END), 0) as failed_runs,
                COUNT(DISTINCT document_id) as documents,
                COALESCE(SUM(cost_estimate), 0) as total_cost,
                COALESCE(AVG(duration_ms), 0) as avg_duration
            FROM ingest_log
            WHERE timestamp >= datetime('now', '-{} days')
            "#,
            retention_days
        );

        let mut summary = self
            .conn
            .query_row(&query, [], |row| {
                Ok(RunSummary {
                    total_runs: row.get::<_, i64>(0)? as u64,
                    failed_runs: row.get::<_, i64>(1)? as u64,
                    documents: row.get::<_, i64>(2)? as u64,
                    total_cost_estimate: row.get::<_, f64>(3)?,
                    avg_duration_ms: row.get::<_, f64>(4)? as u64,
                    queries: 0,
                })
            })
            .unwrap_or_default();

        let queries = format!(
            "SELECT COUNT(*) FROM query_log WHERE timestamp >= datetime('now', '-{} days')",
            retention_days
        );
        summary.queries = self
            .conn
            .query_row(&queries, [], |row| row.get::<_, i64>(0))
            .unwrap_or(0) as u64;

        summary
    }

    pub fn cleanup(&self, retention_days: u32) {
        for table in ["ingest_log", "query_log"] {
            let query = format!(
                "DELETE FROM {} WHERE timestamp < datetime('now', '-{} days')",
                table, retention_days
            );
            let _ = self.conn.execute(&query, []);
        }
    }
}

fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("docpipe").join("runs.db"))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_runs: u64,
    pub failed_runs: u64,
    pub documents: u64,
    pub total_cost_estimate: f64,
    pub avg_duration_ms: u64,
    pub queries: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(document_id: &str, success: bool, cost: f64) -> IngestReport {
        let mut report = IngestReport::started(document_id, "doc.pdf", 1024);
        report.success = success;
        report.total_cost_estimate = cost;
        report.duration_ms = 100;
        report
    }

    #[test]
    fn test_record_and_summarize() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::open(&dir.path().join("runs.db")).unwrap();

        log.record(&report("doc-a", true, 0.02));
        log.record(&report("doc-a", true, 0.02));

        let mut failed = report("doc-b", false, 0.0);
        failed.error = Some("poll deadline elapsed".to_string());
        log.record(&failed);

        let summary = log.summary(30);
        assert_eq!(summary.total_runs, 3);
        assert_eq!(summary.failed_runs, 1);
        assert_eq!(summary.documents, 2);
        assert!((summary.total_cost_estimate - 0.04).abs() < 1e-9);

        let error: Option<String> = log
            .conn
            .query_row("SELECT error FROM ingest_log WHERE success = 0", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(error.as_deref(), Some("poll deadline elapsed"));
    }

    #[test]
    fn test_disabled_config_yields_no_log() {
        let config = RunLogConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(RunLog::from_config(&config).is_none());
    }

    #[test]
    fn test_cleanup_keeps_recent_rows() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::open(&dir.path().join("runs.db")).unwrap();

        log.record(&report("doc-a", true, 0.01));
        log.cleanup(30);

        assert_eq!(log.summary(30).total_runs, 1);
    }

    #[test]
    fn test_record_query_counts_in_summary() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::open(&dir.path().join("runs.db")).unwrap();

        let result = RetrievalResult::new("refund policy".to_string(), vec![], 10, 0, 42);
        log.record_query(&result);
        log.record_query(&result);

        assert_eq!(log.summary(30).queries, 2);
    }
}
