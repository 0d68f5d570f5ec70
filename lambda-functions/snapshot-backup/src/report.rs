use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::cloud::ReportStore;

/// Persists the accumulated run log as a date-partitioned text object.
pub struct RunReporter<'a> {
    store: &'a dyn ReportStore,
}

impl<'a> RunReporter<'a> {
    pub fn new(store: &'a dyn ReportStore) -> Self {
        Self { store }
    }

    pub fn report_key(now: DateTime<Utc>) -> String {
        format!(
            "backup-logs/{}/backup-{}.txt",
            now.format("%Y-%m-%d"),
            now.to_rfc3339()
        )
    }

    pub fn format_report(lines: &[String], now: DateTime<Utc>) -> String {
        let mut report = format!("Backup run {}\n{}\n", now.to_rfc3339(), "-".repeat(40));
        for line in lines {
            report.push_str(line);
            report.push('\n');
        }
        report
    }

    /// Best-effort: losing the report is less severe than losing the backup
    /// run, so a store failure is only logged.
    pub async fn save_report(&self, lines: &[String], now: DateTime<Utc>) {
        let key = Self::report_key(now);
        let body = Self::format_report(lines, now);
        match self.store.put_text_object(&key, body).await {
            Ok(()) => info!(key = %key, "run report persisted"),
            Err(err) => error!(key = %key, "failed to persist run report: {err:#}"),
        }
    }
}
