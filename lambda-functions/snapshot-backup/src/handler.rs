use chrono::{DateTime, Utc};
use lambda_runtime::Error;
use serde::Serialize;
use tracing::{error, info};

use crate::backup::BackupOrchestrator;
use crate::cloud::{ComputeApi, ReportStore};
use crate::config::Settings;
use crate::report::RunReporter;
use crate::sweep::RetentionSweeper;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Response {
    pub status_code: u16,
    pub message: String,
    pub snapshots_created: usize,
    pub timestamp: String,
}

/// Runs one scheduled invocation: backups, then retention cleanup, then the
/// run report. Only a failure to discover instances aborts the run, and even
/// then the lines gathered so far are persisted best-effort first.
pub async fn run_backup_cycle(
    compute: &dyn ComputeApi,
    reports: &dyn ReportStore,
    settings: &Settings,
    now: DateTime<Utc>,
) -> Result<Response, Error> {
    let today = now.date_naive();
    let reporter = RunReporter::new(reports);

    let run = match BackupOrchestrator::new(compute).create_backups(today).await {
        Ok(run) => run,
        Err(err) => {
            error!("backup run failed: {err:#}");
            let lines = vec![format!("Instance discovery failed: {:#}", err)];
            reporter.save_report(&lines, now).await;
            return Err(err.into());
        }
    };

    let mut lines = run.lines;
    lines.extend(
        RetentionSweeper::new(compute, settings.retention_days)
            .cleanup_old_snapshots(today)
            .await,
    );

    reporter.save_report(&lines, now).await;

    info!(snapshots_created = run.snapshots_created, "backup run complete");

    Ok(Response {
        status_code: 200,
        message: format!(
            "Backup completed successfully. {} snapshots created.",
            run.snapshots_created
        ),
        snapshots_created: run.snapshots_created,
        timestamp: now.to_rfc3339(),
    })
}
