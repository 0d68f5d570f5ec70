use chrono::{Duration, NaiveDate};
use tracing::{error, info, warn};

use crate::cloud::{
    ComputeApi, CREATED_ON_TAG_KEY, DATE_FORMAT, PROVENANCE_TAG_KEY, PROVENANCE_TAG_VALUE,
};

/// Deletes snapshots created by this system whose `CreatedOn` tag is older
/// than the retention window.
pub struct RetentionSweeper<'a> {
    compute: &'a dyn ComputeApi,
    retention_days: i64,
}

impl<'a> RetentionSweeper<'a> {
    pub fn new(compute: &'a dyn ComputeApi, retention_days: i64) -> Self {
        Self {
            compute,
            retention_days,
        }
    }

    /// Never aborts the run: a discovery failure becomes a single error
    /// line, a per-snapshot delete failure is logged and the sweep
    /// continues. Snapshots whose age cannot be determined are left alone.
    pub async fn cleanup_old_snapshots(&self, today: NaiveDate) -> Vec<String> {
        let mut lines = Vec::new();

        let snapshots = match self.compute.list_backup_snapshots().await {
            Ok(snapshots) => snapshots,
            Err(err) => {
                error!("snapshot discovery failed: {err:#}");
                lines.push(format!("Snapshot cleanup skipped: {:#}", err));
                return lines;
            }
        };

        let cutoff = today - Duration::days(self.retention_days);

        for snapshot in &snapshots {
            // The query already filters on the provenance tag, but deletion
            // is gated on it again here: a snapshot without the marker must
            // never be deleted.
            if snapshot.tags.get(PROVENANCE_TAG_KEY).map(String::as_str)
                != Some(PROVENANCE_TAG_VALUE)
            {
                continue;
            }

            let Some(created_on) = snapshot.tags.get(CREATED_ON_TAG_KEY) else {
                continue;
            };
            let created = match NaiveDate::parse_from_str(created_on, DATE_FORMAT) {
                Ok(date) => date,
                Err(_) => {
                    warn!(
                        snapshot = %snapshot.snapshot_id,
                        created_on = %created_on,
                        "unparseable CreatedOn tag, leaving snapshot alone"
                    );
                    continue;
                }
            };

            if created < cutoff {
                match self.compute.delete_snapshot(&snapshot.snapshot_id).await {
                    Ok(()) => {
                        info!(snapshot = %snapshot.snapshot_id, "deleted expired snapshot");
                        lines.push(format!(
                            "Deleted snapshot {} created on {}",
                            snapshot.snapshot_id, created_on
                        ));
                    }
                    Err(err) => {
                        warn!(snapshot = %snapshot.snapshot_id, "delete failed: {err:#}");
                        lines.push(format!(
                            "Failed to delete snapshot {}: {:#}",
                            snapshot.snapshot_id, err
                        ));
                    }
                }
            }
        }

        lines
    }
}
