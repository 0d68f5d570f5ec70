use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

/// Instances carrying this tag (string-compared against [`BACKUP_TAG_VALUE`])
/// are eligible for backup.
pub const BACKUP_TAG_KEY: &str = "Backup";
pub const BACKUP_TAG_VALUE: &str = "true";

/// Provenance marker written on every snapshot this system creates. The
/// sweeper only ever deletes snapshots carrying it.
pub const PROVENANCE_TAG_KEY: &str = "CreatedBy";
pub const PROVENANCE_TAG_VALUE: &str = "automated-backup";

/// UTC calendar date of creation, `YYYY-MM-DD`. Drives retention.
pub const CREATED_ON_TAG_KEY: &str = "CreatedOn";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One block-device-mapping entry on an instance. Devices without a backing
/// volume (ephemeral/instance-store) carry `volume_id: None` and are never
/// snapshotted.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockDevice {
    pub device_name: String,
    pub volume_id: Option<String>,
}

/// An EC2 instance as seen by the orchestrator, already filtered server-side
/// to those tagged for backup.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceInfo {
    pub instance_id: String,
    pub state: String,
    pub block_devices: Vec<BlockDevice>,
}

/// A previously created snapshot, as seen by the sweeper. Tags are the only
/// persistent record of provenance and age.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotInfo {
    pub snapshot_id: String,
    pub tags: HashMap<String, String>,
}

/// Compute-provider operations the orchestrator and sweeper depend on.
/// Injected so tests can substitute fakes for the EC2 client.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// Lists instances carrying the `Backup=true` tag.
    async fn list_backup_instances(&self) -> Result<Vec<InstanceInfo>>;

    /// Creates a snapshot of the given volume and returns its id.
    async fn create_snapshot(&self, volume_id: &str, description: &str) -> Result<String>;

    /// Applies the given tags to a snapshot.
    async fn tag_snapshot(&self, snapshot_id: &str, tags: Vec<(String, String)>) -> Result<()>;

    /// Lists completed snapshots owned by this account that carry the
    /// provenance tag.
    async fn list_backup_snapshots(&self) -> Result<Vec<SnapshotInfo>>;

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()>;
}

/// Durable store for run reports.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn put_text_object(&self, key: &str, body: String) -> Result<()>;
}
