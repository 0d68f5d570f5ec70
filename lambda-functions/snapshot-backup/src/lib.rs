//! Scheduled EC2 snapshot backups with tag-driven retention.
//!
//! Once a day the handler snapshots every EBS volume attached to an
//! instance tagged `Backup=true`, tags each snapshot with provenance
//! metadata, deletes snapshots older than the retention window, and writes
//! a per-run report to S3. Resource tags are the only system of record;
//! there is no database.

pub mod aws;
pub mod backup;
pub mod cloud;
pub mod config;
pub mod handler;
pub mod report;
pub mod sweep;

pub use aws::{Ec2Compute, S3ReportStore};
pub use backup::{BackupOrchestrator, BackupRun};
pub use cloud::{BlockDevice, ComputeApi, InstanceInfo, ReportStore, SnapshotInfo};
pub use config::Settings;
pub use handler::{run_backup_cycle, Response};
pub use report::RunReporter;
pub use sweep::RetentionSweeper;
