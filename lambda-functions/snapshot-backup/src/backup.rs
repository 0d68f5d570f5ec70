use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::cloud::{
    ComputeApi, InstanceInfo, CREATED_ON_TAG_KEY, DATE_FORMAT, PROVENANCE_TAG_KEY,
    PROVENANCE_TAG_VALUE,
};

/// Outcome of one backup pass: the run-report lines and how many snapshots
/// were created and fully tagged.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BackupRun {
    pub lines: Vec<String>,
    pub snapshots_created: usize,
}

/// Creates one snapshot per backed volume of every instance tagged
/// `Backup=true`, tagging each snapshot with provenance metadata.
pub struct BackupOrchestrator<'a> {
    compute: &'a dyn ComputeApi,
}

impl<'a> BackupOrchestrator<'a> {
    pub fn new(compute: &'a dyn ComputeApi) -> Self {
        Self { compute }
    }

    /// A failure on a single volume is logged and the batch continues; only
    /// a failure of instance discovery itself propagates.
    pub async fn create_backups(&self, today: NaiveDate) -> Result<BackupRun> {
        let instances = self
            .compute
            .list_backup_instances()
            .await
            .context("listing instances tagged for backup")?;

        let mut run = BackupRun::default();

        if instances.is_empty() {
            info!("no instances tagged for backup");
            run.lines
                .push("No instances tagged for backup; nothing to do".to_string());
            return Ok(run);
        }

        for instance in &instances {
            if instance.state == "terminated" {
                continue;
            }

            for device in &instance.block_devices {
                let Some(volume_id) = &device.volume_id else {
                    continue;
                };

                match self.snapshot_volume(instance, volume_id, today).await {
                    Ok(snapshot_id) => {
                        info!(
                            instance = %instance.instance_id,
                            volume = %volume_id,
                            snapshot = %snapshot_id,
                            "created snapshot"
                        );
                        run.snapshots_created += 1;
                        run.lines.push(format!(
                            "Created snapshot {} for {}-{}",
                            snapshot_id, instance.instance_id, volume_id
                        ));
                    }
                    Err(err) => {
                        warn!(
                            instance = %instance.instance_id,
                            volume = %volume_id,
                            "backup failed: {err:#}"
                        );
                        run.lines.push(format!(
                            "Failed to back up volume {} on {}: {:#}",
                            volume_id, instance.instance_id, err
                        ));
                    }
                }
            }
        }

        Ok(run)
    }

    async fn snapshot_volume(
        &self,
        instance: &InstanceInfo,
        volume_id: &str,
        today: NaiveDate,
    ) -> Result<String> {
        let description = format!(
            "Backup of {}, volume {}",
            instance.instance_id, volume_id
        );
        let snapshot_id = self.compute.create_snapshot(volume_id, &description).await?;

        let tags = vec![
            (
                "Name".to_string(),
                format!("{}-{}", instance.instance_id, volume_id),
            ),
            ("InstanceId".to_string(), instance.instance_id.clone()),
            ("VolumeId".to_string(), volume_id.to_string()),
            (
                PROVENANCE_TAG_KEY.to_string(),
                PROVENANCE_TAG_VALUE.to_string(),
            ),
            (
                CREATED_ON_TAG_KEY.to_string(),
                today.format(DATE_FORMAT).to_string(),
            ),
        ];
        self.compute
            .tag_snapshot(&snapshot_id, tags)
            .await
            .with_context(|| format!("tagging snapshot {}", snapshot_id))?;

        Ok(snapshot_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{BlockDevice, MockComputeApi};
    use anyhow::anyhow;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 20).unwrap()
    }

    fn instance(id: &str, state: &str, volumes: &[Option<&str>]) -> InstanceInfo {
        InstanceInfo {
            instance_id: id.to_string(),
            state: state.to_string(),
            block_devices: volumes
                .iter()
                .enumerate()
                .map(|(i, volume)| BlockDevice {
                    device_name: format!("/dev/sd{}", (b'a' + i as u8) as char),
                    volume_id: volume.map(str::to_string),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn empty_discovery_is_informational_not_an_error() {
        let mut compute = MockComputeApi::new();
        compute
            .expect_list_backup_instances()
            .returning(|| Ok(vec![]));

        let run = BackupOrchestrator::new(&compute)
            .create_backups(today())
            .await
            .unwrap();

        assert_eq!(run.snapshots_created, 0);
        assert_eq!(
            run.lines,
            vec!["No instances tagged for backup; nothing to do".to_string()]
        );
    }

    #[tokio::test]
    async fn discovery_failure_propagates() {
        let mut compute = MockComputeApi::new();
        compute
            .expect_list_backup_instances()
            .returning(|| Err(anyhow!("api unreachable")));

        let result = BackupOrchestrator::new(&compute)
            .create_backups(today())
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn terminated_instances_are_skipped() {
        let mut compute = MockComputeApi::new();
        compute
            .expect_list_backup_instances()
            .returning(|| Ok(vec![instance("i-dead", "terminated", &[Some("vol-1")])]));
        // No create_snapshot expectation: any call would panic the mock.

        let run = BackupOrchestrator::new(&compute)
            .create_backups(today())
            .await
            .unwrap();

        assert_eq!(run.snapshots_created, 0);
        assert!(run.lines.is_empty());
    }

    #[tokio::test]
    async fn devices_without_backing_volume_are_skipped() {
        let mut compute = MockComputeApi::new();
        compute
            .expect_list_backup_instances()
            .returning(|| Ok(vec![instance("i-1", "running", &[None, Some("vol-1")])]));
        compute
            .expect_create_snapshot()
            .withf(|volume, _| volume == "vol-1")
            .times(1)
            .returning(|_, _| Ok("snap-1".to_string()));
        compute
            .expect_tag_snapshot()
            .times(1)
            .returning(|_, _| Ok(()));

        let run = BackupOrchestrator::new(&compute)
            .create_backups(today())
            .await
            .unwrap();

        assert_eq!(run.snapshots_created, 1);
    }

    #[tokio::test]
    async fn every_snapshot_carries_the_five_required_tags() {
        let mut compute = MockComputeApi::new();
        compute
            .expect_list_backup_instances()
            .returning(|| Ok(vec![instance("i-1", "running", &[Some("vol-1")])]));
        compute
            .expect_create_snapshot()
            .withf(|volume, description| {
                volume == "vol-1" && description == "Backup of i-1, volume vol-1"
            })
            .returning(|_, _| Ok("snap-1".to_string()));
        compute
            .expect_tag_snapshot()
            .withf(|snapshot, tags| {
                let get = |key: &str| {
                    tags.iter()
                        .find(|(k, _)| k == key)
                        .map(|(_, v)| v.as_str())
                };
                snapshot == "snap-1"
                    && tags.len() == 5
                    && get("Name") == Some("i-1-vol-1")
                    && get("InstanceId") == Some("i-1")
                    && get("VolumeId") == Some("vol-1")
                    && get("CreatedBy") == Some("automated-backup")
                    && get("CreatedOn") == Some("2025-01-20")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let run = BackupOrchestrator::new(&compute)
            .create_backups(today())
            .await
            .unwrap();

        assert_eq!(run.snapshots_created, 1);
        assert_eq!(run.lines, vec!["Created snapshot snap-1 for i-1-vol-1"]);
    }

    #[tokio::test]
    async fn one_volume_failing_does_not_stop_its_siblings() {
        let mut compute = MockComputeApi::new();
        compute
            .expect_list_backup_instances()
            .returning(|| Ok(vec![instance("i-1", "running", &[Some("vol-bad"), Some("vol-ok")])]));
        compute
            .expect_create_snapshot()
            .withf(|volume, _| volume == "vol-bad")
            .returning(|_, _| Err(anyhow!("volume busy")));
        compute
            .expect_create_snapshot()
            .withf(|volume, _| volume == "vol-ok")
            .returning(|_, _| Ok("snap-2".to_string()));
        compute
            .expect_tag_snapshot()
            .withf(|snapshot, _| snapshot == "snap-2")
            .returning(|_, _| Ok(()));

        let run = BackupOrchestrator::new(&compute)
            .create_backups(today())
            .await
            .unwrap();

        assert_eq!(run.snapshots_created, 1);
        assert_eq!(run.lines.len(), 2);
        assert!(run.lines[0].contains("Failed to back up volume vol-bad"));
        assert!(run.lines[1].contains("Created snapshot snap-2"));
    }

    #[tokio::test]
    async fn tagging_failure_is_reported_not_counted() {
        let mut compute = MockComputeApi::new();
        compute
            .expect_list_backup_instances()
            .returning(|| Ok(vec![instance("i-1", "running", &[Some("vol-1")])]));
        compute
            .expect_create_snapshot()
            .returning(|_, _| Ok("snap-1".to_string()));
        compute
            .expect_tag_snapshot()
            .returning(|_, _| Err(anyhow!("throttled")));

        let run = BackupOrchestrator::new(&compute)
            .create_backups(today())
            .await
            .unwrap();

        assert_eq!(run.snapshots_created, 0);
        assert_eq!(run.lines.len(), 1);
        assert!(run.lines[0].contains("Failed to back up volume vol-1 on i-1"));
    }
}
