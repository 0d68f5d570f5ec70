use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use aws_sdk_ec2::types::{Filter, Tag};
use aws_sdk_ec2::Client as Ec2Client;
use aws_sdk_s3::Client as S3Client;

use crate::cloud::{
    BlockDevice, ComputeApi, InstanceInfo, ReportStore, SnapshotInfo, BACKUP_TAG_KEY,
    BACKUP_TAG_VALUE, PROVENANCE_TAG_KEY, PROVENANCE_TAG_VALUE,
};

/// EC2-backed implementation of [`ComputeApi`].
pub struct Ec2Compute {
    client: Ec2Client,
}

impl Ec2Compute {
    pub fn new(client: Ec2Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ComputeApi for Ec2Compute {
    async fn list_backup_instances(&self) -> Result<Vec<InstanceInfo>> {
        let reservations = self
            .client
            .describe_instances()
            .filters(
                Filter::builder()
                    .name(format!("tag:{}", BACKUP_TAG_KEY))
                    .values(BACKUP_TAG_VALUE)
                    .build(),
            )
            .into_paginator()
            .items()
            .send()
            .collect::<Result<Vec<_>, _>>()
            .await
            .context("describe-instances failed")?;

        let instances = reservations
            .iter()
            .flat_map(|reservation| reservation.instances())
            .map(|instance| InstanceInfo {
                instance_id: instance.instance_id().unwrap_or_default().to_string(),
                state: instance
                    .state()
                    .and_then(|state| state.name())
                    .map(|name| name.as_str().to_string())
                    .unwrap_or_default(),
                block_devices: instance
                    .block_device_mappings()
                    .iter()
                    .map(|mapping| BlockDevice {
                        device_name: mapping.device_name().unwrap_or_default().to_string(),
                        volume_id: mapping
                            .ebs()
                            .and_then(|ebs| ebs.volume_id())
                            .map(str::to_string),
                    })
                    .collect(),
            })
            .collect();

        Ok(instances)
    }

    async fn create_snapshot(&self, volume_id: &str, description: &str) -> Result<String> {
        let output = self
            .client
            .create_snapshot()
            .volume_id(volume_id)
            .description(description)
            .send()
            .await
            .with_context(|| format!("create-snapshot failed for volume {}", volume_id))?;

        output
            .snapshot_id()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("create-snapshot returned no snapshot id"))
    }

    async fn tag_snapshot(&self, snapshot_id: &str, tags: Vec<(String, String)>) -> Result<()> {
        let mut request = self.client.create_tags().resources(snapshot_id);
        for (key, value) in tags {
            request = request.tags(Tag::builder().key(key).value(value).build());
        }
        request
            .send()
            .await
            .with_context(|| format!("create-tags failed for snapshot {}", snapshot_id))?;

        Ok(())
    }

    async fn list_backup_snapshots(&self) -> Result<Vec<SnapshotInfo>> {
        let snapshots = self
            .client
            .describe_snapshots()
            .owner_ids("self")
            .filters(
                Filter::builder()
                    .name(format!("tag:{}", PROVENANCE_TAG_KEY))
                    .values(PROVENANCE_TAG_VALUE)
                    .build(),
            )
            .filters(Filter::builder().name("status").values("completed").build())
            .into_paginator()
            .items()
            .send()
            .collect::<Result<Vec<_>, _>>()
            .await
            .context("describe-snapshots failed")?;

        let snapshots = snapshots
            .iter()
            .map(|snapshot| SnapshotInfo {
                snapshot_id: snapshot.snapshot_id().unwrap_or_default().to_string(),
                tags: snapshot
                    .tags()
                    .iter()
                    .filter_map(|tag| Some((tag.key()?.to_string(), tag.value()?.to_string())))
                    .collect(),
            })
            .collect();

        Ok(snapshots)
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()> {
        self.client
            .delete_snapshot()
            .snapshot_id(snapshot_id)
            .send()
            .await
            .with_context(|| format!("delete-snapshot failed for {}", snapshot_id))?;

        Ok(())
    }
}

/// S3-backed implementation of [`ReportStore`].
pub struct S3ReportStore {
    client: S3Client,
    bucket: String,
}

impl S3ReportStore {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl ReportStore for S3ReportStore {
    async fn put_text_object(&self, key: &str, body: String) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("text/plain")
            .body(body.into_bytes().into())
            .send()
            .await
            .with_context(|| format!("put-object {} to bucket {} failed", key, self.bucket))?;

        Ok(())
    }
}
