use anyhow::{ensure, Context, Result};

/// Runtime configuration, provided through the Lambda environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Snapshots strictly older than this many days are deleted.
    pub retention_days: i64,
    /// Bucket receiving the per-run report objects.
    pub log_bucket: String,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let retention_days = std::env::var("RETENTION_DAYS")
            .context("RETENTION_DAYS is not set")?
            .parse::<i64>()
            .context("RETENTION_DAYS must be an integer number of days")?;
        ensure!(retention_days >= 0, "RETENTION_DAYS must be non-negative");

        let log_bucket = std::env::var("LOG_BUCKET").context("LOG_BUCKET is not set")?;

        Ok(Self {
            retention_days,
            log_bucket,
        })
    }
}
