use aws_config::BehaviorVersion;
use aws_sdk_ec2::Client as Ec2Client;
use aws_sdk_s3::Client as S3Client;
use chrono::Utc;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::Value;
use snapshot_backup::{run_backup_cycle, Ec2Compute, Response, S3ReportStore, Settings};

// The scheduled trigger carries no meaningful payload.
async fn function_handler(_event: LambdaEvent<Value>) -> Result<Response, Error> {
    let settings = Settings::from_env()?;
    let config = aws_config::defaults(BehaviorVersion::latest()).load().await;

    let compute = Ec2Compute::new(Ec2Client::new(&config));
    let reports = S3ReportStore::new(S3Client::new(&config), settings.log_bucket.clone());

    run_backup_cycle(&compute, &reports, &settings, Utc::now()).await
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    run(service_fn(function_handler)).await
}
