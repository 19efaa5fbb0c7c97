use crate::config::ReconcileConfig;
use crate::services::storage::S3StorageService;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{Credentials, Region};
use std::sync::Arc;
use tracing::info;

pub async fn setup_storage(config: &ReconcileConfig) -> Arc<S3StorageService> {
    let storage = &config.storage;

    let mut loader = aws_config::from_env()
        .region(Region::new(storage.region.clone()))
        .timeout_config(
            TimeoutConfig::builder()
                .operation_attempt_timeout(config.call_timeout)
                .build(),
        );

    match &storage.endpoint {
        Some(endpoint) => {
            info!("☁️  S3 Storage: {} (Bucket: {})", endpoint, config.bucket);
            loader = loader.endpoint_url(endpoint);
        }
        None => info!("☁️  S3 Storage: AWS (Bucket: {})", config.bucket),
    }

    if let (Some(access_key), Some(secret_key)) = (&storage.access_key, &storage.secret_key) {
        loader = loader.credentials_provider(Credentials::new(
            access_key.clone(),
            secret_key.clone(),
            None,
            None,
            "static",
        ));
    }

    let aws_config = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(storage.force_path_style)
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);
    Arc::new(S3StorageService::new(s3_client, config.bucket.clone()))
}
