pub mod storage;

use crate::config::{DownloadMode, ReconcileConfig};
use crate::services::fetcher::{HttpFetcher, ObjectFetcher, StorageFetcher};
use crate::services::reconciler::Reconciler;
use crate::services::staging::LocalStagingArea;
use crate::services::storage::StorageService;
use crate::services::transcoder::ImageTranscoder;
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

pub fn setup_http_client(config: &ReconcileConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(config.call_timeout)
        .user_agent(concat!("webp-backfill/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Wires the production collaborators into a reconciler.
pub async fn setup_reconciler(config: ReconcileConfig) -> Result<Reconciler> {
    config.validate()?;

    let storage: Arc<dyn StorageService> = storage::setup_storage(&config).await;

    let fetcher: Arc<dyn ObjectFetcher> = match config.download_mode {
        DownloadMode::Storage => Arc::new(StorageFetcher::new(storage.clone())),
        DownloadMode::Public => {
            info!("🌐 Downloading sources from {}", config.public_base_url);
            Arc::new(HttpFetcher::new(
                setup_http_client(&config)?,
                &config.public_base_url,
                &config.bucket,
            ))
        }
    };

    let transcoder = Arc::new(ImageTranscoder::for_extension(&config.target_extension)?);
    let staging = Arc::new(LocalStagingArea::new(config.staging_dir.clone()));

    Ok(Reconciler::new(config, storage, fetcher, transcoder, staging)?)
}
