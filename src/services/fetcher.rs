use crate::services::storage::StorageService;
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// Characters left untouched inside a single key segment
const KEY_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Source of object bytes for the download stage.
#[async_trait]
pub trait ObjectFetcher: Send + Sync {
    async fn fetch(&self, key: &str, dest: &Path) -> Result<u64>;
}

/// Authenticated download through the storage client.
pub struct StorageFetcher {
    storage: Arc<dyn StorageService>,
}

impl StorageFetcher {
    pub fn new(storage: Arc<dyn StorageService>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl ObjectFetcher for StorageFetcher {
    async fn fetch(&self, key: &str, dest: &Path) -> Result<u64> {
        self.storage.download_to_path(key, dest).await
    }
}

/// Anonymous download from the bucket's public URL,
/// e.g. `https://storage.googleapis.com/{bucket}/{key}`.
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client, base_url: &str, bucket: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
        }
    }

    pub fn object_url(&self, key: &str) -> String {
        let encoded: Vec<String> = key
            .split('/')
            .map(|segment| utf8_percent_encode(segment, KEY_SEGMENT).to_string())
            .collect();
        format!("{}/{}/{}", self.base_url, self.bucket, encoded.join("/"))
    }
}

#[async_trait]
impl ObjectFetcher for HttpFetcher {
    async fn fetch(&self, key: &str, dest: &Path) -> Result<u64> {
        let url = self.object_url(key);
        tracing::debug!("GET {}", url);

        let response = self.client.get(&url).send().await?.error_for_status()?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk: Bytes = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }
}
