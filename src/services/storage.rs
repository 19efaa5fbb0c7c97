use crate::models::RemoteObject;
use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// One page of a prefix listing.
#[derive(Debug, Default)]
pub struct ObjectPage {
    pub objects: Vec<RemoteObject>,
    /// Token for the next page, `None` once the listing is exhausted
    pub next_token: Option<String>,
}

#[async_trait]
pub trait StorageService: Send + Sync {
    fn bucket(&self) -> &str;
    async fn check_access(&self) -> Result<()>;
    async fn list_page(&self, prefix: &str, continuation_token: Option<String>)
    -> Result<ObjectPage>;
    async fn file_exists(&self, key: &str) -> Result<bool>;
    /// Streams the object to `dest`, returning the number of bytes written.
    async fn download_to_path(&self, key: &str, dest: &Path) -> Result<u64>;
    async fn upload_from_path(&self, key: &str, src: &Path, content_type: &str) -> Result<()>;
}

pub struct S3StorageService {
    client: Client,
    bucket: String,
}

impl S3StorageService {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl StorageService for S3StorageService {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn check_access(&self) -> Result<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(e.into_service_error()))?;
        Ok(())
    }

    async fn list_page(
        &self,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<ObjectPage> {
        let res = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .set_prefix((!prefix.is_empty()).then(|| prefix.to_string()))
            .set_continuation_token(continuation_token)
            .send()
            .await?;

        let mut objects = Vec::new();
        if let Some(contents) = res.contents {
            for object in contents {
                if let Some(key) = object.key {
                    objects.push(RemoteObject { key, size: object.size });
                }
            }
        }

        let next_token = if res.is_truncated.unwrap_or(false) {
            res.next_continuation_token
        } else {
            None
        };

        Ok(ObjectPage {
            objects,
            next_token,
        })
    }

    async fn file_exists(&self, key: &str) -> Result<bool> {
        let res = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match res {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(anyhow::anyhow!(service_error))
                }
            }
        }
    }

    async fn download_to_path(&self, key: &str, dest: &Path) -> Result<u64> {
        let mut res = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;
        while let Some(chunk) = res.body.try_next().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }

    async fn upload_from_path(&self, key: &str, src: &Path, content_type: &str) -> Result<()> {
        let body = ByteStream::from_path(src).await?;
        let res = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await;

        if let Err(e) = res {
            tracing::error!(
                "S3 put_object failed: bucket={}, key={}, error={:?}",
                self.bucket,
                key,
                e
            );
            return Err(e.into());
        }
        Ok(())
    }
}
