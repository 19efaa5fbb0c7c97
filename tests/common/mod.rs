#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use webp_backfill::config::ReconcileConfig;
use webp_backfill::error::CleanupError;
use webp_backfill::models::{ReconciliationTask, RemoteObject};
use webp_backfill::services::fetcher::StorageFetcher;
use webp_backfill::services::reconciler::Reconciler;
use webp_backfill::services::staging::{LocalStagingArea, StagingArea, StagingScope};
use webp_backfill::services::storage::{ObjectPage, StorageService};
use webp_backfill::services::transcoder::Transcoder;

/// In-memory bucket that records every call made against it.
pub struct FakeStorage {
    bucket: String,
    keys: Mutex<Vec<String>>,
    contents: Mutex<HashMap<String, Vec<u8>>>,
    /// Keys visible to `file_exists` but absent from listings
    unlisted: Mutex<HashSet<String>>,
    page_size: usize,
    fail_access: bool,
    fail_listing: bool,
    fail_download: HashSet<String>,
    fail_upload: HashSet<String>,
    download_delay: Option<Duration>,

    pub access_checks: AtomicUsize,
    pub list_pages: AtomicUsize,
    pub existence_checks: AtomicUsize,
    pub downloads: Mutex<Vec<String>>,
    pub uploads: Mutex<Vec<(String, String)>>,
}

impl FakeStorage {
    pub fn new(keys: &[&str]) -> Self {
        Self {
            bucket: "media".to_string(),
            keys: Mutex::new(keys.iter().map(|k| k.to_string()).collect()),
            contents: Mutex::new(HashMap::new()),
            unlisted: Mutex::new(HashSet::new()),
            page_size: 1000,
            fail_access: false,
            fail_listing: false,
            fail_download: HashSet::new(),
            fail_upload: HashSet::new(),
            download_delay: None,
            access_checks: AtomicUsize::new(0),
            list_pages: AtomicUsize::new(0),
            existence_checks: AtomicUsize::new(0),
            downloads: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn failing_access(mut self) -> Self {
        self.fail_access = true;
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn failing_download(mut self, key: &str) -> Self {
        self.fail_download.insert(key.to_string());
        self
    }

    pub fn failing_upload(mut self, key: &str) -> Self {
        self.fail_upload.insert(key.to_string());
        self
    }

    pub fn with_download_delay(mut self, delay: Duration) -> Self {
        self.download_delay = Some(delay);
        self
    }

    pub fn with_content(self, key: &str, data: Vec<u8>) -> Self {
        self.contents.lock().unwrap().insert(key.to_string(), data);
        self
    }

    /// Makes `key` exist without showing up in listings.
    pub fn with_unlisted(self, key: &str) -> Self {
        self.unlisted.lock().unwrap().insert(key.to_string());
        self
    }

    pub fn uploaded_keys(&self) -> Vec<String> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn uploaded_content(&self, key: &str) -> Option<Vec<u8>> {
        self.contents.lock().unwrap().get(key).cloned()
    }

    pub fn download_count(&self) -> usize {
        self.downloads.lock().unwrap().len()
    }
}

#[async_trait]
impl StorageService for FakeStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn check_access(&self) -> Result<()> {
        self.access_checks.fetch_add(1, Ordering::SeqCst);
        if self.fail_access {
            return Err(anyhow!("403 Forbidden"));
        }
        Ok(())
    }

    async fn list_page(
        &self,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<ObjectPage> {
        self.list_pages.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing {
            return Err(anyhow!("NoSuchBucket"));
        }

        let start: usize = continuation_token
            .as_deref()
            .map(|t| t.parse::<usize>())
            .transpose()?
            .unwrap_or(0);
        let matching: Vec<String> = self
            .keys
            .lock()
            .unwrap()
            .iter()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();

        let end = (start + self.page_size).min(matching.len());
        let objects = matching[start..end]
            .iter()
            .map(|k| RemoteObject::new(k.clone()))
            .collect();
        let next_token = (end < matching.len()).then(|| end.to_string());

        Ok(ObjectPage {
            objects,
            next_token,
        })
    }

    async fn file_exists(&self, key: &str) -> Result<bool> {
        self.existence_checks.fetch_add(1, Ordering::SeqCst);
        Ok(self.keys.lock().unwrap().iter().any(|k| k == key)
            || self.unlisted.lock().unwrap().contains(key))
    }

    async fn download_to_path(&self, key: &str, dest: &Path) -> Result<u64> {
        self.downloads.lock().unwrap().push(key.to_string());
        if let Some(delay) = self.download_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_download.contains(key) {
            return Err(anyhow!("GET {} returned 500", key));
        }

        let data = self
            .contents
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .unwrap_or_else(|| format!("bytes of {}", key).into_bytes());
        tokio::fs::write(dest, &data).await?;
        Ok(data.len() as u64)
    }

    async fn upload_from_path(&self, key: &str, src: &Path, content_type: &str) -> Result<()> {
        if self.fail_upload.contains(key) {
            return Err(anyhow!("PUT {} denied", key));
        }
        let data = tokio::fs::read(src).await?;

        self.uploads
            .lock()
            .unwrap()
            .push((key.to_string(), content_type.to_string()));
        self.contents.lock().unwrap().insert(key.to_string(), data);
        self.keys.lock().unwrap().push(key.to_string());
        Ok(())
    }
}

/// Transcoder that copies bytes and fails for chosen source file names.
pub struct FakeTranscoder {
    fail_for: HashSet<String>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub calls: Mutex<Vec<String>>,
}

impl FakeTranscoder {
    pub fn new() -> Self {
        Self {
            fail_for: HashSet::new(),
            delay: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_for(mut self, file_name: &str) -> Self {
        self.fail_for.insert(file_name.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(&self, src: &Path, dest: &Path) -> Result<()> {
        let name = src
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        self.calls.lock().unwrap().push(name.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_for.contains(&name) {
            return Err(anyhow!("cannot decode {}", name));
        }
        let mut data = b"WEBP:".to_vec();
        data.extend(tokio::fs::read(src).await?);
        tokio::fs::write(dest, data).await?;
        Ok(())
    }

    fn content_type(&self) -> &str {
        "image/webp"
    }
}

/// Local staging that records every allocation and release.
pub struct RecordingStaging {
    inner: LocalStagingArea,
    fail_release: bool,
    pub allocated: Mutex<Vec<StagingScope>>,
    pub released: Mutex<Vec<StagingScope>>,
}

impl RecordingStaging {
    pub fn new(root: &Path) -> Self {
        Self {
            inner: LocalStagingArea::new(root),
            fail_release: false,
            allocated: Mutex::new(Vec::new()),
            released: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_release(mut self) -> Self {
        self.fail_release = true;
        self
    }

    pub fn allocated_count(&self) -> usize {
        self.allocated.lock().unwrap().len()
    }
}

#[async_trait]
impl StagingArea for RecordingStaging {
    async fn prepare(&self) -> std::io::Result<()> {
        self.inner.prepare().await
    }

    async fn allocate(&self, task: &ReconciliationTask) -> Result<StagingScope> {
        let scope = self.inner.allocate(task).await?;
        self.allocated.lock().unwrap().push(scope.clone());
        Ok(scope)
    }

    async fn release(&self, scope: &StagingScope) -> Result<(), CleanupError> {
        self.released.lock().unwrap().push(scope.clone());
        if self.fail_release {
            return Err(CleanupError {
                path: scope.dir.clone(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        self.inner.release(scope).await
    }
}

pub fn test_config(staging_root: &Path) -> ReconcileConfig {
    ReconcileConfig {
        bucket: "media".to_string(),
        staging_dir: staging_root.to_path_buf(),
        ..ReconcileConfig::default()
    }
}

pub fn build_reconciler(
    config: ReconcileConfig,
    storage: Arc<FakeStorage>,
    transcoder: Arc<dyn Transcoder>,
    staging: Arc<dyn StagingArea>,
) -> Reconciler {
    let fetcher = Arc::new(StorageFetcher::new(storage.clone()));
    Reconciler::new(config, storage, fetcher, transcoder, staging).unwrap()
}
