use crate::error::CleanupError;
use crate::models::ReconciliationTask;
use crate::utils::keys;
use anyhow::Result;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Local files owned by one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingScope {
    pub dir: PathBuf,
    /// Where the downloaded source lands
    pub source_path: PathBuf,
    /// Where the transcoded derivative is written
    pub converted_path: PathBuf,
}

#[async_trait]
pub trait StagingArea: Send + Sync {
    /// Makes sure the staging root exists.
    async fn prepare(&self) -> std::io::Result<()>;
    /// Creates an isolated scope for `task`.
    async fn allocate(&self, task: &ReconciliationTask) -> Result<StagingScope>;
    /// Removes every file of the scope, and the scope itself.
    async fn release(&self, scope: &StagingScope) -> Result<(), CleanupError>;
}

/// Staging under a local directory, one UUID subdirectory per task so that
/// tasks sharing a file name never collide.
pub struct LocalStagingArea {
    root: PathBuf,
}

impl LocalStagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn remove_file(path: &Path) -> Result<(), CleanupError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CleanupError {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

#[async_trait]
impl StagingArea for LocalStagingArea {
    async fn prepare(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    async fn allocate(&self, task: &ReconciliationTask) -> Result<StagingScope> {
        let dir = self.root.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&dir).await?;

        let (_, derivative_name) = keys::split_key(&task.derivative_key);
        Ok(StagingScope {
            source_path: dir.join(task.source.file_name()),
            converted_path: dir.join(derivative_name),
            dir,
        })
    }

    async fn release(&self, scope: &StagingScope) -> Result<(), CleanupError> {
        // Every removal is attempted, the first failure is reported
        let mut first_error = Self::remove_file(&scope.source_path).await.err();
        if let Err(e) = Self::remove_file(&scope.converted_path).await {
            first_error.get_or_insert(e);
        }

        match tokio::fs::remove_dir_all(&scope.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => {
                first_error.get_or_insert(CleanupError {
                    path: scope.dir.clone(),
                    source,
                });
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
