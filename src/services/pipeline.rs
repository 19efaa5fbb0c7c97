use crate::error::{Stage, TaskError};
use crate::models::{ReconciliationTask, TaskOutcome};
use crate::services::fetcher::ObjectFetcher;
use crate::services::staging::{StagingArea, StagingScope};
use crate::services::storage::StorageService;
use crate::services::transcoder::Transcoder;
use crate::utils::timeout::with_timeout;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Lifecycle of a single task.
///
/// `Pending → Downloaded → Converted → Uploaded`, with `Failed` reachable
/// from every non-terminal state. Terminal states have no successor.
#[derive(Debug)]
pub enum TaskState {
    Pending,
    Downloaded,
    Converted,
    Uploaded,
    Failed(TaskError),
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Uploaded | TaskState::Failed(_))
    }

    /// The stage that moves this state forward.
    pub fn next_stage(&self) -> Option<Stage> {
        match self {
            TaskState::Pending => Some(Stage::Download),
            TaskState::Downloaded => Some(Stage::Convert),
            TaskState::Converted => Some(Stage::Upload),
            TaskState::Uploaded | TaskState::Failed(_) => None,
        }
    }

    /// Applies the result of `next_stage()`.
    pub fn transition(self, result: anyhow::Result<()>) -> TaskState {
        match (self, result) {
            (TaskState::Pending, Ok(())) => TaskState::Downloaded,
            (TaskState::Pending, Err(e)) => TaskState::Failed(TaskError::Download(e)),
            (TaskState::Downloaded, Ok(())) => TaskState::Converted,
            (TaskState::Downloaded, Err(e)) => TaskState::Failed(TaskError::Convert(e)),
            (TaskState::Converted, Ok(())) => TaskState::Uploaded,
            (TaskState::Converted, Err(e)) => TaskState::Failed(TaskError::Upload(e)),
            (terminal, _) => terminal,
        }
    }
}

/// Download, convert and upload for one task at a time.
pub struct Pipeline {
    fetcher: Arc<dyn ObjectFetcher>,
    transcoder: Arc<dyn Transcoder>,
    storage: Arc<dyn StorageService>,
    staging: Arc<dyn StagingArea>,
    call_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn ObjectFetcher>,
        transcoder: Arc<dyn Transcoder>,
        storage: Arc<dyn StorageService>,
        staging: Arc<dyn StagingArea>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            transcoder,
            storage,
            staging,
            call_timeout,
        }
    }

    /// Drives `task` to a terminal state and releases its staging scope.
    pub async fn execute(&self, task: &ReconciliationTask) -> TaskOutcome {
        let scope = match self.staging.allocate(task).await {
            Ok(scope) => scope,
            Err(e) => {
                let err = TaskError::Download(e.context("Could not allocate staging scope"));
                return TaskOutcome::failed(task, &err);
            }
        };

        let mut state = TaskState::Pending;
        while let Some(stage) = state.next_stage() {
            let result = self.run_stage(stage, task, &scope).await;
            state = state.transition(result);
            debug!("{} -> {:?}", task.source.key, state);
        }

        if let Err(e) = self.staging.release(&scope).await {
            warn!("🧹 Staging cleanup failed for {}: {}", task.source.key, e);
        }

        match state {
            TaskState::Failed(err) => TaskOutcome::failed(task, &err),
            _ => TaskOutcome::Uploaded {
                source_key: task.source.key.clone(),
                derivative_key: task.derivative_key.clone(),
            },
        }
    }

    async fn run_stage(
        &self,
        stage: Stage,
        task: &ReconciliationTask,
        scope: &StagingScope,
    ) -> anyhow::Result<()> {
        match stage {
            Stage::Download => {
                let bytes = with_timeout(
                    self.call_timeout,
                    "download",
                    self.fetcher.fetch(&task.source.key, &scope.source_path),
                )
                .await?;
                debug!("Downloaded {} ({} bytes)", task.source.key, bytes);
                Ok(())
            }
            Stage::Convert => {
                self.transcoder
                    .transcode(&scope.source_path, &scope.converted_path)
                    .await
            }
            Stage::Upload => {
                with_timeout(
                    self.call_timeout,
                    "upload",
                    self.storage.upload_from_path(
                        &task.derivative_key,
                        &scope.converted_path,
                        self.transcoder.content_type(),
                    ),
                )
                .await
            }
        }
    }
}
