use crate::error::{Stage, TaskError};
use crate::utils::keys;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One object from a listing snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteObject {
    pub key: String,
    pub size: Option<i64>,
}

impl RemoteObject {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size: None,
        }
    }

    pub fn with_size(key: impl Into<String>, size: i64) -> Self {
        Self {
            key: key.into(),
            size: Some(size),
        }
    }

    pub fn base_name(&self) -> &str {
        keys::base_name(&self.key)
    }

    pub fn extension(&self) -> Option<&str> {
        keys::extension(&self.key)
    }

    /// File name without the directory prefix
    pub fn file_name(&self) -> &str {
        keys::split_key(&self.key).1
    }
}

/// A source object whose derivative is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationTask {
    pub source: RemoteObject,
    pub derivative_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AlreadyDerivative,
    Excluded,
    UnsupportedExtension,
    /// Another source earlier in the listing produces the same derivative
    DerivativeClaimed,
}

/// Terminal result of one task.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Uploaded {
        source_key: String,
        derivative_key: String,
    },
    Failed {
        source_key: String,
        derivative_key: String,
        stage: Stage,
        cause: String,
    },
}

impl TaskOutcome {
    pub fn failed(task: &ReconciliationTask, err: &TaskError) -> Self {
        TaskOutcome::Failed {
            source_key: task.source.key.clone(),
            derivative_key: task.derivative_key.clone(),
            stage: err.stage(),
            cause: format!("{:#}", err),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Uploaded { .. })
    }

    pub fn source_key(&self) -> &str {
        match self {
            TaskOutcome::Uploaded { source_key, .. } | TaskOutcome::Failed { source_key, .. } => {
                source_key
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub examined: usize,
    pub missing: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn nothing_to_do(&self) -> bool {
        self.missing == 0
    }
}

/// Everything a finished pass reports.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub bucket: String,
    pub prefix: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub satisfied: usize,
    pub skipped: usize,
    pub planned: Vec<ReconciliationTask>,
    pub outcomes: Vec<TaskOutcome>,
}

impl RunReport {
    /// Derived counts. In a dry run nothing has succeeded or failed.
    pub fn summary(&self) -> RunSummary {
        let succeeded = self.outcomes.iter().filter(|o| o.is_success()).count();
        RunSummary {
            examined: self.satisfied + self.skipped + self.planned.len(),
            missing: self.planned.len(),
            succeeded,
            failed: self.outcomes.len() - succeeded,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|o| !o.is_success())
    }
}
