use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Listing or bucket access failure. Always fatal for the run.
#[derive(Error, Debug)]
pub enum ListError {
    #[error("Bucket '{bucket}' is not accessible: {source}")]
    Access {
        bucket: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Listing '{bucket}' under prefix '{prefix}' failed: {source}")]
    Listing {
        bucket: String,
        prefix: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Pipeline stage a task failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Download,
    Convert,
    Upload,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Download => "download",
            Stage::Convert => "convert",
            Stage::Upload => "upload",
        };
        f.write_str(name)
    }
}

/// Per-task failure. Recorded in the report, never aborts the run.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Download error: {0:#}")]
    Download(#[source] anyhow::Error),

    #[error("Convert error: {0:#}")]
    Convert(#[source] anyhow::Error),

    #[error("Upload error: {0:#}")]
    Upload(#[source] anyhow::Error),
}

impl TaskError {
    pub fn stage(&self) -> Stage {
        match self {
            TaskError::Download(_) => Stage::Download,
            TaskError::Convert(_) => Stage::Convert,
            TaskError::Upload(_) => Stage::Upload,
        }
    }
}

/// Failure to reclaim staging space. Logged only.
#[derive(Error, Debug)]
#[error("Failed to remove staging path {path}: {source}")]
pub struct CleanupError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

/// Errors that abort a reconciliation run before any task executes.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    List(#[from] ListError),

    #[error("Staging directory {path} is unusable: {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
