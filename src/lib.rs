pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

pub use config::ReconcileConfig;
pub use error::{ListError, ReconcileError, Stage, TaskError};
pub use models::{RunReport, RunSummary, TaskOutcome};
pub use services::reconciler::Reconciler;
