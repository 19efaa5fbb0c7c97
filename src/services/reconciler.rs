use crate::config::{ExistencePolicy, ReconcileConfig};
use crate::error::{ConfigError, ReconcileError};
use crate::models::{ReconciliationTask, RunReport, TaskOutcome};
use crate::services::fetcher::ObjectFetcher;
use crate::services::lister::ObjectLister;
use crate::services::pipeline::Pipeline;
use crate::services::resolver::DerivativeResolver;
use crate::services::staging::StagingArea;
use crate::services::storage::StorageService;
use crate::services::transcoder::Transcoder;
use chrono::Utc;
use futures::StreamExt;
use futures::stream;
use std::sync::Arc;
use tracing::{error, info};

/// Runs one reconciliation pass over a bucket or prefix.
pub struct Reconciler {
    config: ReconcileConfig,
    storage: Arc<dyn StorageService>,
    staging: Arc<dyn StagingArea>,
    lister: ObjectLister,
    resolver: DerivativeResolver,
    pipeline: Pipeline,
}

impl Reconciler {
    pub fn new(
        config: ReconcileConfig,
        storage: Arc<dyn StorageService>,
        fetcher: Arc<dyn ObjectFetcher>,
        transcoder: Arc<dyn Transcoder>,
        staging: Arc<dyn StagingArea>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let lister = ObjectLister::new(storage.clone(), config.call_timeout);
        let resolver = DerivativeResolver::from_config(&config);
        let pipeline = Pipeline::new(
            fetcher,
            transcoder,
            storage.clone(),
            staging.clone(),
            config.call_timeout,
        );

        Ok(Self {
            config,
            storage,
            staging,
            lister,
            resolver,
            pipeline,
        })
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Lists, classifies and processes every missing derivative.
    ///
    /// Listing and access failures abort before any task starts. Task
    /// failures are recorded in the report and never stop the run. With
    /// `dry_run` the planned tasks are reported but not executed.
    pub async fn run(&self, dry_run: bool) -> Result<RunReport, ReconcileError> {
        let started_at = Utc::now();
        let scope = if self.config.prefix.is_empty() {
            "(whole bucket)"
        } else {
            self.config.prefix.as_str()
        };
        info!("🔍 Listing bucket '{}' {}", self.config.bucket, scope);

        let objects = self.lister.list(&self.config.prefix).await?;

        let mut classification = self.resolver.classify(&objects);
        if self.config.existence_policy == ExistencePolicy::Live && !classification.tasks.is_empty()
        {
            self.resolver
                .recheck_live(
                    &mut classification,
                    self.storage.as_ref(),
                    self.config.call_timeout,
                )
                .await;
        }

        info!(
            "📋 Examined {} objects: {} missing, {} satisfied, {} skipped",
            classification.examined(),
            classification.tasks.len(),
            classification.satisfied.len(),
            classification.skipped.len()
        );

        let mut report = RunReport {
            bucket: self.config.bucket.clone(),
            prefix: self.config.prefix.clone(),
            dry_run,
            started_at,
            finished_at: started_at,
            satisfied: classification.satisfied.len(),
            skipped: classification.skipped.len(),
            planned: classification.tasks,
            outcomes: Vec::new(),
        };

        if report.planned.is_empty() {
            info!("✨ Nothing to do, every derivative exists");
            report.finished_at = Utc::now();
            return Ok(report);
        }

        if dry_run {
            for task in &report.planned {
                info!("📝 Would convert {} -> {}", task.source.key, task.derivative_key);
            }
            report.finished_at = Utc::now();
            return Ok(report);
        }

        self.staging
            .prepare()
            .await
            .map_err(|source| ReconcileError::Staging {
                path: self.config.staging_dir.clone(),
                source,
            })?;

        report.outcomes = stream::iter(report.planned.iter())
            .map(|task| self.process(task))
            .buffered(self.config.concurrency)
            .collect()
            .await;
        report.finished_at = Utc::now();

        let summary = report.summary();
        info!(
            "🏁 Run finished: {} converted, {} failed of {} missing",
            summary.succeeded, summary.failed, summary.missing
        );
        Ok(report)
    }

    async fn process(&self, task: &ReconciliationTask) -> TaskOutcome {
        let outcome = self.pipeline.execute(task).await;
        match &outcome {
            TaskOutcome::Uploaded {
                source_key,
                derivative_key,
            } => info!("✅ {} -> {}", source_key, derivative_key),
            TaskOutcome::Failed {
                source_key,
                stage,
                cause,
                ..
            } => error!("❌ {} failed at {}: {}", source_key, stage, cause),
        }
        outcome
    }
}
