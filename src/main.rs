use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use webp_backfill::config::{DownloadMode, ExistencePolicy, ReconcileConfig, parse_extension_list};
use webp_backfill::infrastructure::setup_reconciler;

const EXIT_ABORTED: u8 = 1;
const EXIT_TASK_FAILURES: u8 = 2;

/// Generates missing WebP siblings for the images in a bucket.
///
/// Options left unset fall back to the environment (or `.env`), then to the
/// built-in default.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Target bucket (falls back to BUCKET)
    #[arg(short, long)]
    bucket: Option<String>,

    /// Only reconcile keys under this prefix (falls back to PREFIX)
    #[arg(short, long)]
    prefix: Option<String>,

    /// Local directory for temporary files (falls back to STAGING_DIR)
    #[arg(long)]
    staging_dir: Option<PathBuf>,

    /// Comma separated source extensions, e.g. ".jpg,.png" (falls back to SOURCE_EXTENSIONS)
    #[arg(long)]
    source_extensions: Option<String>,

    /// Keys containing this marker are skipped, empty disables (falls back to EXCLUDE_MARKER)
    #[arg(long)]
    exclude_marker: Option<String>,

    /// Derivative extension (falls back to TARGET_EXTENSION)
    #[arg(long)]
    target_extension: Option<String>,

    /// Match extensions regardless of case (falls back to CASE_INSENSITIVE_EXTENSIONS)
    #[arg(long)]
    case_insensitive: bool,

    /// Maximum tasks in flight (falls back to CONCURRENCY)
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Timeout for each network call in seconds (falls back to CALL_TIMEOUT_SECS)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// "listing" or "live" (falls back to EXISTENCE_POLICY)
    #[arg(long)]
    existence_policy: Option<ExistencePolicy>,

    /// "storage" or "public" (falls back to DOWNLOAD_MODE)
    #[arg(long)]
    download_mode: Option<DownloadMode>,

    /// List and classify only, convert nothing
    #[arg(long)]
    dry_run: bool,

    /// Print the final report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Exit with status 2 when any task failed
    #[arg(long)]
    fail_on_task_error: bool,
}

impl Args {
    fn apply(&self, mut config: ReconcileConfig) -> ReconcileConfig {
        if let Some(bucket) = &self.bucket {
            config.bucket = bucket.clone();
        }
        if let Some(prefix) = &self.prefix {
            config.prefix = prefix.clone();
        }
        if let Some(dir) = &self.staging_dir {
            config.staging_dir = dir.clone();
        }
        if let Some(exts) = &self.source_extensions {
            config.source_extensions = parse_extension_list(exts);
        }
        if let Some(marker) = &self.exclude_marker {
            config.exclude_marker = marker.clone();
        }
        if let Some(target) = &self.target_extension {
            config.target_extension = webp_backfill::utils::keys::normalize_extension(target);
        }
        if self.case_insensitive {
            config.case_insensitive_extensions = true;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(secs) = self.timeout_secs {
            config.call_timeout = Duration::from_secs(secs);
        }
        if let Some(policy) = self.existence_policy {
            config.existence_policy = policy;
        }
        if let Some(mode) = self.download_mode {
            config.download_mode = mode;
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "webp_backfill=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match ReconcileConfig::from_env() {
        Ok(config) => args.apply(config),
        Err(e) => {
            error!("❌ {}", e);
            return Ok(ExitCode::from(EXIT_ABORTED));
        }
    };

    info!(
        "🚀 Starting WebP backfill [Bucket: {}, Prefix: '{}', Concurrency: {}, Dry run: {}]",
        config.bucket, config.prefix, config.concurrency, args.dry_run
    );

    let reconciler = match setup_reconciler(config).await {
        Ok(reconciler) => reconciler,
        Err(e) => {
            error!("❌ Setup failed: {:#}", e);
            return Ok(ExitCode::from(EXIT_ABORTED));
        }
    };

    let report = match reconciler.run(args.dry_run).await {
        Ok(report) => report,
        Err(e) => {
            error!("❌ Reconciliation aborted: {:#}", anyhow::Error::from(e));
            return Ok(ExitCode::from(EXIT_ABORTED));
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    let summary = report.summary();
    if report.has_failures() {
        warn!(
            "⚠️  Completed with failures: {} examined, {} missing, {} converted, {} failed",
            summary.examined, summary.missing, summary.succeeded, summary.failed
        );
        if args.fail_on_task_error {
            return Ok(ExitCode::from(EXIT_TASK_FAILURES));
        }
    } else {
        info!(
            "✅ Completed: {} examined, {} missing, {} converted",
            summary.examined, summary.missing, summary.succeeded
        );
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_help_names_env_fallbacks() {
        Args::command().debug_assert();
        let help = Args::command().render_long_help().to_string();
        assert!(help.contains("falls back to BUCKET"), "{}", help);
        assert!(help.contains("falls back to EXISTENCE_POLICY"), "{}", help);
        assert!(!help.contains("[env:"), "{}", help);
    }

    #[test]
    fn test_flags_override_environment_config() {
        let args = Args::parse_from([
            "webp-backfill",
            "--bucket",
            "media",
            "--source-extensions",
            "jpg,PNG",
            "--concurrency",
            "4",
            "--existence-policy",
            "live",
        ]);
        let config = args.apply(ReconcileConfig::default());
        assert_eq!(config.bucket, "media");
        assert_eq!(config.source_extensions, vec![".jpg", ".PNG"]);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.existence_policy, ExistencePolicy::Live);
    }
}
