use crate::error::ConfigError;
use crate::utils::keys::normalize_extension;
use serde::Serialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// How derivative existence is decided for candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExistencePolicy {
    /// Membership in the key set of the single listing pass
    Listing,
    /// Listing first, then a HEAD request for every listing miss
    Live,
}

impl FromStr for ExistencePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "listing" => Ok(Self::Listing),
            "live" => Ok(Self::Live),
            other => Err(ConfigError::Invalid {
                field: "existence_policy",
                message: format!("expected 'listing' or 'live', got '{}'", other),
            }),
        }
    }
}

/// Where source bytes are fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadMode {
    /// Authenticated GetObject through the storage client
    Storage,
    /// Plain HTTP(S) GET against the bucket's public URL
    Public,
}

impl FromStr for DownloadMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "storage" => Ok(Self::Storage),
            "public" => Ok(Self::Public),
            other => Err(ConfigError::Invalid {
                field: "download_mode",
                message: format!("expected 'storage' or 'public', got '{}'", other),
            }),
        }
    }
}

/// S3-compatible client settings
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    /// Custom endpoint (MinIO, GCS interop). None uses the AWS default.
    pub endpoint: Option<String>,
    pub region: String,
    pub force_path_style: bool,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

/// Settings for one reconciliation pass
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Target bucket (required)
    pub bucket: String,

    /// Key prefix to restrict the listing (default: whole bucket)
    pub prefix: String,

    /// Local directory holding per-task staging scopes
    pub staging_dir: PathBuf,

    /// Recognized source image extensions (default: .jpg, .jpeg, .png)
    pub source_extensions: Vec<String>,

    /// Keys containing this marker are never candidates (default: ".bk.")
    pub exclude_marker: String,

    /// Derivative extension (default: ".webp")
    pub target_extension: String,

    pub case_insensitive_extensions: bool,

    /// Maximum tasks in flight (default: 1, strictly sequential)
    pub concurrency: usize,

    /// Upper bound for every single network call (default: 60s)
    pub call_timeout: Duration,

    pub existence_policy: ExistencePolicy,

    pub download_mode: DownloadMode,

    /// Base URL used when `download_mode` is `Public`
    pub public_base_url: String,

    pub storage: StorageConfig,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            prefix: String::new(),
            staging_dir: env::temp_dir().join("webp-backfill"),
            source_extensions: vec![".jpg".to_string(), ".jpeg".to_string(), ".png".to_string()],
            exclude_marker: ".bk.".to_string(),
            target_extension: ".webp".to_string(),
            case_insensitive_extensions: false,
            concurrency: 1,
            call_timeout: Duration::from_secs(60),
            existence_policy: ExistencePolicy::Listing,
            download_mode: DownloadMode::Storage,
            public_base_url: "https://storage.googleapis.com".to_string(),
            storage: StorageConfig {
                endpoint: None,
                region: "us-east-1".to_string(),
                force_path_style: false,
                access_key: None,
                secret_key: None,
            },
        }
    }
}

impl ReconcileConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let default = Self::default();

        Ok(Self {
            bucket: env::var("BUCKET").unwrap_or(default.bucket),

            prefix: env::var("PREFIX").unwrap_or(default.prefix),

            staging_dir: env::var("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.staging_dir),

            source_extensions: env::var("SOURCE_EXTENSIONS")
                .ok()
                .map(|v| parse_extension_list(&v))
                .unwrap_or(default.source_extensions),

            exclude_marker: env::var("EXCLUDE_MARKER").unwrap_or(default.exclude_marker),

            target_extension: env::var("TARGET_EXTENSION")
                .map(|v| normalize_extension(&v))
                .unwrap_or(default.target_extension),

            case_insensitive_extensions: env::var("CASE_INSENSITIVE_EXTENSIONS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(default.case_insensitive_extensions),

            concurrency: env::var("CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.concurrency),

            call_timeout: env::var("CALL_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.call_timeout),

            existence_policy: match env::var("EXISTENCE_POLICY") {
                Ok(v) => v.parse()?,
                Err(_) => default.existence_policy,
            },

            download_mode: match env::var("DOWNLOAD_MODE") {
                Ok(v) => v.parse()?,
                Err(_) => default.download_mode,
            },

            public_base_url: env::var("PUBLIC_BASE_URL").unwrap_or(default.public_base_url),

            storage: StorageConfig {
                endpoint: env::var("S3_ENDPOINT").ok().filter(|v| !v.is_empty()),
                region: env::var("S3_REGION").unwrap_or(default.storage.region),
                force_path_style: env::var("S3_FORCE_PATH_STYLE")
                    .map(|v| v.to_lowercase() == "true" || v == "1")
                    .unwrap_or(default.storage.force_path_style),
                access_key: env::var("S3_ACCESS_KEY").ok(),
                secret_key: env::var("S3_SECRET_KEY").ok(),
            },
        })
    }

    /// Rejects settings a run cannot proceed with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.trim().is_empty() {
            return Err(ConfigError::Missing("bucket"));
        }

        let target = normalize_extension(&self.target_extension);
        if target.len() < 2 {
            return Err(ConfigError::Invalid {
                field: "target_extension",
                message: "must not be empty".to_string(),
            });
        }

        let sources: Vec<String> = self
            .source_extensions
            .iter()
            .map(|e| normalize_extension(e))
            .filter(|e| !e.is_empty())
            .collect();
        if sources.is_empty() {
            return Err(ConfigError::Invalid {
                field: "source_extensions",
                message: "at least one source extension is required".to_string(),
            });
        }

        let clashes = if self.case_insensitive_extensions {
            sources.iter().any(|s| s.eq_ignore_ascii_case(&target))
        } else {
            sources.iter().any(|s| *s == target)
        };
        if clashes {
            return Err(ConfigError::Invalid {
                field: "source_extensions",
                message: format!("target extension '{}' cannot also be a source", target),
            });
        }

        if self.concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "concurrency",
                message: "must be at least 1".to_string(),
            });
        }

        if self.call_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "call_timeout",
                message: "must be greater than zero".to_string(),
            });
        }

        if self.download_mode == DownloadMode::Public && self.public_base_url.trim().is_empty() {
            return Err(ConfigError::Missing("public_base_url"));
        }

        Ok(())
    }
}

/// Parses a comma separated list such as `jpg, .png`.
pub fn parse_extension_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(normalize_extension)
        .filter(|e| !e.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_bucket() -> ReconcileConfig {
        ReconcileConfig {
            bucket: "images".to_string(),
            ..ReconcileConfig::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = ReconcileConfig::default();
        assert_eq!(config.source_extensions, vec![".jpg", ".jpeg", ".png"]);
        assert_eq!(config.exclude_marker, ".bk.");
        assert_eq!(config.target_extension, ".webp");
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.existence_policy, ExistencePolicy::Listing);
        assert_eq!(config.download_mode, DownloadMode::Storage);
    }

    #[test]
    fn test_missing_bucket_is_rejected() {
        let config = ReconcileConfig::default();
        assert_eq!(config.validate(), Err(ConfigError::Missing("bucket")));
        assert!(with_bucket().validate().is_ok());
    }

    #[test]
    fn test_target_as_source_is_rejected() {
        let mut config = with_bucket();
        config.source_extensions.push("webp".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "source_extensions",
                ..
            })
        ));
    }

    #[test]
    fn test_zero_concurrency_and_timeout_are_rejected() {
        let mut config = with_bucket();
        config.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = with_bucket();
        config.call_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_extension_list() {
        assert_eq!(parse_extension_list("jpg, .png,,gif "), vec![".jpg", ".png", ".gif"]);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("LIVE".parse::<ExistencePolicy>(), Ok(ExistencePolicy::Live));
        assert_eq!("public".parse::<DownloadMode>(), Ok(DownloadMode::Public));
        assert!("sometimes".parse::<ExistencePolicy>().is_err());
    }
}
