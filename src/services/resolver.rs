use crate::config::ReconcileConfig;
use crate::models::{ReconciliationTask, RemoteObject, SkipReason};
use crate::services::storage::StorageService;
use crate::utils::keys::{self, ExtensionMatcher};
use crate::utils::timeout::with_timeout;
use std::borrow::Cow;
use std::collections::HashSet;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedObject {
    pub object: RemoteObject,
    pub reason: SkipReason,
}

/// Partition of a listing snapshot.
#[derive(Debug, Default)]
pub struct Classification {
    /// Sources whose derivative is missing, in listing order
    pub tasks: Vec<ReconciliationTask>,
    /// Sources whose derivative already exists
    pub satisfied: Vec<RemoteObject>,
    pub skipped: Vec<SkippedObject>,
}

impl Classification {
    pub fn examined(&self) -> usize {
        self.tasks.len() + self.satisfied.len() + self.skipped.len()
    }
}

/// Decides which objects need a derivative.
#[derive(Debug, Clone)]
pub struct DerivativeResolver {
    sources: ExtensionMatcher,
    target: ExtensionMatcher,
    target_extension: String,
    exclude_marker: String,
    case_insensitive: bool,
}

impl DerivativeResolver {
    pub fn new(
        source_extensions: &[String],
        target_extension: &str,
        exclude_marker: &str,
        case_insensitive: bool,
    ) -> Self {
        Self {
            sources: ExtensionMatcher::new(source_extensions, case_insensitive),
            target: ExtensionMatcher::new([target_extension], case_insensitive),
            target_extension: keys::normalize_extension(target_extension),
            exclude_marker: exclude_marker.to_string(),
            case_insensitive,
        }
    }

    pub fn from_config(config: &ReconcileConfig) -> Self {
        Self::new(
            &config.source_extensions,
            &config.target_extension,
            &config.exclude_marker,
            config.case_insensitive_extensions,
        )
    }

    pub fn derivative_key(&self, key: &str) -> String {
        keys::derivative_key(key, &self.target_extension)
    }

    /// Why `key` is not a conversion candidate, if it is not one.
    pub fn skip_reason(&self, key: &str) -> Option<SkipReason> {
        if self.target.matches_key(key) {
            Some(SkipReason::AlreadyDerivative)
        } else if !self.exclude_marker.is_empty() && key.contains(&self.exclude_marker) {
            Some(SkipReason::Excluded)
        } else if !self.sources.matches_key(key) {
            Some(SkipReason::UnsupportedExtension)
        } else {
            None
        }
    }

    /// Key used for existence lookups. Under the case-insensitive policy the
    /// extension is lowercased so `PHOTO.WEBP` satisfies `PHOTO.JPG`.
    fn lookup_key<'a>(&self, key: &'a str) -> Cow<'a, str> {
        if !self.case_insensitive {
            return Cow::Borrowed(key);
        }
        match keys::extension(key) {
            Some(ext) if ext.chars().any(|c| c.is_uppercase()) => {
                let stem = &key[..key.len() - ext.len()];
                Cow::Owned(format!("{}{}", stem, ext.to_lowercase()))
            }
            _ => Cow::Borrowed(key),
        }
    }

    /// Stable partition of `objects` against the snapshot's own key set.
    ///
    /// When several sources map to one derivative the first in listing order
    /// claims it and the rest are skipped.
    pub fn classify(&self, objects: &[RemoteObject]) -> Classification {
        let existing: HashSet<Cow<'_, str>> =
            objects.iter().map(|o| self.lookup_key(&o.key)).collect();
        let mut claimed: HashSet<String> = HashSet::new();
        let mut classification = Classification::default();

        for object in objects {
            if let Some(reason) = self.skip_reason(&object.key) {
                classification.skipped.push(SkippedObject {
                    object: object.clone(),
                    reason,
                });
                continue;
            }

            let derivative_key = self.derivative_key(&object.key);
            let lookup = self.lookup_key(&derivative_key).into_owned();
            if existing.contains(lookup.as_str()) {
                classification.satisfied.push(object.clone());
            } else if !claimed.insert(lookup) {
                tracing::warn!(
                    "⚠️  {} maps to {} which an earlier source already claims, skipping",
                    object.key,
                    derivative_key
                );
                classification.skipped.push(SkippedObject {
                    object: object.clone(),
                    reason: SkipReason::DerivativeClaimed,
                });
            } else {
                classification.tasks.push(ReconciliationTask {
                    source: object.clone(),
                    derivative_key,
                });
            }
        }

        classification
    }

    /// Re-checks every listing miss with a live existence call.
    ///
    /// Derivatives that appeared since the listing become satisfied. A failed
    /// check leaves the task in place.
    pub async fn recheck_live(
        &self,
        classification: &mut Classification,
        storage: &dyn StorageService,
        call_timeout: Duration,
    ) {
        let tasks = std::mem::take(&mut classification.tasks);
        for task in tasks {
            let exists = with_timeout(
                call_timeout,
                "existence check",
                storage.file_exists(&task.derivative_key),
            )
            .await;

            match exists {
                Ok(true) => {
                    tracing::info!(
                        "Derivative {} appeared since listing, skipping {}",
                        task.derivative_key,
                        task.source.key
                    );
                    classification.satisfied.push(task.source);
                }
                Ok(false) => classification.tasks.push(task),
                Err(e) => {
                    tracing::warn!(
                        "Existence check for {} failed, treating as missing: {:#}",
                        task.derivative_key,
                        e
                    );
                    classification.tasks.push(task);
                }
            }
        }
    }
}
