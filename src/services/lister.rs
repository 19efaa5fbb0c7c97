use crate::error::ListError;
use crate::models::RemoteObject;
use crate::services::storage::StorageService;
use crate::utils::timeout::with_timeout;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Produces the complete listing snapshot a run works from.
pub struct ObjectLister {
    storage: Arc<dyn StorageService>,
    call_timeout: Duration,
}

impl ObjectLister {
    pub fn new(storage: Arc<dyn StorageService>, call_timeout: Duration) -> Self {
        Self {
            storage,
            call_timeout,
        }
    }

    /// Checks bucket access, then pages through everything under `prefix`.
    ///
    /// The result is deduplicated by key, in first-seen order, and never
    /// contains directory placeholders (keys ending in `/`). Any failure is
    /// fatal; a partial snapshot is never returned.
    pub async fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>, ListError> {
        let bucket = self.storage.bucket().to_string();

        with_timeout(self.call_timeout, "bucket access check", self.storage.check_access())
            .await
            .map_err(|source| ListError::Access {
                bucket: bucket.clone(),
                source,
            })?;

        let mut seen = HashSet::new();
        let mut objects = Vec::new();
        let mut token = None;
        let mut pages = 0usize;

        loop {
            let page = with_timeout(
                self.call_timeout,
                "listing page",
                self.storage.list_page(prefix, token.take()),
            )
            .await
            .map_err(|source| ListError::Listing {
                bucket: bucket.clone(),
                prefix: prefix.to_string(),
                source,
            })?;
            pages += 1;

            for object in page.objects {
                if object.key.ends_with('/') {
                    continue;
                }
                if seen.insert(object.key.clone()) {
                    objects.push(object);
                }
            }

            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        tracing::debug!(
            "Listed {} objects in {} page(s) under '{}'",
            objects.len(),
            pages,
            prefix
        );
        Ok(objects)
    }
}
