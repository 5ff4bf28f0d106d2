//! Age-based cleanup of old jobs.

use std::sync::Arc;

use chrono::Utc;
use jobhub_core::model::CleanupResult;
use jobhub_core::retention::{cutoff, RetentionPolicy};
use jobhub_db::JobStore;

use super::ArtifactStorage;
use crate::error::AppResult;

/// Purges jobs created more than `days` ago, with their artifacts and
/// stored files.
#[derive(Clone)]
pub struct RetentionCleaner {
    store: Arc<dyn JobStore>,
    storage: ArtifactStorage,
    policy: RetentionPolicy,
}

impl RetentionCleaner {
    pub fn new(store: Arc<dyn JobStore>, storage: ArtifactStorage, policy: RetentionPolicy) -> Self {
        Self {
            store,
            storage,
            policy,
        }
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Delete every eligible job with `created_at < now - days`.
    ///
    /// Returns the exact number of jobs removed. Running it again with the
    /// same `days` removes nothing new. Negative `days` is a validation
    /// error.
    pub async fn cleanup_older_than(&self, days: i64) -> AppResult<CleanupResult> {
        let cutoff = cutoff(Utc::now(), days)?;
        let outcome = self.store.purge_created_before(cutoff, self.policy).await?;
        self.storage.remove_all(&outcome.artifacts).await;

        if outcome.deleted_jobs > 0 {
            tracing::info!(
                days,
                %cutoff,
                deleted = outcome.deleted_jobs,
                artifacts = outcome.artifacts.len(),
                include_active = self.policy.include_active,
                "Retention: purged old jobs",
            );
        } else {
            tracing::debug!(days, %cutoff, "Retention: no jobs to purge");
        }

        Ok(CleanupResult {
            deleted_count: outcome.deleted_jobs,
        })
    }
}
