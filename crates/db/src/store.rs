//! The [`JobStore`] trait and its error type.

use async_trait::async_trait;
use jobhub_core::error::CoreError;
use jobhub_core::model::{Job, JobArtifact, JobPage};
use jobhub_core::retention::RetentionPolicy;
use jobhub_core::stats::JobStats;
use jobhub_core::types::{DbId, Timestamp};

use crate::models::artifact::{NewArtifact, PurgeOutcome};
use crate::models::job::{JobChange, JobFilter, MetadataChange, NewJob};

/// Errors raised by a store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A domain rule rejected the operation (not found, conflict, ...).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The backing database failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Shorthand for the not-found error every store returns for a missing job.
pub fn job_not_found(id: DbId) -> StoreError {
    StoreError::Core(CoreError::NotFound { entity: "Job", id })
}

/// Durable record of jobs and their artifacts; source of truth for status.
///
/// Every mutating method is atomic per job: the status precondition is
/// checked and the change applied as one step, so of two racing
/// transitions exactly one succeeds and the other gets `Conflict`.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a job in `pending` state with progress 0.
    async fn insert(&self, job: NewJob) -> StoreResult<Job>;

    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<Job>>;

    /// List one page of jobs matching `filter`, with the total match count.
    async fn list(&self, filter: &JobFilter) -> StoreResult<JobPage>;

    /// Edit name/description. Status and lifecycle fields are untouched.
    async fn update_metadata(&self, id: DbId, change: MetadataChange) -> StoreResult<Job>;

    /// Apply a lifecycle change.
    ///
    /// Fails with `NotFound` for an unknown job, `Conflict` when the
    /// current status does not allow the change, and `Validation` for a
    /// progress value that is out of range or lower than the current one.
    async fn transition(&self, id: DbId, change: JobChange) -> StoreResult<Job>;

    /// Delete a job and its artifacts. Returns the deleted artifacts, or
    /// `None` if the job did not exist.
    async fn delete(&self, id: DbId) -> StoreResult<Option<Vec<JobArtifact>>>;

    /// Record an artifact. `Conflict` unless the owning job is completed.
    async fn insert_artifact(&self, artifact: NewArtifact) -> StoreResult<JobArtifact>;

    /// Artifacts of a job, oldest first.
    async fn list_artifacts(&self, job_id: DbId) -> StoreResult<Vec<JobArtifact>>;

    async fn find_artifact(&self, job_id: DbId, artifact_id: DbId)
        -> StoreResult<Option<JobArtifact>>;

    /// Aggregate statistics, optionally restricted to one organization.
    async fn stats(&self, organization_id: Option<DbId>) -> StoreResult<JobStats>;

    /// Delete every job created strictly before `cutoff` that `policy`
    /// allows. Eligibility is re-checked at delete time.
    async fn purge_created_before(
        &self,
        cutoff: Timestamp,
        policy: RetentionPolicy,
    ) -> StoreResult<PurgeOutcome>;

    /// Ids of running jobs whose last update is older than `updated_before`.
    async fn find_stale_running(&self, updated_before: Timestamp) -> StoreResult<Vec<DbId>>;
}
