//! In-memory [`JobStore`] used by tests and database-less deployments.
//!
//! All state sits behind one `RwLock`; every mutation checks its
//! precondition and applies the change while holding the write guard.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use jobhub_core::error::CoreError;
use jobhub_core::job::{validate_progress, JobStatus};
use jobhub_core::listing::JobSortField;
use jobhub_core::model::{Job, JobArtifact, JobPage};
use jobhub_core::retention::RetentionPolicy;
use jobhub_core::stats::{JobStats, StatsAccumulator};
use jobhub_core::types::{DbId, Timestamp};
use tokio::sync::RwLock;

use crate::models::artifact::{NewArtifact, PurgeOutcome};
use crate::models::job::{JobChange, JobFilter, MetadataChange, NewJob};
use crate::store::{job_not_found, JobStore, StoreResult};

#[derive(Default)]
struct State {
    jobs: BTreeMap<DbId, Job>,
    artifacts: BTreeMap<DbId, JobArtifact>,
}

/// Process-local job store.
pub struct MemoryJobStore {
    state: RwLock<State>,
    next_job_id: AtomicI64,
    next_artifact_id: AtomicI64,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            next_job_id: AtomicI64::new(1),
            next_artifact_id: AtomicI64::new(1),
        }
    }

    /// Overwrite a job's `created_at`, for age-based fixtures.
    #[cfg(any(test, feature = "test-util"))]
    pub async fn set_created_at(&self, id: DbId, created_at: Timestamp) -> StoreResult<Job> {
        let mut state = self.state.write().await;
        let job = state.jobs.get_mut(&id).ok_or_else(|| job_not_found(id))?;
        job.created_at = created_at;
        Ok(job.clone())
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply a lifecycle change to a job in place.
///
/// The job is left untouched when the change is rejected.
fn apply_change(job: &mut Job, change: JobChange, now: Timestamp) -> Result<(), CoreError> {
    let target = change.transition().apply_to(job.status)?;

    match change {
        JobChange::Start => {
            job.started_at.get_or_insert(now);
        }
        JobChange::Progress(percent) => {
            validate_progress(job.progress, percent)?;
            job.progress = percent;
        }
        JobChange::Complete(result) => {
            job.progress = 100;
            job.result = Some(result);
        }
        JobChange::Fail(message) => {
            job.error_message = Some(message);
        }
        JobChange::Cancel(reason) => {
            job.cancel_reason = reason;
        }
        JobChange::Timeout => {}
        JobChange::Expire { updated_before } => {
            if job.updated_at >= updated_before {
                return Err(recently_active(job.id));
            }
        }
    }

    if target.is_terminal() {
        job.completed_at.get_or_insert(now);
    }
    job.status = target;
    job.updated_at = now;
    Ok(())
}

fn recently_active(id: DbId) -> CoreError {
    CoreError::Conflict(format!("Job {id} reported activity and is no longer stale"))
}

fn compare(a: &Job, b: &Job, field: JobSortField) -> std::cmp::Ordering {
    let primary = match field {
        JobSortField::CreatedAt => a.created_at.cmp(&b.created_at),
        JobSortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        JobSortField::Name => a.name.cmp(&b.name),
        JobSortField::Priority => a.priority.cmp(&b.priority),
        JobSortField::Status => a.status.as_str().cmp(b.status.as_str()),
        JobSortField::JobType => a.job_type.as_str().cmp(b.job_type.as_str()),
    };
    primary.then(a.id.cmp(&b.id))
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, new: NewJob) -> StoreResult<Job> {
        let now = Utc::now();
        let id = self.next_job_id.fetch_add(1, Ordering::Relaxed);
        let job = Job {
            id,
            name: new.name,
            description: new.description,
            job_type: new.job_type,
            status: JobStatus::Pending,
            progress: 0,
            priority: new.priority,
            parameters: new.parameters,
            result: None,
            error_message: None,
            cancel_reason: None,
            attempt: new.attempt,
            retry_of_job_id: new.retry_of_job_id,
            created_by: new.created_by,
            organization_id: new.organization_id,
            scheduled_at: new.scheduled_at,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };

        self.state.write().await.jobs.insert(id, job.clone());
        Ok(job)
    }

    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<Job>> {
        Ok(self.state.read().await.jobs.get(&id).cloned())
    }

    async fn list(&self, filter: &JobFilter) -> StoreResult<JobPage> {
        let state = self.state.read().await;
        let mut matching: Vec<&Job> = state
            .jobs
            .values()
            .filter(|j| filter.organization_id.map_or(true, |org| j.organization_id == org))
            .filter(|j| filter.job_type.map_or(true, |t| j.job_type == t))
            .filter(|j| filter.status.map_or(true, |s| j.status == s))
            .collect();

        matching.sort_by(|a, b| {
            let ord = compare(a, b, filter.sort_by);
            if filter.sort_desc {
                ord.reverse()
            } else {
                ord
            }
        });

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(filter.skip.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .cloned()
            .collect();

        Ok(JobPage {
            items,
            total,
            skip: filter.skip,
            limit: filter.limit,
        })
    }

    async fn update_metadata(&self, id: DbId, change: MetadataChange) -> StoreResult<Job> {
        let mut state = self.state.write().await;
        let job = state.jobs.get_mut(&id).ok_or_else(|| job_not_found(id))?;

        if let Some(name) = change.name {
            job.name = name;
        }
        if let Some(description) = change.description {
            job.description = Some(description);
        }
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    async fn transition(&self, id: DbId, change: JobChange) -> StoreResult<Job> {
        let mut state = self.state.write().await;
        let job = state.jobs.get_mut(&id).ok_or_else(|| job_not_found(id))?;
        apply_change(job, change, Utc::now())?;
        Ok(job.clone())
    }

    async fn delete(&self, id: DbId) -> StoreResult<Option<Vec<JobArtifact>>> {
        let mut state = self.state.write().await;
        if state.jobs.remove(&id).is_none() {
            return Ok(None);
        }
        let (removed, kept): (BTreeMap<_, _>, BTreeMap<_, _>) =
            std::mem::take(&mut state.artifacts)
                .into_iter()
                .partition(|(_, a)| a.job_id == id);
        state.artifacts = kept;
        Ok(Some(removed.into_values().collect()))
    }

    async fn insert_artifact(&self, new: NewArtifact) -> StoreResult<JobArtifact> {
        let mut state = self.state.write().await;
        let job = state
            .jobs
            .get(&new.job_id)
            .ok_or_else(|| job_not_found(new.job_id))?;

        if job.status != JobStatus::Completed {
            return Err(CoreError::Conflict(format!(
                "Artifacts can only be recorded for completed jobs (job is {})",
                job.status
            ))
            .into());
        }
        if state
            .artifacts
            .values()
            .any(|a| a.storage_path == new.storage_path)
        {
            return Err(CoreError::Conflict(format!(
                "Storage path '{}' is already in use",
                new.storage_path
            ))
            .into());
        }

        let artifact = JobArtifact {
            id: self.next_artifact_id.fetch_add(1, Ordering::Relaxed),
            job_id: new.job_id,
            artifact_type: new.artifact_type,
            file_name: new.file_name,
            content_type: new.content_type,
            storage_path: new.storage_path,
            file_size: new.file_size,
            checksum_sha256: new.checksum_sha256,
            created_at: Utc::now(),
        };
        state.artifacts.insert(artifact.id, artifact.clone());
        Ok(artifact)
    }

    async fn list_artifacts(&self, job_id: DbId) -> StoreResult<Vec<JobArtifact>> {
        let state = self.state.read().await;
        Ok(state
            .artifacts
            .values()
            .filter(|a| a.job_id == job_id)
            .cloned()
            .collect())
    }

    async fn find_artifact(
        &self,
        job_id: DbId,
        artifact_id: DbId,
    ) -> StoreResult<Option<JobArtifact>> {
        let state = self.state.read().await;
        Ok(state
            .artifacts
            .get(&artifact_id)
            .filter(|a| a.job_id == job_id)
            .cloned())
    }

    async fn stats(&self, organization_id: Option<DbId>) -> StoreResult<JobStats> {
        let state = self.state.read().await;
        let mut acc = StatsAccumulator::new();
        for job in state
            .jobs
            .values()
            .filter(|j| organization_id.map_or(true, |org| j.organization_id == org))
        {
            acc.add(job.status, job.job_type, job.started_at, job.completed_at);
        }
        Ok(acc.finish())
    }

    async fn purge_created_before(
        &self,
        cutoff: Timestamp,
        policy: RetentionPolicy,
    ) -> StoreResult<PurgeOutcome> {
        let mut state = self.state.write().await;

        let doomed: Vec<DbId> = state
            .jobs
            .values()
            .filter(|j| policy.is_eligible(j.created_at, j.status, cutoff))
            .map(|j| j.id)
            .collect();

        let mut outcome = PurgeOutcome::default();
        for id in &doomed {
            if state.jobs.remove(id).is_some() {
                outcome.deleted_jobs += 1;
            }
        }

        let (removed, kept): (BTreeMap<_, _>, BTreeMap<_, _>) =
            std::mem::take(&mut state.artifacts)
                .into_iter()
                .partition(|(_, a)| doomed.contains(&a.job_id));
        state.artifacts = kept;
        outcome.artifacts = removed.into_values().collect();

        Ok(outcome)
    }

    async fn find_stale_running(&self, updated_before: Timestamp) -> StoreResult<Vec<DbId>> {
        let state = self.state.read().await;
        Ok(state
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Running && j.updated_at < updated_before)
            .map(|j| j.id)
            .collect())
    }
}
