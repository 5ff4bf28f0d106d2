//! Job lifecycle control.
//!
//! Every status change goes through [`JobController`]. The store applies
//! each change atomically, so when two transitions race exactly one wins
//! and the other surfaces as `Conflict`.

use std::sync::Arc;

use chrono::Utc;
use jobhub_core::error::CoreError;
use jobhub_core::job::{
    ensure_retryable, normalize_payload, validate_error_message, validate_name, validate_payload,
};
use jobhub_core::job_events::{
    EVENT_JOB_CANCELLED, EVENT_JOB_COMPLETED, EVENT_JOB_DELETED, EVENT_JOB_FAILED,
    EVENT_JOB_PROGRESS, EVENT_JOB_RETRIED, EVENT_JOB_STARTED, EVENT_JOB_TIMED_OUT,
    EVENT_JOB_UPDATED,
};
use jobhub_core::model::{CancelJob, Job, JobPage, RetryJob, UpdateJob};
use jobhub_core::stats::JobStats;
use jobhub_core::types::DbId;
use jobhub_db::models::job::{JobChange, JobFilter, MetadataChange, NewJob};
use jobhub_db::JobStore;
use jobhub_events::{EventBus, JobEvent};
use validator::Validate;

use super::{find_visible, Actor, ArtifactStorage};
use crate::error::{AppError, AppResult};

/// Enforces the job state machine and publishes lifecycle events.
#[derive(Clone)]
pub struct JobController {
    store: Arc<dyn JobStore>,
    event_bus: Arc<EventBus>,
    storage: ArtifactStorage,
}

impl JobController {
    pub fn new(store: Arc<dyn JobStore>, event_bus: Arc<EventBus>, storage: ArtifactStorage) -> Self {
        Self {
            store,
            event_bus,
            storage,
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn get(&self, actor: &Actor, id: DbId) -> AppResult<Job> {
        find_visible(self.store.as_ref(), actor, id).await
    }

    /// List jobs visible to `actor`. The organization filter is always
    /// taken from the actor, never from the caller's input.
    pub async fn list(&self, actor: &Actor, mut filter: JobFilter) -> AppResult<JobPage> {
        filter.organization_id = actor.scope();
        Ok(self.store.list(&filter).await?)
    }

    pub async fn stats(&self, actor: &Actor) -> AppResult<JobStats> {
        Ok(self.store.stats(actor.scope()).await?)
    }

    // -----------------------------------------------------------------------
    // Metadata
    // -----------------------------------------------------------------------

    /// Edit name and description. Never touches status.
    pub async fn update(&self, actor: &Actor, id: DbId, input: UpdateJob) -> AppResult<Job> {
        input.validate()?;
        if let Some(name) = &input.name {
            validate_name(name)?;
        }
        self.get(actor, id).await?;

        let job = self
            .store
            .update_metadata(
                id,
                MetadataChange {
                    name: input.name.map(|n| n.trim().to_string()),
                    description: input.description,
                },
            )
            .await?;

        tracing::info!(job_id = id, user_id = actor.user_id, "Job metadata updated");
        self.publish(EVENT_JOB_UPDATED, &job, Some(actor.user_id), serde_json::json!({}));
        Ok(job)
    }

    /// Delete a job with its artifacts, including the stored files.
    pub async fn delete(&self, actor: &Actor, id: DbId) -> AppResult<()> {
        let job = self.get(actor, id).await?;

        let artifacts = self
            .store
            .delete(id)
            .await?
            .ok_or(AppError::Core(CoreError::NotFound { entity: "Job", id }))?;
        self.storage.remove_all(&artifacts).await;

        tracing::info!(
            job_id = id,
            user_id = actor.user_id,
            artifacts = artifacts.len(),
            "Job deleted",
        );
        self.publish(EVENT_JOB_DELETED, &job, Some(actor.user_id), serde_json::json!({}));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// `pending -> running`.
    pub async fn start(&self, actor: &Actor, id: DbId) -> AppResult<Job> {
        self.get(actor, id).await?;
        self.apply(id, JobChange::Start, Some(actor.user_id)).await
    }

    /// Record progress on a running job. `percent` must be in `[0, 100]`
    /// and not lower than the current value.
    pub async fn report_progress(&self, actor: &Actor, id: DbId, percent: i16) -> AppResult<Job> {
        self.get(actor, id).await?;
        self.apply(id, JobChange::Progress(percent), Some(actor.user_id))
            .await
    }

    /// `running -> completed` with an optional result object.
    pub async fn complete(
        &self,
        actor: &Actor,
        id: DbId,
        result: Option<serde_json::Value>,
    ) -> AppResult<Job> {
        let result = normalize_payload("result", result)?;
        self.get(actor, id).await?;
        self.apply(id, JobChange::Complete(result), Some(actor.user_id))
            .await
    }

    /// `running -> failed` with an error message.
    pub async fn fail(&self, actor: &Actor, id: DbId, error_message: String) -> AppResult<Job> {
        validate_error_message(&error_message)?;
        self.get(actor, id).await?;
        self.apply(id, JobChange::Fail(error_message), Some(actor.user_id))
            .await
    }

    /// `pending|running -> cancelled`. Cancellation is cooperative: the
    /// executor notices the status and stops.
    pub async fn cancel(&self, actor: &Actor, id: DbId, input: CancelJob) -> AppResult<Job> {
        input.validate()?;
        let reason = input
            .reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        self.get(actor, id).await?;
        self.apply(id, JobChange::Cancel(reason), Some(actor.user_id))
            .await
    }

    /// `running -> timeout`, reported by an executor.
    pub async fn time_out(&self, actor: &Actor, id: DbId) -> AppResult<Job> {
        self.get(actor, id).await?;
        self.apply(id, JobChange::Timeout, Some(actor.user_id)).await
    }

    /// Time out every running job whose last update is older than
    /// `max_idle`. Returns the jobs that were moved to `timeout`.
    ///
    /// Any write to the job counts as activity, including a metadata edit
    /// through `update`. The idle check is repeated inside the store's
    /// update so a job that reports progress after the scan keeps running.
    pub async fn expire_stale(&self, max_idle: chrono::Duration) -> AppResult<Vec<Job>> {
        let updated_before = Utc::now() - max_idle;
        let ids = self.store.find_stale_running(updated_before).await?;

        let mut expired = Vec::with_capacity(ids.len());
        for id in ids {
            match self.apply(id, JobChange::Expire { updated_before }, None).await {
                Ok(job) => expired.push(job),
                // Finished, active again, or deleted since the scan.
                Err(AppError::Core(CoreError::Conflict(_) | CoreError::NotFound { .. })) => {
                    tracing::debug!(job_id = id, "Stale job changed before it could be timed out");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(expired)
    }

    /// Create a new attempt of a finished job.
    ///
    /// The original job is left untouched. The new job starts `pending`
    /// with progress 0, no result or error, `attempt` one higher, and
    /// either the override parameters or the original ones.
    pub async fn retry(&self, actor: &Actor, id: DbId, input: RetryJob) -> AppResult<Job> {
        let original = self.get(actor, id).await?;
        ensure_retryable(original.status)?;

        let parameters = match input.retry_parameters {
            None | Some(serde_json::Value::Null) => original.parameters.clone(),
            Some(overrides) => {
                validate_payload("retry_parameters", &overrides)?;
                overrides
            }
        };

        let job = self
            .store
            .insert(NewJob {
                name: original.name.clone(),
                description: original.description.clone(),
                job_type: original.job_type,
                parameters,
                priority: original.priority,
                scheduled_at: None,
                created_by: actor.user_id,
                organization_id: original.organization_id,
                attempt: original.attempt + 1,
                retry_of_job_id: Some(original.id),
            })
            .await?;

        tracing::info!(
            job_id = job.id,
            retry_of_job_id = original.id,
            attempt = job.attempt,
            user_id = actor.user_id,
            "Job retried",
        );
        self.publish(
            EVENT_JOB_RETRIED,
            &job,
            Some(actor.user_id),
            serde_json::json!({ "retry_of_job_id": original.id, "attempt": job.attempt }),
        );
        Ok(job)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn apply(&self, id: DbId, change: JobChange, actor: Option<DbId>) -> AppResult<Job> {
        let transition = change.transition();
        let (event_type, payload) = event_for(&change);

        let job = self.store.transition(id, change).await?;

        tracing::info!(
            job_id = id,
            transition = transition.as_str(),
            status = %job.status,
            progress = job.progress,
            "Job transition applied",
        );
        self.publish(event_type, &job, actor, payload);
        Ok(job)
    }

    fn publish(&self, event_type: &str, job: &Job, actor: Option<DbId>, payload: serde_json::Value) {
        self.event_bus.publish(
            JobEvent::for_job(event_type, job)
                .with_actor(actor)
                .with_payload(payload),
        );
    }
}

/// Event name and payload announcing a lifecycle change.
fn event_for(change: &JobChange) -> (&'static str, serde_json::Value) {
    match change {
        JobChange::Start => (EVENT_JOB_STARTED, serde_json::json!({})),
        JobChange::Progress(p) => (EVENT_JOB_PROGRESS, serde_json::json!({ "progress": p })),
        JobChange::Complete(_) => (EVENT_JOB_COMPLETED, serde_json::json!({})),
        JobChange::Fail(msg) => (EVENT_JOB_FAILED, serde_json::json!({ "error_message": msg })),
        JobChange::Cancel(reason) => (EVENT_JOB_CANCELLED, serde_json::json!({ "reason": reason })),
        JobChange::Timeout => (EVENT_JOB_TIMED_OUT, serde_json::json!({})),
        JobChange::Expire { .. } => (EVENT_JOB_TIMED_OUT, serde_json::json!({ "stale": true })),
    }
}
