//! Job submission.

use std::sync::Arc;

use jobhub_core::job::{normalize_payload, validate_name, JobType};
use jobhub_core::job_events::EVENT_JOB_SUBMITTED;
use jobhub_core::model::{Job, SubmitJob};
use jobhub_db::models::job::NewJob;
use jobhub_db::JobStore;
use jobhub_events::{EventBus, JobEvent};
use validator::Validate;

use super::Actor;
use crate::error::AppResult;

/// Validates new job requests and records them as `pending`.
///
/// Submission never starts execution; an executor picks the job up and
/// drives it through [`JobController`](super::JobController).
#[derive(Clone)]
pub struct JobSubmitter {
    store: Arc<dyn JobStore>,
    event_bus: Arc<EventBus>,
}

impl JobSubmitter {
    pub fn new(store: Arc<dyn JobStore>, event_bus: Arc<EventBus>) -> Self {
        Self { store, event_bus }
    }

    /// Accept a job on behalf of `actor`, owned by the actor's organization.
    pub async fn submit(&self, actor: &Actor, input: SubmitJob) -> AppResult<Job> {
        input.validate()?;
        validate_name(&input.name)?;
        let job_type = JobType::parse(&input.job_type)?;
        let parameters = normalize_payload("parameters", input.parameters)?;

        let job = self
            .store
            .insert(NewJob {
                name: input.name.trim().to_string(),
                description: input.description,
                job_type,
                parameters,
                priority: input.priority.unwrap_or(0),
                scheduled_at: input.scheduled_at,
                created_by: actor.user_id,
                organization_id: actor.organization_id,
                attempt: 1,
                retry_of_job_id: None,
            })
            .await?;

        tracing::info!(
            job_id = job.id,
            job_type = %job.job_type,
            user_id = actor.user_id,
            organization_id = actor.organization_id,
            "Job submitted",
        );

        self.event_bus.publish(
            JobEvent::for_job(EVENT_JOB_SUBMITTED, &job)
                .with_actor(Some(actor.user_id))
                .with_payload(serde_json::json!({ "job_type": job.job_type })),
        );

        Ok(job)
    }
}
