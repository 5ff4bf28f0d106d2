//! Artifact registry: outputs of completed jobs.

use std::io;
use std::sync::Arc;

use jobhub_core::error::CoreError;
use jobhub_core::job::JobStatus;
use jobhub_core::job_events::EVENT_ARTIFACT_RECORDED;
use jobhub_core::model::JobArtifact;
use jobhub_core::types::DbId;
use jobhub_db::models::artifact::NewArtifact;
use jobhub_db::JobStore;
use jobhub_events::{EventBus, JobEvent};

use super::{find_visible, Actor, ArtifactStorage};
use crate::error::{AppError, AppResult};

/// Longest accepted `artifact_type` label.
const MAX_ARTIFACT_TYPE_LEN: usize = 100;

/// Longest accepted original file name.
const MAX_FILE_NAME_LEN: usize = 255;

/// Content type recorded when the uploader does not send one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// An uploaded artifact before it is stored.
#[derive(Debug, Clone)]
pub struct ArtifactUpload {
    pub artifact_type: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Records artifacts for completed jobs and serves them back.
#[derive(Clone)]
pub struct ArtifactRegistry {
    store: Arc<dyn JobStore>,
    event_bus: Arc<EventBus>,
    storage: ArtifactStorage,
}

impl ArtifactRegistry {
    pub fn new(store: Arc<dyn JobStore>, event_bus: Arc<EventBus>, storage: ArtifactStorage) -> Self {
        Self {
            store,
            event_bus,
            storage,
        }
    }

    /// Store the bytes and record the artifact. `Conflict` unless the job
    /// is completed.
    pub async fn record(
        &self,
        actor: &Actor,
        job_id: DbId,
        upload: ArtifactUpload,
    ) -> AppResult<JobArtifact> {
        let artifact_type = upload.artifact_type.trim().to_string();
        if artifact_type.is_empty() || artifact_type.chars().count() > MAX_ARTIFACT_TYPE_LEN {
            return Err(CoreError::Validation(format!(
                "artifact_type must be between 1 and {MAX_ARTIFACT_TYPE_LEN} characters"
            ))
            .into());
        }
        let file_name = upload.file_name.trim().to_string();
        if file_name.is_empty() || file_name.chars().count() > MAX_FILE_NAME_LEN {
            return Err(CoreError::Validation(format!(
                "file name must be between 1 and {MAX_FILE_NAME_LEN} characters"
            ))
            .into());
        }
        let content_type = upload
            .content_type
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        if content_type.len() > MAX_ARTIFACT_TYPE_LEN
            || !content_type.chars().all(|c| c.is_ascii_graphic() || c == ' ')
        {
            return Err(CoreError::Validation(format!("invalid content_type '{content_type}'")).into());
        }

        let job = find_visible(self.store.as_ref(), actor, job_id).await?;
        ensure_completed(job.status, "recorded")?;

        let stored = self
            .storage
            .write(job_id, &file_name, &upload.bytes)
            .await
            .map_err(|e| AppError::InternalError(format!("Failed to store artifact: {e}")))?;

        let inserted = self
            .store
            .insert_artifact(NewArtifact {
                job_id,
                artifact_type,
                file_name,
                content_type,
                storage_path: stored.storage_path.clone(),
                file_size: stored.file_size,
                checksum_sha256: stored.checksum_sha256,
            })
            .await;

        let artifact = match inserted {
            Ok(artifact) => artifact,
            Err(e) => {
                self.storage.remove(&stored.storage_path).await;
                return Err(e.into());
            }
        };

        tracing::info!(
            job_id,
            artifact_id = artifact.id,
            artifact_type = %artifact.artifact_type,
            file_size = artifact.file_size,
            "Artifact recorded",
        );
        self.event_bus.publish(
            JobEvent::for_job(EVENT_ARTIFACT_RECORDED, &job)
                .with_actor(Some(actor.user_id))
                .with_payload(serde_json::json!({
                    "artifact_id": artifact.id,
                    "artifact_type": artifact.artifact_type,
                })),
        );

        Ok(artifact)
    }

    /// Artifacts of a job. Empty for any job that is not completed.
    pub async fn list(&self, actor: &Actor, job_id: DbId) -> AppResult<Vec<JobArtifact>> {
        let job = find_visible(self.store.as_ref(), actor, job_id).await?;
        if job.status != JobStatus::Completed {
            return Ok(Vec::new());
        }
        Ok(self.store.list_artifacts(job_id).await?)
    }

    /// Open an artifact for download.
    ///
    /// `NotFound` when the job or artifact is missing or the artifact
    /// belongs to another job; `Conflict` when the job is not completed.
    pub async fn open(
        &self,
        actor: &Actor,
        job_id: DbId,
        artifact_id: DbId,
    ) -> AppResult<(JobArtifact, tokio::fs::File)> {
        let job = find_visible(self.store.as_ref(), actor, job_id).await?;
        ensure_completed(job.status, "downloaded")?;

        let artifact = self
            .store
            .find_artifact(job_id, artifact_id)
            .await?
            .ok_or(AppError::Core(artifact_not_found(artifact_id)))?;

        let file = self
            .storage
            .open(&artifact.storage_path)
            .await
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => {
                    tracing::warn!(
                        job_id,
                        artifact_id,
                        storage_path = %artifact.storage_path,
                        "Artifact row has no stored file",
                    );
                    AppError::Core(artifact_not_found(artifact_id))
                }
                _ => AppError::InternalError(format!("Failed to open artifact: {e}")),
            })?;

        Ok((artifact, file))
    }
}

fn ensure_completed(status: JobStatus, action: &str) -> Result<(), CoreError> {
    if status == JobStatus::Completed {
        Ok(())
    } else {
        Err(CoreError::Conflict(format!(
            "Artifacts can only be {action} for completed jobs (job is {status})"
        )))
    }
}

fn artifact_not_found(id: DbId) -> CoreError {
    CoreError::NotFound {
        entity: "JobArtifact",
        id,
    }
}
