//! Job and artifact entities plus the request DTOs shared by the API and
//! the client crate.
//!
//! Kept free of database types so the client can deserialize responses
//! without pulling in a driver.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::job::{JobStatus, JobType, MAX_DESCRIPTION_LEN, MAX_MESSAGE_LEN, MAX_NAME_LEN};
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// A unit of requested background work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub job_type: JobType,
    pub status: JobStatus,
    /// Percentage in `[0, 100]`.
    pub progress: i16,
    pub priority: i32,
    /// Opaque executor input. Always a JSON object.
    pub parameters: serde_json::Value,
    /// Opaque executor output, set only on completion.
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub cancel_reason: Option<String>,
    /// 1 for an original submission; a retry of attempt `n` is `n + 1`.
    pub attempt: i32,
    /// The finished job this attempt was retried from.
    pub retry_of_job_id: Option<DbId>,
    pub created_by: DbId,
    pub organization_id: DbId,
    pub scheduled_at: Option<Timestamp>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Job {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// An output file produced by a completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobArtifact {
    pub id: DbId,
    pub job_id: DbId,
    /// Free-form kind label, e.g. `"report"` or `"evidence_pack"`.
    pub artifact_type: String,
    pub file_name: String,
    pub content_type: String,
    /// Location relative to the artifact root.
    pub storage_path: String,
    pub file_size: i64,
    /// Lowercase hex SHA-256 of the stored bytes.
    pub checksum_sha256: String,
    pub created_at: Timestamp,
}

/// An artifact plus the URL it can be downloaded from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactWithUrl {
    #[serde(flatten)]
    pub artifact: JobArtifact,
    pub download_url: String,
}

/// Download path for an artifact, relative to the server root.
pub fn artifact_download_url(job_id: DbId, artifact_id: DbId) -> String {
    format!("/api/v1/jobs/{job_id}/artifacts/{artifact_id}/download")
}

impl From<JobArtifact> for ArtifactWithUrl {
    fn from(artifact: JobArtifact) -> Self {
        let download_url = artifact_download_url(artifact.job_id, artifact.id);
        Self {
            artifact,
            download_url,
        }
    }
}

/// One page of a job listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPage {
    pub items: Vec<Job>,
    /// Matching jobs across all pages.
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

/// Result of a retention purge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupResult {
    pub deleted_count: u64,
}

// ---------------------------------------------------------------------------
// Request DTOs
// ---------------------------------------------------------------------------

/// Body of `POST /jobs`.
///
/// `job_type` stays a string so an unknown value is reported as a
/// validation error rather than a deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitJob {
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub name: String,
    #[validate(length(max = 2000, message = "must be at most 2000 characters"))]
    pub description: Option<String>,
    pub job_type: String,
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
    pub priority: Option<i32>,
    pub scheduled_at: Option<Timestamp>,
}

/// Body of `PUT /jobs/{id}`. Only metadata is editable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateJob {
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 2000, message = "must be at most 2000 characters"))]
    pub description: Option<String>,
}

/// Body of `POST /jobs/{id}/cancel`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CancelJob {
    #[validate(length(max = 4000, message = "must be at most 4000 characters"))]
    pub reason: Option<String>,
}

/// Body of `POST /jobs/{id}/retry`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryJob {
    /// Replaces the original parameters on the new attempt when present.
    pub retry_parameters: Option<serde_json::Value>,
}

/// Body of `POST /jobs/{id}/progress`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub progress: i16,
}

/// Body of `POST /jobs/{id}/complete`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompleteJob {
    pub result: Option<serde_json::Value>,
}

/// Body of `POST /jobs/{id}/fail`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailJob {
    pub error_message: String,
}

// The derive attributes above cannot reference constants; keep them in
// step with the limits in `job`.
const _: () = {
    assert!(MAX_NAME_LEN == 255);
    assert!(MAX_DESCRIPTION_LEN == 2000);
    assert!(MAX_MESSAGE_LEN == 4000);
};
