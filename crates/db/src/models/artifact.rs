//! Artifact rows and inputs.

use jobhub_core::model::JobArtifact;
use jobhub_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `job_artifacts` table.
#[derive(Debug, Clone, FromRow)]
pub struct ArtifactRow {
    pub id: DbId,
    pub job_id: DbId,
    pub artifact_type: String,
    pub file_name: String,
    pub content_type: String,
    pub storage_path: String,
    pub file_size: i64,
    pub checksum_sha256: String,
    pub created_at: Timestamp,
}

impl From<ArtifactRow> for JobArtifact {
    fn from(row: ArtifactRow) -> Self {
        Self {
            id: row.id,
            job_id: row.job_id,
            artifact_type: row.artifact_type,
            file_name: row.file_name,
            content_type: row.content_type,
            storage_path: row.storage_path,
            file_size: row.file_size,
            checksum_sha256: row.checksum_sha256,
            created_at: row.created_at,
        }
    }
}

/// Metadata for an artifact whose bytes are already stored.
#[derive(Debug, Clone)]
pub struct NewArtifact {
    pub job_id: DbId,
    pub artifact_type: String,
    pub file_name: String,
    pub content_type: String,
    pub storage_path: String,
    pub file_size: i64,
    pub checksum_sha256: String,
}

/// What a retention purge removed.
#[derive(Debug, Clone, Default)]
pub struct PurgeOutcome {
    pub deleted_jobs: u64,
    /// Artifacts of the deleted jobs, so the caller can remove stored files.
    pub artifacts: Vec<JobArtifact>,
}
