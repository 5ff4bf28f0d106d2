//! Job rows, inputs, and lifecycle changes.

use jobhub_core::error::CoreError;
use jobhub_core::job::{JobStatus, JobTransition, JobType};
use jobhub_core::listing::{JobSortField, DEFAULT_LIMIT};
use jobhub_core::model::Job;
use jobhub_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `jobs` table. `job_type` and `status` are stored as text
/// and checked on conversion.
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub job_type: String,
    pub status: String,
    pub progress: i16,
    pub priority: i32,
    pub parameters: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub cancel_reason: Option<String>,
    pub attempt: i32,
    pub retry_of_job_id: Option<DbId>,
    pub created_by: DbId,
    pub organization_id: DbId,
    pub scheduled_at: Option<Timestamp>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<JobRow> for Job {
    type Error = CoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let job_type = JobType::parse(&row.job_type).map_err(|_| {
            CoreError::Internal(format!("job {} has unknown job_type '{}'", row.id, row.job_type))
        })?;
        let status = JobStatus::parse(&row.status).map_err(|_| {
            CoreError::Internal(format!("job {} has unknown status '{}'", row.id, row.status))
        })?;

        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            job_type,
            status,
            progress: row.progress,
            priority: row.priority,
            parameters: row.parameters,
            result: row.result,
            error_message: row.error_message,
            cancel_reason: row.cancel_reason,
            attempt: row.attempt,
            retry_of_job_id: row.retry_of_job_id,
            created_by: row.created_by,
            organization_id: row.organization_id,
            scheduled_at: row.scheduled_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A validated job ready to be inserted in `pending` state.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub name: String,
    pub description: Option<String>,
    pub job_type: JobType,
    pub parameters: serde_json::Value,
    pub priority: i32,
    pub scheduled_at: Option<Timestamp>,
    pub created_by: DbId,
    pub organization_id: DbId,
    pub attempt: i32,
    pub retry_of_job_id: Option<DbId>,
}

/// Metadata edits. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct MetadataChange {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// An in-place lifecycle change with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum JobChange {
    Start,
    Progress(i16),
    Complete(serde_json::Value),
    Fail(String),
    Cancel(Option<String>),
    Timeout,
    /// Watchdog timeout: applies only while the job has not been updated
    /// since `updated_before`.
    Expire { updated_before: Timestamp },
}

impl JobChange {
    pub fn transition(&self) -> JobTransition {
        match self {
            Self::Start => JobTransition::Start,
            Self::Progress(_) => JobTransition::Progress,
            Self::Complete(_) => JobTransition::Complete,
            Self::Fail(_) => JobTransition::Fail,
            Self::Cancel(_) => JobTransition::Cancel,
            Self::Timeout | Self::Expire { .. } => JobTransition::Timeout,
        }
    }
}

/// Typed listing filter. Built by the API from query parameters.
#[derive(Debug, Clone)]
pub struct JobFilter {
    /// Restrict to one organization; `None` lists every organization.
    pub organization_id: Option<DbId>,
    pub job_type: Option<JobType>,
    pub status: Option<JobStatus>,
    pub sort_by: JobSortField,
    pub sort_desc: bool,
    pub skip: i64,
    pub limit: i64,
}

impl Default for JobFilter {
    /// Newest first, first page.
    fn default() -> Self {
        Self {
            organization_id: None,
            job_type: None,
            status: None,
            sort_by: JobSortField::CreatedAt,
            sort_desc: true,
            skip: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}
