//! PostgreSQL [`JobStore`] over the `jobs` and `job_artifacts` tables.
//!
//! Lifecycle changes are single conditional `UPDATE ... WHERE status = ANY(...)`
//! statements, so the status check and the write are one atomic step. When
//! no row matches, the job is re-read to report why.

use async_trait::async_trait;
use jobhub_core::error::CoreError;
use jobhub_core::job::{validate_progress, JobStatus, JobTransition, JobType};
use jobhub_core::model::{Job, JobArtifact, JobPage};
use jobhub_core::retention::RetentionPolicy;
use jobhub_core::stats::JobStats;
use jobhub_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::artifact::{ArtifactRow, NewArtifact, PurgeOutcome};
use crate::models::job::{JobChange, JobFilter, JobRow, MetadataChange, NewJob};
use crate::store::{job_not_found, JobStore, StoreError, StoreResult};

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, name, description, job_type, status, progress, priority, \
    parameters, result, error_message, cancel_reason, \
    attempt, retry_of_job_id, created_by, organization_id, \
    scheduled_at, started_at, completed_at, created_at, updated_at";

/// Column list for `job_artifacts` queries.
const ARTIFACT_COLUMNS: &str = "\
    id, job_id, artifact_type, file_name, content_type, \
    storage_path, file_size, checksum_sha256, created_at";

/// PostgreSQL-backed job store.
#[derive(Clone)]
pub struct JobRepo {
    pool: PgPool,
}

impl JobRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Explain why a conditional update matched no row.
    async fn classify_miss(&self, id: DbId, change: &JobChange) -> StoreError {
        let job = match self.find_by_id(id).await {
            Ok(Some(job)) => job,
            Ok(None) => return job_not_found(id),
            Err(e) => return e,
        };

        if let Err(e) = change.transition().apply_to(job.status) {
            return e.into();
        }
        match change {
            JobChange::Progress(percent) => {
                if let Err(e) = validate_progress(job.progress, *percent) {
                    return e.into();
                }
            }
            JobChange::Expire { updated_before } if job.updated_at >= *updated_before => {
                return CoreError::Conflict(format!(
                    "Job {id} reported activity and is no longer stale"
                ))
                .into();
            }
            _ => {}
        }
        CoreError::Conflict(format!(
            "Job {id} was modified concurrently; reload and try again"
        ))
        .into()
    }
}

/// Text values of the statuses a transition may start from.
fn allowed_from(transition: JobTransition) -> Vec<String> {
    transition
        .allowed_from()
        .iter()
        .map(|s| s.as_str().to_string())
        .collect()
}

fn to_jobs(rows: Vec<JobRow>) -> StoreResult<Vec<Job>> {
    rows.into_iter()
        .map(|row| Job::try_from(row).map_err(StoreError::from))
        .collect()
}

#[async_trait]
impl JobStore for JobRepo {
    async fn insert(&self, new: NewJob) -> StoreResult<Job> {
        let query = format!(
            "INSERT INTO jobs \
                 (name, description, job_type, status, parameters, priority, scheduled_at, \
                  created_by, organization_id, attempt, retry_of_job_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(&new.name)
            .bind(&new.description)
            .bind(new.job_type.as_str())
            .bind(JobStatus::Pending.as_str())
            .bind(&new.parameters)
            .bind(new.priority)
            .bind(new.scheduled_at)
            .bind(new.created_by)
            .bind(new.organization_id)
            .bind(new.attempt)
            .bind(new.retry_of_job_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(Job::try_from(row)?)
    }

    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<Job>> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Job::try_from).transpose()?)
    }

    async fn list(&self, filter: &JobFilter) -> StoreResult<JobPage> {
        // Every filter is bound; NULL disables it.
        let conditions = "\
            ($1::BIGINT IS NULL OR organization_id = $1) \
            AND ($2::TEXT IS NULL OR job_type = $2) \
            AND ($3::TEXT IS NULL OR status = $3)";
        let direction = if filter.sort_desc { "DESC" } else { "ASC" };
        let sort_column = filter.sort_by.column();

        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE {conditions} \
             ORDER BY {sort_column} {direction}, id {direction} \
             LIMIT $4 OFFSET $5"
        );
        let rows = sqlx::query_as::<_, JobRow>(&query)
            .bind(filter.organization_id)
            .bind(filter.job_type.map(JobType::as_str))
            .bind(filter.status.map(JobStatus::as_str))
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(&self.pool)
            .await?;

        let count_query = format!("SELECT COUNT(*) FROM jobs WHERE {conditions}");
        let total: i64 = sqlx::query_scalar(&count_query)
            .bind(filter.organization_id)
            .bind(filter.job_type.map(JobType::as_str))
            .bind(filter.status.map(JobStatus::as_str))
            .fetch_one(&self.pool)
            .await?;

        Ok(JobPage {
            items: to_jobs(rows)?,
            total,
            skip: filter.skip,
            limit: filter.limit,
        })
    }

    async fn update_metadata(&self, id: DbId, change: MetadataChange) -> StoreResult<Job> {
        let query = format!(
            "UPDATE jobs \
             SET name = COALESCE($2, name), \
                 description = COALESCE($3, description), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .bind(&change.name)
            .bind(&change.description)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| job_not_found(id))?;
        Ok(Job::try_from(row)?)
    }

    async fn transition(&self, id: DbId, change: JobChange) -> StoreResult<Job> {
        let allowed = allowed_from(change.transition());
        let target = change.transition().target();

        // $1 = id, $2 = allowed statuses, $3 = target status, $4 = payload.
        let set_clause = match &change {
            JobChange::Start => "started_at = COALESCE(started_at, NOW())",
            JobChange::Progress(_) => "progress = $4",
            JobChange::Complete(_) => {
                "progress = 100, result = $4, completed_at = COALESCE(completed_at, NOW())"
            }
            JobChange::Fail(_) => {
                "error_message = $4, completed_at = COALESCE(completed_at, NOW())"
            }
            JobChange::Cancel(_) => {
                "cancel_reason = $4, completed_at = COALESCE(completed_at, NOW())"
            }
            JobChange::Timeout | JobChange::Expire { .. } => {
                "completed_at = COALESCE(completed_at, NOW())"
            }
        };

        // Range check here; monotonicity and staleness are enforced by the
        // WHERE clause.
        let guard = match &change {
            JobChange::Progress(percent) => {
                validate_progress(0, *percent)?;
                " AND progress <= $4"
            }
            JobChange::Expire { .. } => " AND updated_at < $4",
            _ => "",
        };

        let sql = format!(
            "UPDATE jobs \
             SET status = $3, {set_clause}, updated_at = NOW() \
             WHERE id = $1 AND status = ANY($2){guard} \
             RETURNING {COLUMNS}"
        );
        let base = sqlx::query_as::<_, JobRow>(&sql)
            .bind(id)
            .bind(&allowed)
            .bind(target.as_str());
        let bound = match &change {
            JobChange::Start | JobChange::Timeout => base,
            JobChange::Progress(percent) => base.bind(*percent),
            JobChange::Complete(result) => base.bind(result),
            JobChange::Fail(message) => base.bind(message),
            JobChange::Cancel(reason) => base.bind(reason),
            JobChange::Expire { updated_before } => base.bind(*updated_before),
        };

        match bound.fetch_optional(&self.pool).await? {
            Some(row) => Ok(Job::try_from(row)?),
            None => Err(self.classify_miss(id, &change).await),
        }
    }

    async fn delete(&self, id: DbId) -> StoreResult<Option<Vec<JobArtifact>>> {
        let mut tx = self.pool.begin().await?;

        let query = format!(
            "DELETE FROM job_artifacts WHERE job_id = $1 RETURNING {ARTIFACT_COLUMNS}"
        );
        let artifacts = sqlx::query_as::<_, ArtifactRow>(&query)
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        if deleted == 0 {
            return Ok(None);
        }
        Ok(Some(artifacts.into_iter().map(JobArtifact::from).collect()))
    }

    async fn insert_artifact(&self, new: NewArtifact) -> StoreResult<JobArtifact> {
        // The insert only happens if the owning job is completed.
        let query = format!(
            "INSERT INTO job_artifacts \
                 (job_id, artifact_type, file_name, content_type, storage_path, \
                  file_size, checksum_sha256) \
             SELECT id, $2, $3, $4, $5, $6, $7 FROM jobs \
             WHERE id = $1 AND status = $8 \
             RETURNING {ARTIFACT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ArtifactRow>(&query)
            .bind(new.job_id)
            .bind(&new.artifact_type)
            .bind(&new.file_name)
            .bind(&new.content_type)
            .bind(&new.storage_path)
            .bind(new.file_size)
            .bind(&new.checksum_sha256)
            .bind(JobStatus::Completed.as_str())
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = row {
            return Ok(row.into());
        }
        match self.find_by_id(new.job_id).await? {
            None => Err(job_not_found(new.job_id)),
            Some(job) => Err(CoreError::Conflict(format!(
                "Artifacts can only be recorded for completed jobs (job is {})",
                job.status
            ))
            .into()),
        }
    }

    async fn list_artifacts(&self, job_id: DbId) -> StoreResult<Vec<JobArtifact>> {
        let query = format!(
            "SELECT {ARTIFACT_COLUMNS} FROM job_artifacts WHERE job_id = $1 ORDER BY id"
        );
        let rows = sqlx::query_as::<_, ArtifactRow>(&query)
            .bind(job_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(JobArtifact::from).collect())
    }

    async fn find_artifact(
        &self,
        job_id: DbId,
        artifact_id: DbId,
    ) -> StoreResult<Option<JobArtifact>> {
        let query = format!(
            "SELECT {ARTIFACT_COLUMNS} FROM job_artifacts WHERE id = $1 AND job_id = $2"
        );
        let row = sqlx::query_as::<_, ArtifactRow>(&query)
            .bind(artifact_id)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(JobArtifact::from))
    }

    async fn stats(&self, organization_id: Option<DbId>) -> StoreResult<JobStats> {
        let scope = "($1::BIGINT IS NULL OR organization_id = $1)";

        let status_rows: Vec<(String, i64)> = sqlx::query_as(&format!(
            "SELECT status, COUNT(*) FROM jobs WHERE {scope} GROUP BY status"
        ))
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        let type_rows: Vec<(String, i64)> = sqlx::query_as(&format!(
            "SELECT job_type, COUNT(*) FROM jobs WHERE {scope} GROUP BY job_type"
        ))
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        let avg: Option<f64> = sqlx::query_scalar(&format!(
            "SELECT AVG(EXTRACT(EPOCH FROM completed_at - started_at))::FLOAT8 FROM jobs \
             WHERE {scope} AND started_at IS NOT NULL AND completed_at IS NOT NULL"
        ))
        .bind(organization_id)
        .fetch_one(&self.pool)
        .await?;

        let by_status = status_rows
            .into_iter()
            .map(|(s, n)| Ok((JobStatus::parse(&s)?, n)))
            .collect::<Result<Vec<_>, CoreError>>()?;
        let by_type = type_rows
            .into_iter()
            .map(|(t, n)| Ok((JobType::parse(&t)?, n)))
            .collect::<Result<Vec<_>, CoreError>>()?;

        Ok(JobStats::from_counts(by_status, by_type, avg))
    }

    async fn purge_created_before(
        &self,
        cutoff: Timestamp,
        policy: RetentionPolicy,
    ) -> StoreResult<PurgeOutcome> {
        let statuses: Vec<String> = policy
            .statuses()
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();

        let mut tx = self.pool.begin().await?;

        // Lock the candidates so none can change status before deletion.
        let ids: Vec<DbId> = sqlx::query_scalar(
            "SELECT id FROM jobs WHERE created_at < $1 AND status = ANY($2) FOR UPDATE",
        )
        .bind(cutoff)
        .bind(&statuses)
        .fetch_all(&mut *tx)
        .await?;

        if ids.is_empty() {
            tx.commit().await?;
            return Ok(PurgeOutcome::default());
        }

        let query = format!(
            "DELETE FROM job_artifacts WHERE job_id = ANY($1) RETURNING {ARTIFACT_COLUMNS}"
        );
        let artifacts = sqlx::query_as::<_, ArtifactRow>(&query)
            .bind(&ids)
            .fetch_all(&mut *tx)
            .await?;

        let deleted_jobs = sqlx::query(
            "DELETE FROM jobs WHERE id = ANY($1) AND created_at < $2 AND status = ANY($3)",
        )
        .bind(&ids)
        .bind(cutoff)
        .bind(&statuses)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        tracing::debug!(deleted_jobs, artifacts = artifacts.len(), "Purged jobs");

        Ok(PurgeOutcome {
            deleted_jobs,
            artifacts: artifacts.into_iter().map(JobArtifact::from).collect(),
        })
    }

    async fn find_stale_running(&self, updated_before: Timestamp) -> StoreResult<Vec<DbId>> {
        let ids: Vec<DbId> = sqlx::query_scalar(
            "SELECT id FROM jobs WHERE status = $1 AND updated_at < $2 ORDER BY id",
        )
        .bind(JobStatus::Running.as_str())
        .bind(updated_before)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}
