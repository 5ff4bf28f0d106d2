//! Handlers for the `/jobs` resource.
//!
//! All endpoints require authentication via [`AuthUser`]. Jobs are scoped
//! to the caller's organization; admins see every organization.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use jobhub_core::model::{CancelJob, RetryJob, SubmitJob, UpdateJob};
use jobhub_core::types::DbId;

use crate::engine::Actor;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireAdmin;
use crate::query::{CleanupParams, JobListParams};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Submit a new job. Returns 201 with the created job in `pending`.
pub async fn submit_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<SubmitJob>,
) -> AppResult<impl IntoResponse> {
    let job = state.submitter.submit(&Actor::from(&auth), input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}

// ---------------------------------------------------------------------------
// List / Get
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
///
/// One page of jobs with the total match count.
pub async fn list_jobs(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<JobListParams>,
) -> AppResult<impl IntoResponse> {
    let filter = params.into_filter()?;
    let page = state.controller.list(&Actor::from(&auth), filter).await?;
    Ok(Json(DataResponse { data: page }))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = state.controller.get(&Actor::from(&auth), job_id).await?;
    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// Update / Delete
// ---------------------------------------------------------------------------

/// PUT /api/v1/jobs/{id}
///
/// Edit name and description. Status cannot be changed here.
pub async fn update_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    Json(input): Json<UpdateJob>,
) -> AppResult<impl IntoResponse> {
    let job = state
        .controller
        .update(&Actor::from(&auth), job_id, input)
        .await?;
    Ok(Json(DataResponse { data: job }))
}

/// DELETE /api/v1/jobs/{id}
///
/// Delete a job and its artifacts. Returns 204.
pub async fn delete_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<StatusCode> {
    state.controller.delete(&Actor::from(&auth), job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Cancel / Retry
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/cancel
///
/// Cancel a pending or running job. 409 if it already finished. The body
/// (`{ "reason": ... }`) is optional.
pub async fn cancel_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    body: Option<Json<CancelJob>>,
) -> AppResult<impl IntoResponse> {
    let input = body.map(|Json(b)| b).unwrap_or_default();
    let job = state
        .controller
        .cancel(&Actor::from(&auth), job_id, input)
        .await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/jobs/{id}/retry
///
/// Create a new attempt of a finished job. Returns 201 with the new job.
pub async fn retry_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    body: Option<Json<RetryJob>>,
) -> AppResult<impl IntoResponse> {
    let input = body.map(|Json(b)| b).unwrap_or_default();
    let job = state
        .controller
        .retry(&Actor::from(&auth), job_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}

// ---------------------------------------------------------------------------
// Stats / Cleanup
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/stats
pub async fn get_stats(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let stats = state.controller.stats(&Actor::from(&auth)).await?;
    Ok(Json(DataResponse { data: stats }))
}

/// POST /api/v1/jobs/cleanup?days_to_keep=N
///
/// Purge jobs older than `days_to_keep` days (default 30). Admin only.
pub async fn cleanup_jobs(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Query(params): Query<CleanupParams>,
) -> AppResult<impl IntoResponse> {
    let result = state
        .retention
        .cleanup_older_than(params.days_to_keep)
        .await?;

    tracing::info!(
        user_id = admin.user_id,
        days_to_keep = params.days_to_keep,
        deleted = result.deleted_count,
        "Manual job cleanup",
    );

    Ok(Json(DataResponse { data: result }))
}
