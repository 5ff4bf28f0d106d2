//! Executor-facing handlers that drive a job through its lifecycle.
//!
//! All endpoints require the `worker` or `admin` role via [`RequireWorker`].

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use jobhub_core::model::{ArtifactWithUrl, CompleteJob, FailJob, ProgressUpdate};
use jobhub_core::types::DbId;

use crate::engine::artifacts::ArtifactUpload;
use crate::engine::Actor;
use crate::error::{AppError, AppResult};
use crate::middleware::rbac::RequireWorker;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/jobs/{id}/start
pub async fn start_job(
    RequireWorker(worker): RequireWorker,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = state.controller.start(&Actor::from(&worker), job_id).await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/jobs/{id}/progress
pub async fn report_progress(
    RequireWorker(worker): RequireWorker,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    Json(input): Json<ProgressUpdate>,
) -> AppResult<impl IntoResponse> {
    let job = state
        .controller
        .report_progress(&Actor::from(&worker), job_id, input.progress)
        .await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/jobs/{id}/complete
pub async fn complete_job(
    RequireWorker(worker): RequireWorker,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    body: Option<Json<CompleteJob>>,
) -> AppResult<impl IntoResponse> {
    let input = body.map(|Json(b)| b).unwrap_or_default();
    let job = state
        .controller
        .complete(&Actor::from(&worker), job_id, input.result)
        .await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/jobs/{id}/fail
pub async fn fail_job(
    RequireWorker(worker): RequireWorker,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    Json(input): Json<FailJob>,
) -> AppResult<impl IntoResponse> {
    let job = state
        .controller
        .fail(&Actor::from(&worker), job_id, input.error_message)
        .await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/jobs/{id}/timeout
pub async fn timeout_job(
    RequireWorker(worker): RequireWorker,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = state
        .controller
        .time_out(&Actor::from(&worker), job_id)
        .await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/jobs/{id}/artifacts
///
/// Accepts a multipart form with a required `file` field, a required
/// `artifact_type` field, and an optional `content_type` field. Returns 201
/// with the recorded artifact.
pub async fn record_artifact(
    RequireWorker(worker): RequireWorker,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let mut file: Option<(String, Option<String>, Vec<u8>)> = None;
    let mut artifact_type: Option<String> = None;
    let mut content_type: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("artifact").to_string();
                let part_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                file = Some((file_name, part_type, data.to_vec()));
            }
            "artifact_type" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                artifact_type = Some(text);
            }
            "content_type" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                content_type = Some(text);
            }
            _ => {} // ignore unknown fields
        }
    }

    let (file_name, part_type, bytes) =
        file.ok_or_else(|| AppError::BadRequest("Missing required 'file' field".into()))?;
    let artifact_type = artifact_type
        .ok_or_else(|| AppError::BadRequest("Missing required 'artifact_type' field".into()))?;

    let artifact = state
        .artifacts
        .record(
            &Actor::from(&worker),
            job_id,
            ArtifactUpload {
                artifact_type,
                file_name,
                content_type: content_type.or(part_type),
                bytes,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: ArtifactWithUrl::from(artifact),
        }),
    ))
}
