//! Handlers for reading job artifacts.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use jobhub_core::model::ArtifactWithUrl;
use jobhub_core::types::DbId;
use tokio_util::io::ReaderStream;

use crate::engine::Actor;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/jobs/{id}/artifacts
///
/// Artifacts of a completed job with their download URLs. Empty for jobs
/// that have not completed.
pub async fn list_artifacts(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let artifacts: Vec<ArtifactWithUrl> = state
        .artifacts
        .list(&Actor::from(&auth), job_id)
        .await?
        .into_iter()
        .map(ArtifactWithUrl::from)
        .collect();
    Ok(Json(DataResponse { data: artifacts }))
}

/// GET /api/v1/jobs/{id}/artifacts/{artifact_id}/download
///
/// Streams the stored file as an attachment.
pub async fn download_artifact(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((job_id, artifact_id)): Path<(DbId, DbId)>,
) -> AppResult<Response> {
    let (artifact, file) = state
        .artifacts
        .open(&Actor::from(&auth), job_id, artifact_id)
        .await?;

    let stream = ReaderStream::new(file);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, artifact.content_type.as_str())
        .header(header::CONTENT_LENGTH, artifact.file_size.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(&artifact.file_name),
        )
        .header("x-checksum-sha256", artifact.checksum_sha256.as_str())
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::InternalError(e.to_string()))
}

/// `attachment; filename="..."` with characters that would break the
/// header value replaced.
fn content_disposition(file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    format!("attachment; filename=\"{safe}\"")
}
