//! Route definitions for the `/jobs` resource.
//!
//! All endpoints require authentication.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{artifacts, jobs, worker};
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /                                  -> list_jobs
/// POST   /                                  -> submit_job
/// GET    /stats                             -> get_stats
/// POST   /cleanup                           -> cleanup_jobs
/// GET    /{id}                              -> get_job
/// PUT    /{id}                              -> update_job
/// DELETE /{id}                              -> delete_job
/// POST   /{id}/cancel                       -> cancel_job
/// POST   /{id}/retry                        -> retry_job
/// GET    /{id}/artifacts                    -> list_artifacts
/// POST   /{id}/artifacts                    -> record_artifact
/// GET    /{id}/artifacts/{aid}/download     -> download_artifact
/// POST   /{id}/start                        -> start_job
/// POST   /{id}/progress                     -> report_progress
/// POST   /{id}/complete                     -> complete_job
/// POST   /{id}/fail                         -> fail_job
/// POST   /{id}/timeout                      -> timeout_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(jobs::list_jobs).post(jobs::submit_job))
        .route("/stats", get(jobs::get_stats))
        .route("/cleanup", post(jobs::cleanup_jobs))
        .route(
            "/{id}",
            get(jobs::get_job)
                .put(jobs::update_job)
                .delete(jobs::delete_job),
        )
        .route("/{id}/cancel", post(jobs::cancel_job))
        .route("/{id}/retry", post(jobs::retry_job))
        .route(
            "/{id}/artifacts",
            get(artifacts::list_artifacts).post(worker::record_artifact),
        )
        .route(
            "/{id}/artifacts/{artifact_id}/download",
            get(artifacts::download_artifact),
        )
        .route("/{id}/start", post(worker::start_job))
        .route("/{id}/progress", post(worker::report_progress))
        .route("/{id}/complete", post(worker::complete_job))
        .route("/{id}/fail", post(worker::fail_job))
        .route("/{id}/timeout", post(worker::timeout_job))
}
