pub mod health;
pub mod jobs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /jobs                                            list, submit
/// /jobs/stats                                      aggregate statistics
/// /jobs/cleanup                                    retention purge (admin only)
/// /jobs/{id}                                       get, update, delete
/// /jobs/{id}/cancel                                cancel (POST)
/// /jobs/{id}/retry                                 new attempt (POST)
/// /jobs/{id}/artifacts                             list (GET), record (POST, worker)
/// /jobs/{id}/artifacts/{artifact_id}/download      stream file
///
/// /jobs/{id}/start                                 worker: pending -> running
/// /jobs/{id}/progress                              worker: report progress
/// /jobs/{id}/complete                              worker: running -> completed
/// /jobs/{id}/fail                                  worker: running -> failed
/// /jobs/{id}/timeout                               worker: running -> timeout
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/jobs", jobs::router())
}
