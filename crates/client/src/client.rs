//! Typed client for the `/api/v1/jobs` endpoints.

use std::sync::Arc;

use jobhub_core::model::{
    ArtifactWithUrl, CancelJob, CleanupResult, CompleteJob, FailJob, Job, JobPage, ProgressUpdate,
    RetryJob, SubmitJob, UpdateJob,
};
use jobhub_core::stats::JobStats;
use jobhub_core::types::DbId;
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::Serialize;

use crate::credentials::CredentialProvider;
use crate::error::ClientError;
use crate::transport::AuthenticatedTransport;

const JOBS_PATH: &str = "/api/v1/jobs";

/// Query options for [`JobsClient::list`]. Unset fields use server defaults.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListJobs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_desc: Option<bool>,
}

/// Client for one jobhub server.
///
/// Cheap to clone; clones share the connection pool and credentials.
#[derive(Clone)]
pub struct JobsClient {
    transport: AuthenticatedTransport,
}

impl JobsClient {
    /// * `base_url` - server root, e.g. `http://localhost:3000`.
    pub fn new(base_url: impl Into<String>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            transport: AuthenticatedTransport::new(base_url, credentials),
        }
    }

    pub fn with_transport(transport: AuthenticatedTransport) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &AuthenticatedTransport {
        &self.transport
    }

    // ---- jobs ----

    pub async fn submit(&self, input: &SubmitJob) -> Result<Job, ClientError> {
        let req = self.transport.request(Method::POST, JOBS_PATH).json(input);
        self.transport.send_data(req).await
    }

    pub async fn get(&self, job_id: DbId) -> Result<Job, ClientError> {
        let req = self.transport.request(Method::GET, &job_path(job_id, ""));
        self.transport.send_data(req).await
    }

    pub async fn list(&self, query: &ListJobs) -> Result<JobPage, ClientError> {
        let req = self.transport.request(Method::GET, JOBS_PATH).query(query);
        self.transport.send_data(req).await
    }

    pub async fn update(&self, job_id: DbId, input: &UpdateJob) -> Result<Job, ClientError> {
        let req = self
            .transport
            .request(Method::PUT, &job_path(job_id, ""))
            .json(input);
        self.transport.send_data(req).await
    }

    pub async fn delete(&self, job_id: DbId) -> Result<(), ClientError> {
        let req = self.transport.request(Method::DELETE, &job_path(job_id, ""));
        self.transport.send_empty(req).await
    }

    pub async fn cancel(&self, job_id: DbId, reason: Option<String>) -> Result<Job, ClientError> {
        self.post(job_id, "/cancel", &CancelJob { reason }).await
    }

    /// Create a new attempt of a finished job, optionally replacing its
    /// parameters.
    pub async fn retry(
        &self,
        job_id: DbId,
        retry_parameters: Option<serde_json::Value>,
    ) -> Result<Job, ClientError> {
        self.post(job_id, "/retry", &RetryJob { retry_parameters }).await
    }

    pub async fn stats(&self) -> Result<JobStats, ClientError> {
        let req = self
            .transport
            .request(Method::GET, &format!("{JOBS_PATH}/stats"));
        self.transport.send_data(req).await
    }

    /// Purge jobs older than `days_to_keep` days. Requires the admin role.
    pub async fn cleanup(&self, days_to_keep: i64) -> Result<CleanupResult, ClientError> {
        let req = self
            .transport
            .request(Method::POST, &format!("{JOBS_PATH}/cleanup"))
            .query(&[("days_to_keep", days_to_keep)]);
        self.transport.send_data(req).await
    }

    // ---- artifacts ----

    pub async fn list_artifacts(&self, job_id: DbId) -> Result<Vec<ArtifactWithUrl>, ClientError> {
        let req = self
            .transport
            .request(Method::GET, &job_path(job_id, "/artifacts"));
        self.transport.send_data(req).await
    }

    /// Download an artifact's bytes.
    pub async fn download_artifact(
        &self,
        job_id: DbId,
        artifact_id: DbId,
    ) -> Result<Vec<u8>, ClientError> {
        let path = job_path(job_id, &format!("/artifacts/{artifact_id}/download"));
        let req = self.transport.request(Method::GET, &path);
        let response =
            AuthenticatedTransport::ensure_success(self.transport.send(req).await?).await?;
        Ok(response.bytes().await?.to_vec())
    }

    // ---- executor operations (worker role) ----

    /// Upload an artifact for a completed job. `content_type` overrides the
    /// server's default of `application/octet-stream`.
    pub async fn record_artifact(
        &self,
        job_id: DbId,
        artifact_type: &str,
        file_name: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<ArtifactWithUrl, ClientError> {
        let path = job_path(job_id, "/artifacts");
        let build = || {
            let file = Part::bytes(bytes.to_vec()).file_name(file_name.to_string());
            let mut form = Form::new()
                .text("artifact_type", artifact_type.to_string())
                .part("file", file);
            if let Some(content_type) = content_type {
                form = form.text("content_type", content_type.to_string());
            }
            self.transport.request(Method::POST, &path).multipart(form)
        };
        self.transport.send_data_rebuilt(build).await
    }

    pub async fn start(&self, job_id: DbId) -> Result<Job, ClientError> {
        self.post(job_id, "/start", &serde_json::json!({})).await
    }

    pub async fn report_progress(&self, job_id: DbId, progress: i16) -> Result<Job, ClientError> {
        self.post(job_id, "/progress", &ProgressUpdate { progress })
            .await
    }

    pub async fn complete(
        &self,
        job_id: DbId,
        result: Option<serde_json::Value>,
    ) -> Result<Job, ClientError> {
        self.post(job_id, "/complete", &CompleteJob { result }).await
    }

    pub async fn fail(&self, job_id: DbId, error_message: &str) -> Result<Job, ClientError> {
        let body = FailJob {
            error_message: error_message.to_string(),
        };
        self.post(job_id, "/fail", &body).await
    }

    pub async fn time_out(&self, job_id: DbId) -> Result<Job, ClientError> {
        self.post(job_id, "/timeout", &serde_json::json!({})).await
    }

    // ---- private helpers ----

    async fn post<B: Serialize>(&self, job_id: DbId, suffix: &str, body: &B) -> Result<Job, ClientError> {
        let req = self
            .transport
            .request(Method::POST, &job_path(job_id, suffix))
            .json(body);
        self.transport.send_data(req).await
    }
}

fn job_path(job_id: DbId, suffix: &str) -> String {
    format!("{JOBS_PATH}/{job_id}{suffix}")
}
