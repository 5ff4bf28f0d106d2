//! Cooperative polling of one job until it finishes.
//!
//! Each tick performs one status query, hands the snapshot to the
//! caller's callback, and sleeps only when the job is still active. The
//! loop stops on every terminal status (`completed`, `failed`,
//! `cancelled`, `timeout`).
//!
//! Transient query failures (network, 5xx, request timeout) are retried
//! with the same interval up to `max_transient_retries` consecutive times.
//! Any other error, or one failure past the budget, ends monitoring with
//! that error. A successful query resets the failure count.

use std::time::Duration;

use async_trait::async_trait;
use jobhub_core::model::Job;
use jobhub_core::types::DbId;
use tokio_util::sync::CancellationToken;

use crate::client::JobsClient;
use crate::error::ClientError;

/// Default delay between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Default consecutive transient failures tolerated before giving up.
pub const DEFAULT_MAX_TRANSIENT_RETRIES: u32 = 3;

/// Anything that can report the current state of a job.
#[async_trait]
pub trait JobSource: Send + Sync {
    async fn fetch_job(&self, job_id: DbId) -> Result<Job, ClientError>;
}

#[async_trait]
impl JobSource for JobsClient {
    async fn fetch_job(&self, job_id: DbId) -> Result<Job, ClientError> {
        self.get(job_id).await
    }
}

/// How monitoring ended.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorOutcome {
    /// The job reached a terminal status; this is the final snapshot.
    Finished(Job),
    /// The cancellation token fired. The job itself was not touched.
    Detached { last_seen: Option<Job> },
}

/// Polling loop configuration.
#[derive(Debug, Clone, Copy)]
pub struct ProgressMonitor {
    interval: Duration,
    max_transient_retries: u32,
}

impl Default for ProgressMonitor {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_transient_retries: DEFAULT_MAX_TRANSIENT_RETRIES,
        }
    }
}

impl ProgressMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_transient_retries(mut self, retries: u32) -> Self {
        self.max_transient_retries = retries;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll `job_id` until it is terminal or `cancel` fires, calling
    /// `on_observe` with every snapshot.
    pub async fn watch<S, F>(
        &self,
        source: &S,
        job_id: DbId,
        mut on_observe: F,
        cancel: &CancellationToken,
    ) -> Result<MonitorOutcome, ClientError>
    where
        S: JobSource + ?Sized,
        F: FnMut(&Job) + Send,
    {
        let mut last_seen: Option<Job> = None;
        let mut consecutive_failures = 0u32;

        loop {
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Ok(MonitorOutcome::Detached { last_seen });
                }
                fetched = source.fetch_job(job_id) => fetched,
            };

            match fetched {
                Ok(job) => {
                    consecutive_failures = 0;
                    on_observe(&job);
                    if job.is_terminal() {
                        tracing::debug!(job_id, status = %job.status, "Monitor observed terminal status");
                        return Ok(MonitorOutcome::Finished(job));
                    }
                    last_seen = Some(job);
                }
                Err(e) if e.is_transient() && consecutive_failures < self.max_transient_retries => {
                    consecutive_failures += 1;
                    tracing::warn!(
                        job_id,
                        attempt = consecutive_failures,
                        max = self.max_transient_retries,
                        error = %e,
                        "Transient error while polling job, retrying",
                    );
                }
                Err(e) => {
                    tracing::warn!(job_id, error = %e, "Monitoring aborted");
                    return Err(e);
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Ok(MonitorOutcome::Detached { last_seen });
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}
