//! Stale-job watchdog.
//!
//! A running job whose executor stops reporting is moved to `timeout`
//! once its `updated_at` is older than the configured limit. Every write
//! bumps `updated_at`, so a metadata edit through `PUT /jobs/{id}` also
//! restarts the idle clock.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::engine::JobController;

/// Run the watchdog loop until `cancel` is triggered.
pub async fn run(
    controller: JobController,
    job_timeout: Duration,
    interval: Duration,
    cancel: CancellationToken,
) {
    let max_idle = match chrono::Duration::from_std(job_timeout) {
        Ok(d) => d,
        Err(e) => {
            tracing::error!(error = %e, "Job watchdog: timeout out of range, not starting");
            return;
        }
    };

    tracing::info!(
        job_timeout_secs = job_timeout.as_secs(),
        interval_secs = interval.as_secs(),
        "Job watchdog started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job watchdog stopping");
                break;
            }
            _ = ticker.tick() => {
                match controller.expire_stale(max_idle).await {
                    Ok(expired) if !expired.is_empty() => {
                        let ids: Vec<_> = expired.iter().map(|j| j.id).collect();
                        tracing::warn!(count = ids.len(), job_ids = ?ids, "Job watchdog: timed out stale jobs");
                    }
                    Ok(_) => tracing::debug!("Job watchdog: no stale jobs"),
                    Err(e) => tracing::error!(error = %e, "Job watchdog: scan failed"),
                }
            }
        }
    }
}
