//! Structured audit trail of job events.
//!
//! [`EventAuditLog`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and writes every received [`JobEvent`] as one `tracing` record under the
//! `jobhub::audit` target. It shuts down when the bus sender is dropped.

use tokio::sync::broadcast;

use crate::bus::JobEvent;

/// Background consumer that logs every job event.
pub struct EventAuditLog;

impl EventAuditLog {
    /// Run the audit loop until the channel closes. Returns the number of
    /// events written.
    pub async fn run(mut receiver: broadcast::Receiver<JobEvent>) -> u64 {
        let mut written = 0u64;
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    Self::record(&event);
                    written += 1;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Audit log lagged, some events were not recorded");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!(written, "Event bus closed, audit log shutting down");
                    break;
                }
            }
        }
        written
    }

    fn record(event: &JobEvent) {
        tracing::info!(
            target: "jobhub::audit",
            event_type = %event.event_type,
            job_id = event.job_id,
            organization_id = event.organization_id,
            status = %event.status,
            actor_user_id = ?event.actor_user_id,
            payload = %event.payload,
            "Job event",
        );
    }
}
