//! Periodic purge of old jobs.
//!
//! Runs [`RetentionCleaner::cleanup_older_than`] on a fixed interval
//! using `tokio::time::interval`.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::engine::RetentionCleaner;

/// Run the retention loop until `cancel` is triggered.
///
/// The first pass runs immediately; later passes every `interval`.
pub async fn run(
    cleaner: RetentionCleaner,
    retention_days: i64,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        retention_days,
        interval_secs = interval.as_secs(),
        include_active = cleaner.policy().include_active,
        "Job retention task started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job retention task stopping");
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = cleaner.cleanup_older_than(retention_days).await {
                    tracing::error!(error = %e, "Job retention: cleanup failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use jobhub_core::retention::RetentionPolicy;
    use jobhub_db::{JobStore, MemoryJobStore};

    use super::*;
    use crate::engine::ArtifactStorage;

    #[tokio::test]
    async fn stops_when_cancelled() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
        let cleaner = RetentionCleaner::new(
            store,
            ArtifactStorage::new(dir.path()),
            RetentionPolicy::default(),
        );
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run(
            cleaner,
            30,
            Duration::from_millis(10),
            cancel.clone(),
        ));
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("task should stop promptly")
            .expect("task should not panic");
    }
}
