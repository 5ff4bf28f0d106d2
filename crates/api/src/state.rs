use std::sync::Arc;

use jobhub_core::retention::RetentionPolicy;
use jobhub_db::{DbPool, JobStore};
use jobhub_events::EventBus;

use crate::config::ServerConfig;
use crate::engine::{ArtifactRegistry, ArtifactStorage, JobController, JobSubmitter, RetentionCleaner};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Source of truth for jobs and artifacts.
    pub store: Arc<dyn JobStore>,
    /// Database pool when running on PostgreSQL; `None` on the in-memory store.
    pub pool: Option<DbPool>,
    /// Server configuration (accessed by middleware and handlers).
    pub config: Arc<ServerConfig>,
    /// Centralized event bus for publishing job lifecycle events.
    pub event_bus: Arc<EventBus>,
    pub submitter: JobSubmitter,
    pub controller: JobController,
    pub artifacts: ArtifactRegistry,
    pub retention: RetentionCleaner,
}

impl AppState {
    /// Wire the engine components around one store and event bus.
    pub fn new(
        store: Arc<dyn JobStore>,
        pool: Option<DbPool>,
        config: ServerConfig,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let storage = ArtifactStorage::new(config.artifact_root.clone());
        let policy = RetentionPolicy {
            include_active: config.retention_include_active,
        };

        Self {
            submitter: JobSubmitter::new(Arc::clone(&store), Arc::clone(&event_bus)),
            controller: JobController::new(
                Arc::clone(&store),
                Arc::clone(&event_bus),
                storage.clone(),
            ),
            artifacts: ArtifactRegistry::new(
                Arc::clone(&store),
                Arc::clone(&event_bus),
                storage.clone(),
            ),
            retention: RetentionCleaner::new(Arc::clone(&store), storage, policy),
            store,
            pool,
            config: Arc::new(config),
            event_bus,
        }
    }
}
