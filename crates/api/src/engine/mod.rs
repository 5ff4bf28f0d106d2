//! Job orchestration engine.
//!
//! The HTTP handlers are thin; every rule about who may do what to which
//! job lives here.
//!
//! - [`submitter::JobSubmitter`] -- validates and accepts new jobs.
//! - [`controller::JobController`] -- lifecycle transitions, retry, edits.
//! - [`artifacts::ArtifactRegistry`] -- records and serves job outputs.
//! - [`retention::RetentionCleaner`] -- age-based purge.
//! - [`storage::ArtifactStorage`] -- artifact bytes on the local filesystem.

pub mod artifacts;
pub mod controller;
pub mod retention;
pub mod storage;
pub mod submitter;

use jobhub_core::error::CoreError;
use jobhub_core::model::Job;
use jobhub_core::types::DbId;
use jobhub_db::JobStore;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;

pub use artifacts::ArtifactRegistry;
pub use controller::JobController;
pub use retention::RetentionCleaner;
pub use storage::ArtifactStorage;
pub use submitter::JobSubmitter;

/// The caller an engine operation acts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: DbId,
    pub organization_id: DbId,
    /// Admins see and act on jobs of every organization.
    pub is_admin: bool,
}

impl Actor {
    /// Organization filter for listings and stats; `None` means all.
    pub fn scope(&self) -> Option<DbId> {
        if self.is_admin {
            None
        } else {
            Some(self.organization_id)
        }
    }

    pub fn can_see(&self, job: &Job) -> bool {
        self.is_admin || job.organization_id == self.organization_id
    }
}

impl From<&AuthUser> for Actor {
    fn from(user: &AuthUser) -> Self {
        Self {
            user_id: user.user_id,
            organization_id: user.organization_id,
            is_admin: user.is_admin(),
        }
    }
}

/// Load a job the actor is allowed to see.
///
/// A job owned by another organization is reported as missing so its
/// existence does not leak.
pub(crate) async fn find_visible(store: &dyn JobStore, actor: &Actor, id: DbId) -> AppResult<Job> {
    match store.find_by_id(id).await? {
        Some(job) if actor.can_see(&job) => Ok(job),
        _ => Err(CoreError::NotFound { entity: "Job", id }.into()),
    }
}
