//! Event type constants for job lifecycle events.
//!
//! Published on the in-process event bus by the job controller and
//! consumed by anything that wants push notifications instead of polling.

/// A new job was accepted and is pending.
pub const EVENT_JOB_SUBMITTED: &str = "job.submitted";

/// A pending job began executing.
pub const EVENT_JOB_STARTED: &str = "job.started";

/// A running job reported progress.
pub const EVENT_JOB_PROGRESS: &str = "job.progress";

/// Job completed successfully.
pub const EVENT_JOB_COMPLETED: &str = "job.completed";

/// Job failed with an error.
pub const EVENT_JOB_FAILED: &str = "job.failed";

/// Job was cancelled by a user.
pub const EVENT_JOB_CANCELLED: &str = "job.cancelled";

/// The executor stopped reporting and the job was timed out.
pub const EVENT_JOB_TIMED_OUT: &str = "job.timed_out";

/// A finished job was retried as a new attempt.
pub const EVENT_JOB_RETRIED: &str = "job.retried";

/// A job's name or description changed.
pub const EVENT_JOB_UPDATED: &str = "job.updated";

/// A job and its artifacts were deleted.
pub const EVENT_JOB_DELETED: &str = "job.deleted";

/// An artifact was recorded for a completed job.
pub const EVENT_ARTIFACT_RECORDED: &str = "job.artifact_recorded";
