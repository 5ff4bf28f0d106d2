//! Retention window rules for purging old jobs.

use chrono::Duration;

use crate::error::CoreError;
use crate::job::JobStatus;
use crate::types::Timestamp;

/// Default retention window in days.
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

/// Which jobs an age-based purge may remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetentionPolicy {
    /// When `false` (default), pending and running jobs are never purged
    /// regardless of age.
    pub include_active: bool,
}

impl RetentionPolicy {
    /// Whether a job with this age and status may be purged at `cutoff`.
    pub fn is_eligible(
        &self,
        created_at: Timestamp,
        status: JobStatus,
        cutoff: Timestamp,
    ) -> bool {
        created_at < cutoff && (self.include_active || status.is_terminal())
    }

    /// Statuses the purge may touch.
    pub fn statuses(&self) -> &'static [JobStatus] {
        if self.include_active {
            &JobStatus::ALL
        } else {
            &JobStatus::TERMINAL
        }
    }
}

/// Compute the purge cutoff for a "keep the last `days` days" request.
pub fn cutoff(now: Timestamp, days: i64) -> Result<Timestamp, CoreError> {
    if days < 0 {
        return Err(CoreError::Validation(format!(
            "days_to_keep must be zero or positive, got {days}"
        )));
    }
    let window = Duration::try_days(days)
        .ok_or_else(|| CoreError::Validation(format!("days_to_keep {days} is too large")))?;
    now.checked_sub_signed(window)
        .ok_or_else(|| CoreError::Validation(format!("days_to_keep {days} is too large")))
}
