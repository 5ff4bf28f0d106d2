//! Job lifecycle rules: job types, statuses, the transition table, and the
//! input validators shared by every store implementation.
//!
//! Everything here is pure. Stores apply field changes; this module only
//! decides whether a change is legal.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Maximum length of a job name.
pub const MAX_NAME_LEN: usize = 255;

/// Maximum length of a job description.
pub const MAX_DESCRIPTION_LEN: usize = 2_000;

/// Maximum length of a failure message or cancel reason.
pub const MAX_MESSAGE_LEN: usize = 4_000;

/// Upper bound for `progress`.
pub const MAX_PROGRESS: i16 = 100;

// ---------------------------------------------------------------------------
// Job type
// ---------------------------------------------------------------------------

/// Kind of background computation a job runs. Closed set; the executor
/// owns the meaning of each kind's `parameters`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    FairnessAssessment,
    DiagnosisAssessment,
    ModelCardGeneration,
    EvidencePackGeneration,
    DataIngestion,
    Validation,
}

impl JobType {
    /// Every job type, in declaration order.
    pub const ALL: [JobType; 6] = [
        Self::FairnessAssessment,
        Self::DiagnosisAssessment,
        Self::ModelCardGeneration,
        Self::EvidencePackGeneration,
        Self::DataIngestion,
        Self::Validation,
    ];

    /// Return the wire/database string representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FairnessAssessment => "fairness_assessment",
            Self::DiagnosisAssessment => "diagnosis_assessment",
            Self::ModelCardGeneration => "model_card_generation",
            Self::EvidencePackGeneration => "evidence_pack_generation",
            Self::DataIngestion => "data_ingestion",
            Self::Validation => "validation",
        }
    }

    /// Parse from the string representation.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Unknown job type '{s}'. Valid types: {}",
                    Self::ALL.map(Self::as_str).join(", ")
                ))
            })
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Job status
// ---------------------------------------------------------------------------

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Timeout,
}

impl JobStatus {
    /// Every status, in declaration order.
    pub const ALL: [JobStatus; 6] = [
        Self::Pending,
        Self::Running,
        Self::Completed,
        Self::Failed,
        Self::Cancelled,
        Self::Timeout,
    ];

    /// States from which no further automatic progress occurs.
    pub const TERMINAL: [JobStatus; 4] =
        [Self::Completed, Self::Failed, Self::Cancelled, Self::Timeout];

    /// States that may still change without a retry.
    pub const ACTIVE: [JobStatus; 2] = [Self::Pending, Self::Running];

    /// Return the wire/database string representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
        }
    }

    /// Parse from the string representation.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Unknown job status '{s}'. Valid statuses: {}",
                    Self::ALL.map(Self::as_str).join(", ")
                ))
            })
    }

    pub fn is_terminal(self) -> bool {
        Self::TERMINAL.contains(&self)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// An in-place lifecycle event. Retry is not listed here because it
/// creates a new attempt instead of moving the existing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobTransition {
    Start,
    Progress,
    Complete,
    Fail,
    Cancel,
    Timeout,
}

impl JobTransition {
    /// Name used in log lines and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Progress => "progress",
            Self::Complete => "complete",
            Self::Fail => "fail",
            Self::Cancel => "cancel",
            Self::Timeout => "timeout",
        }
    }

    /// States this event may be applied from.
    pub fn allowed_from(self) -> &'static [JobStatus] {
        match self {
            Self::Start => &[JobStatus::Pending],
            Self::Cancel => &JobStatus::ACTIVE,
            Self::Progress | Self::Complete | Self::Fail | Self::Timeout => &[JobStatus::Running],
        }
    }

    /// Resulting state when the event succeeds.
    pub fn target(self) -> JobStatus {
        match self {
            Self::Start | Self::Progress => JobStatus::Running,
            Self::Complete => JobStatus::Completed,
            Self::Fail => JobStatus::Failed,
            Self::Cancel => JobStatus::Cancelled,
            Self::Timeout => JobStatus::Timeout,
        }
    }

    /// Check the event against the transition table.
    ///
    /// Returns the target status, or `Conflict` when `from` does not allow
    /// this event.
    pub fn apply_to(self, from: JobStatus) -> Result<JobStatus, CoreError> {
        if self.allowed_from().contains(&from) {
            return Ok(self.target());
        }
        Err(CoreError::Conflict(conflict_message(self, from)))
    }
}

fn conflict_message(transition: JobTransition, from: JobStatus) -> String {
    match transition {
        JobTransition::Cancel => "Job already finished and cannot be cancelled".to_string(),
        JobTransition::Progress => {
            format!("Progress can only be reported while running (job is {from})")
        }
        other => format!("Cannot {} a job that is {from}", other.as_str()),
    }
}

/// Retry is legal only from a terminal state.
pub fn ensure_retryable(status: JobStatus) -> Result<(), CoreError> {
    if status.is_terminal() {
        Ok(())
    } else {
        Err(CoreError::Conflict(format!(
            "Only finished jobs can be retried (job is {status})"
        )))
    }
}

// ---------------------------------------------------------------------------
// Validators
// ---------------------------------------------------------------------------

/// Validate a job name: non-empty after trimming, bounded length.
pub fn validate_name(name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation("Job name must not be empty".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Job name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Validate an opaque payload. Only well-formedness is checked: it must
/// be a JSON object. `null` is treated as an empty object by callers.
pub fn validate_payload(field: &str, value: &serde_json::Value) -> Result<(), CoreError> {
    if value.is_object() {
        Ok(())
    } else {
        Err(CoreError::Validation(format!("{field} must be a JSON object")))
    }
}

/// Normalize an optional payload: absent or `null` becomes `{}`.
pub fn normalize_payload(
    field: &str,
    value: Option<serde_json::Value>,
) -> Result<serde_json::Value, CoreError> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(serde_json::json!({})),
        Some(v) => {
            validate_payload(field, &v)?;
            Ok(v)
        }
    }
}

/// Validate a progress report against the current value.
///
/// `percent` must lie in `[0, 100]` and never move backwards.
pub fn validate_progress(current: i16, percent: i16) -> Result<(), CoreError> {
    if !(0..=MAX_PROGRESS).contains(&percent) {
        return Err(CoreError::Validation(format!(
            "Progress must be between 0 and {MAX_PROGRESS}, got {percent}"
        )));
    }
    if percent < current {
        return Err(CoreError::Validation(format!(
            "Progress cannot decrease (current {current}, got {percent})"
        )));
    }
    Ok(())
}

/// Validate a failure message: required and bounded.
pub fn validate_error_message(message: &str) -> Result<(), CoreError> {
    if message.trim().is_empty() {
        return Err(CoreError::Validation(
            "error_message must not be empty".into(),
        ));
    }
    if message.chars().count() > MAX_MESSAGE_LEN {
        return Err(CoreError::Validation(format!(
            "error_message must be at most {MAX_MESSAGE_LEN} characters"
        )));
    }
    Ok(())
}
