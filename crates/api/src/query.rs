//! Query parameter types for API handlers.

use jobhub_core::job::{JobStatus, JobType};
use jobhub_core::listing::{clamp_limit, clamp_offset, JobSortField};
use jobhub_core::retention::DEFAULT_RETENTION_DAYS;
use jobhub_db::models::job::JobFilter;
use serde::Deserialize;

use crate::error::AppResult;

/// `GET /jobs?skip=&limit=&job_type=&status=&sort_by=&sort_desc=`.
///
/// Enum-valued parameters stay strings here so an unknown value is a
/// validation error with a useful message.
#[derive(Debug, Default, Deserialize)]
pub struct JobListParams {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub job_type: Option<String>,
    pub status: Option<String>,
    pub sort_by: Option<String>,
    pub sort_desc: Option<bool>,
}

impl JobListParams {
    /// Validate and clamp into a store filter. The organization scope is
    /// filled in by the controller.
    pub fn into_filter(self) -> AppResult<JobFilter> {
        let job_type = self.job_type.as_deref().map(JobType::parse).transpose()?;
        let status = self.status.as_deref().map(JobStatus::parse).transpose()?;
        let sort_by = self
            .sort_by
            .as_deref()
            .map(JobSortField::parse)
            .transpose()?
            .unwrap_or_default();

        Ok(JobFilter {
            organization_id: None,
            job_type,
            status,
            sort_by,
            sort_desc: self.sort_desc.unwrap_or(true),
            skip: clamp_offset(self.skip),
            limit: clamp_limit(self.limit),
        })
    }
}

/// `POST /jobs/cleanup?days_to_keep=`.
#[derive(Debug, Deserialize)]
pub struct CleanupParams {
    #[serde(default = "default_days_to_keep")]
    pub days_to_keep: i64,
}

fn default_days_to_keep() -> i64 {
    DEFAULT_RETENTION_DAYS
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use jobhub_core::error::CoreError;
    use jobhub_core::listing::{DEFAULT_LIMIT, MAX_LIMIT};

    use super::*;
    use crate::error::AppError;

    #[test]
    fn defaults_are_newest_first_first_page() {
        let filter = JobListParams::default().into_filter().expect("valid");
        assert_eq!(filter.sort_by, JobSortField::CreatedAt);
        assert!(filter.sort_desc);
        assert_eq!(filter.skip, 0);
        assert_eq!(filter.limit, DEFAULT_LIMIT);
        assert!(filter.job_type.is_none());
        assert!(filter.status.is_none());
    }

    #[test]
    fn values_are_parsed_and_clamped() {
        let filter = JobListParams {
            skip: Some(-5),
            limit: Some(1000),
            job_type: Some("validation".into()),
            status: Some("running".into()),
            sort_by: Some("priority".into()),
            sort_desc: Some(false),
        }
        .into_filter()
        .expect("valid");

        assert_eq!(filter.skip, 0);
        assert_eq!(filter.limit, MAX_LIMIT);
        assert_eq!(filter.job_type, Some(JobType::Validation));
        assert_eq!(filter.status, Some(JobStatus::Running));
        assert_eq!(filter.sort_by, JobSortField::Priority);
        assert!(!filter.sort_desc);
    }

    #[test]
    fn unknown_enum_values_are_validation_errors() {
        let bad_sort = JobListParams {
            sort_by: Some("password".into()),
            ..Default::default()
        };
        assert_matches!(
            bad_sort.into_filter(),
            Err(AppError::Core(CoreError::Validation(_)))
        );

        let bad_status = JobListParams {
            status: Some("exploded".into()),
            ..Default::default()
        };
        assert_matches!(
            bad_status.into_filter(),
            Err(AppError::Core(CoreError::Validation(_)))
        );
    }
}
