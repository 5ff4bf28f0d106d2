//! Pagination and sort options for job listings.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default page size.
pub const DEFAULT_LIMIT: i64 = 50;

/// Maximum page size.
pub const MAX_LIMIT: i64 = 100;

/// Clamp a requested page size to `1..=MAX_LIMIT`, defaulting when absent.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Clamp a requested offset to be non-negative.
pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}

/// Column a job listing can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobSortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Name,
    Priority,
    Status,
    JobType,
}

impl JobSortField {
    const ALL: [JobSortField; 6] = [
        Self::CreatedAt,
        Self::UpdatedAt,
        Self::Name,
        Self::Priority,
        Self::Status,
        Self::JobType,
    ];

    /// Column name; also the accepted `sort_by` value.
    pub fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::Name => "name",
            Self::Priority => "priority",
            Self::Status => "status",
            Self::JobType => "job_type",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|f| f.column() == s)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Cannot sort by '{s}'. Valid fields: {}",
                    Self::ALL.map(Self::column).join(", ")
                ))
            })
    }
}
