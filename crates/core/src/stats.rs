//! Job statistics aggregation.
//!
//! Stores either feed rows through [`StatsAccumulator`] (in-memory) or
//! hand pre-grouped counts to [`JobStats::from_counts`] (SQL `GROUP BY`).
//! Both paths share the success-rate rule.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::job::{JobStatus, JobType};
use crate::types::Timestamp;

/// Aggregate view over a set of jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStats {
    pub total: i64,
    /// Count per status. Every status is present, zero when unused.
    pub by_status: BTreeMap<JobStatus, i64>,
    /// Count per job type. Every type is present, zero when unused.
    pub by_type: BTreeMap<JobType, i64>,
    /// Mean seconds between `started_at` and `completed_at`, over jobs
    /// that have both. `None` when no job qualifies.
    pub avg_execution_time: Option<f64>,
    /// `completed / (completed + failed + timeout)`. Cancelled and active
    /// jobs are excluded. `None` when the denominator is zero.
    pub success_rate: Option<f64>,
}

impl JobStats {
    /// Build stats from grouped counts. Missing keys count as zero.
    pub fn from_counts(
        status_counts: impl IntoIterator<Item = (JobStatus, i64)>,
        type_counts: impl IntoIterator<Item = (JobType, i64)>,
        avg_execution_time: Option<f64>,
    ) -> Self {
        let mut by_status: BTreeMap<JobStatus, i64> =
            JobStatus::ALL.into_iter().map(|s| (s, 0)).collect();
        for (status, count) in status_counts {
            *by_status.entry(status).or_default() += count;
        }

        let mut by_type: BTreeMap<JobType, i64> =
            JobType::ALL.into_iter().map(|t| (t, 0)).collect();
        for (job_type, count) in type_counts {
            *by_type.entry(job_type).or_default() += count;
        }

        let total = by_status.values().sum();
        let success_rate = success_rate(&by_status);

        Self {
            total,
            by_status,
            by_type,
            avg_execution_time,
            success_rate,
        }
    }
}

/// `completed / (completed + failed + timeout)`, or `None` if no job has
/// reached one of those three states.
pub fn success_rate(by_status: &BTreeMap<JobStatus, i64>) -> Option<f64> {
    let count = |s: JobStatus| by_status.get(&s).copied().unwrap_or(0);
    let completed = count(JobStatus::Completed);
    let denominator = completed + count(JobStatus::Failed) + count(JobStatus::Timeout);
    if denominator == 0 {
        None
    } else {
        Some(completed as f64 / denominator as f64)
    }
}

/// Row-at-a-time accumulator for stores without a query engine.
#[derive(Debug, Default)]
pub struct StatsAccumulator {
    by_status: BTreeMap<JobStatus, i64>,
    by_type: BTreeMap<JobType, i64>,
    execution_secs_sum: f64,
    execution_samples: i64,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        status: JobStatus,
        job_type: JobType,
        started_at: Option<Timestamp>,
        completed_at: Option<Timestamp>,
    ) {
        *self.by_status.entry(status).or_default() += 1;
        *self.by_type.entry(job_type).or_default() += 1;

        if let (Some(start), Some(end)) = (started_at, completed_at) {
            let millis = (end - start).num_milliseconds().max(0);
            self.execution_secs_sum += millis as f64 / 1000.0;
            self.execution_samples += 1;
        }
    }

    pub fn finish(self) -> JobStats {
        let avg = if self.execution_samples > 0 {
            Some(self.execution_secs_sum / self.execution_samples as f64)
        } else {
            None
        };
        JobStats::from_counts(self.by_status, self.by_type, avg)
    }
}
