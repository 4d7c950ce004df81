// Copyright (C) 2025 The Pitlane Racing Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Backend trait definitions.
//!
//! Defines the abstract interface for the service that actually runs
//! training, evaluation and submission simulations.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from backend operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum BackendError {
    /// The backend does not know the job (yet).
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// The backend rejected the request as invalid for the job's state.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The request was throttled.
    #[error("Request throttled")]
    Throttled,

    /// No quota with that code.
    #[error("Service quota not found: {0}")]
    QuotaNotFound(String),

    /// The backend could not be reached.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Job status as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackendJobStatus {
    /// Accepted but not running yet.
    Pending,
    /// Running.
    InProgress,
    /// Stop requested.
    Stopping,
    /// Stopped before completion.
    Stopped,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
}

impl BackendJobStatus {
    /// No further transitions happen from a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Completed | Self::Failed)
    }
}

impl fmt::Display for BackendJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Stopping => "STOPPING",
            Self::Stopped => "STOPPED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Compute resources for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Instance type, e.g. `ml.c5.4xlarge`.
    pub instance_type: String,
    /// Number of instances.
    pub instance_count: u32,
    /// Attached volume size.
    pub volume_size_gb: u32,
}

/// Everything the backend needs to start a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateJobRequest {
    /// Backend job name; unique.
    pub job_name: String,
    /// Role the job runs as.
    pub role_arn: Option<String>,
    /// Container image.
    pub image: String,
    /// Where the backend writes job output.
    pub output_path: String,
    /// Compute resources.
    pub instance: InstanceConfig,
    /// Hard runtime ceiling.
    pub max_runtime_seconds: i64,
    /// Parameters passed to the simulation, all stringly typed.
    pub hyperparameters: BTreeMap<String, String>,
}

/// Handle for a created job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    /// Backend job name.
    pub job_name: String,
    /// Backend resource identifier.
    pub job_arn: String,
}

/// Result of a describe call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescription {
    /// Backend job name.
    pub job_name: String,
    /// Current status.
    pub status: BackendJobStatus,
    /// When the backend accepted the job.
    pub creation_time: DateTime<Utc>,
    /// Billable runtime so far.
    pub billable_seconds: Option<i64>,
    /// Failure reason for failed jobs.
    pub failure_reason: Option<String>,
}

/// Filter for listing jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListJobsFilter {
    /// Only jobs whose name contains this substring.
    pub name_contains: Option<String>,
    /// Only jobs in this status.
    pub status: Option<BackendJobStatus>,
    /// Only jobs created after this instant.
    pub created_after: Option<DateTime<Utc>>,
}

/// One entry of a job listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    /// Backend job name.
    pub job_name: String,
    /// Current status.
    pub status: BackendJobStatus,
    /// Creation time.
    pub creation_time: DateTime<Utc>,
}

/// One page of a job listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobSummaryPage {
    /// Jobs in this page.
    pub jobs: Vec<JobSummary>,
    /// Token for the next page, `None` on the last page.
    pub next_token: Option<String>,
}

/// Trait for job execution backends.
///
/// Backends are PURE remote clients - they do NOT access the database.
/// Store updates are made by the caller once a backend call has succeeded.
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Backend type identifier (e.g., "sagemaker", "mock")
    fn backend_type(&self) -> &'static str;

    /// Start a job.
    async fn create_job(&self, request: &CreateJobRequest) -> Result<JobHandle>;

    /// Fetch a job's current status.
    async fn describe_job(&self, job_name: &str) -> Result<JobDescription>;

    /// Stop a running job. Only valid while the job is IN_PROGRESS.
    async fn stop_job(&self, job_name: &str) -> Result<()>;

    /// List one page of jobs matching `filter`.
    async fn list_jobs(
        &self,
        filter: &ListJobsFilter,
        next_token: Option<String>,
    ) -> Result<JobSummaryPage>;

    /// Look up a numeric service quota.
    async fn get_service_quota(&self, service_code: &str, quota_code: &str) -> Result<f64>;
}
