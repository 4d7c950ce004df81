// Copyright (C) 2025 The Pitlane Racing Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock backend for testing.
//!
//! Keeps jobs in memory, records every call, and lets tests script the
//! sequence of statuses (or errors) that `describe_job` returns.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::traits::*;

/// A call received by the mock, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    /// `create_job` for the named job.
    Create(String),
    /// `describe_job` for the named job.
    Describe(String),
    /// `stop_job` for the named job.
    Stop(String),
    /// `list_jobs` with the given status filter.
    List(Option<BackendJobStatus>),
    /// `get_service_quota` for the given quota code.
    Quota(String),
}

#[derive(Debug, Clone)]
struct MockJob {
    status: BackendJobStatus,
    creation_time: DateTime<Utc>,
}

#[derive(Default)]
struct MockState {
    jobs: HashMap<String, MockJob>,
    describe_scripts: HashMap<String, VecDeque<Result<BackendJobStatus>>>,
    created: Vec<CreateJobRequest>,
    calls: Vec<BackendCall>,
    quotas: HashMap<String, f64>,
    stop_error: Option<BackendError>,
}

/// Mock backend for testing.
pub struct MockBackend {
    state: Mutex<MockState>,
    /// Jobs returned per `list_jobs` page
    pub list_page_size: usize,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create an empty mock backend.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            list_page_size: 100,
        }
    }

    /// Page size for `list_jobs`, to exercise pagination.
    pub fn with_list_page_size(mut self, size: usize) -> Self {
        self.list_page_size = size.max(1);
        self
    }

    /// Register a job created now.
    pub async fn insert_job(&self, job_name: &str, status: BackendJobStatus) {
        self.insert_job_created_at(job_name, status, Utc::now()).await;
    }

    /// Register a job with an explicit creation time.
    pub async fn insert_job_created_at(
        &self,
        job_name: &str,
        status: BackendJobStatus,
        creation_time: DateTime<Utc>,
    ) {
        self.state.lock().await.jobs.insert(
            job_name.to_string(),
            MockJob {
                status,
                creation_time,
            },
        );
    }

    /// Change the status of a known job.
    pub async fn set_status(&self, job_name: &str, status: BackendJobStatus) {
        if let Some(job) = self.state.lock().await.jobs.get_mut(job_name) {
            job.status = status;
        }
    }

    /// Current status of a job, if known.
    pub async fn status(&self, job_name: &str) -> Option<BackendJobStatus> {
        self.state
            .lock()
            .await
            .jobs
            .get(job_name)
            .map(|job| job.status)
    }

    /// Queue results for successive `describe_job` calls on `job_name`.
    ///
    /// A scripted status also becomes the job's current status. Once the
    /// script runs out, describe reports the current status again.
    pub async fn script_describe(
        &self,
        job_name: &str,
        results: impl IntoIterator<Item = Result<BackendJobStatus>>,
    ) {
        self.state
            .lock()
            .await
            .describe_scripts
            .entry(job_name.to_string())
            .or_default()
            .extend(results);
    }

    /// Make every later `stop_job` call fail with `error`.
    pub async fn fail_stops_with(&self, error: BackendError) {
        self.state.lock().await.stop_error = Some(error);
    }

    /// Set the value returned for a quota code.
    pub async fn set_service_quota(&self, quota_code: &str, value: f64) {
        self.state
            .lock()
            .await
            .quotas
            .insert(quota_code.to_string(), value);
    }

    /// All calls received so far.
    pub async fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().await.calls.clone()
    }

    /// Names of jobs `stop_job` was called for.
    pub async fn stop_calls(&self) -> Vec<String> {
        self.calls()
            .await
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::Stop(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Number of `describe_job` calls for `job_name`.
    pub async fn describe_count(&self, job_name: &str) -> usize {
        self.calls()
            .await
            .iter()
            .filter(|call| matches!(call, BackendCall::Describe(name) if name == job_name))
            .count()
    }

    /// Requests received by `create_job`.
    pub async fn created_jobs(&self) -> Vec<CreateJobRequest> {
        self.state.lock().await.created.clone()
    }
}

#[async_trait]
impl JobBackend for MockBackend {
    fn backend_type(&self) -> &'static str {
        "mock"
    }

    async fn create_job(&self, request: &CreateJobRequest) -> Result<JobHandle> {
        let mut state = self.state.lock().await;
        state
            .calls
            .push(BackendCall::Create(request.job_name.clone()));

        if state.jobs.contains_key(&request.job_name) {
            return Err(BackendError::Validation(format!(
                "Job {} already exists",
                request.job_name
            )));
        }

        state.jobs.insert(
            request.job_name.clone(),
            MockJob {
                status: BackendJobStatus::InProgress,
                creation_time: Utc::now(),
            },
        );
        state.created.push(request.clone());

        Ok(JobHandle {
            job_name: request.job_name.clone(),
            job_arn: format!("arn:mock:training-job/{}", request.job_name),
        })
    }

    async fn describe_job(&self, job_name: &str) -> Result<JobDescription> {
        let mut state = self.state.lock().await;
        state
            .calls
            .push(BackendCall::Describe(job_name.to_string()));

        let scripted = state
            .describe_scripts
            .get_mut(job_name)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(Err(e)) => return Err(e),
            Some(Ok(status)) => {
                state
                    .jobs
                    .entry(job_name.to_string())
                    .and_modify(|job| job.status = status)
                    .or_insert_with(|| MockJob {
                        status,
                        creation_time: Utc::now(),
                    });
            }
            None => {}
        }

        let job = state
            .jobs
            .get(job_name)
            .ok_or_else(|| BackendError::JobNotFound(job_name.to_string()))?;

        Ok(JobDescription {
            job_name: job_name.to_string(),
            status: job.status,
            creation_time: job.creation_time,
            billable_seconds: None,
            failure_reason: None,
        })
    }

    async fn stop_job(&self, job_name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.calls.push(BackendCall::Stop(job_name.to_string()));

        if let Some(error) = &state.stop_error {
            return Err(error.clone());
        }

        let job = state
            .jobs
            .get_mut(job_name)
            .ok_or_else(|| BackendError::JobNotFound(job_name.to_string()))?;

        if job.status != BackendJobStatus::InProgress {
            return Err(BackendError::Validation(format!(
                "Job {} is {} and cannot be stopped",
                job_name, job.status
            )));
        }

        job.status = BackendJobStatus::Stopping;
        Ok(())
    }

    async fn list_jobs(
        &self,
        filter: &ListJobsFilter,
        next_token: Option<String>,
    ) -> Result<JobSummaryPage> {
        let mut state = self.state.lock().await;
        state.calls.push(BackendCall::List(filter.status));

        let mut matching: Vec<JobSummary> = state
            .jobs
            .iter()
            .filter(|(name, job)| {
                filter
                    .name_contains
                    .as_deref()
                    .is_none_or(|needle| name.contains(needle))
                    && filter.status.is_none_or(|status| job.status == status)
                    && filter
                        .created_after
                        .is_none_or(|after| job.creation_time > after)
            })
            .map(|(name, job)| JobSummary {
                job_name: name.clone(),
                status: job.status,
                creation_time: job.creation_time,
            })
            .collect();
        matching.sort_by(|a, b| a.job_name.cmp(&b.job_name));

        let start = match next_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| BackendError::Validation(format!("invalid token {}", token)))?,
            None => 0,
        };
        let end = (start + self.list_page_size).min(matching.len());
        let jobs = matching.get(start..end).unwrap_or_default().to_vec();
        let next_token = (end < matching.len()).then(|| end.to_string());

        Ok(JobSummaryPage { jobs, next_token })
    }

    async fn get_service_quota(&self, _service_code: &str, quota_code: &str) -> Result<f64> {
        let mut state = self.state.lock().await;
        state.calls.push(BackendCall::Quota(quota_code.to_string()));
        state
            .quotas
            .get(quota_code)
            .copied()
            .ok_or_else(|| BackendError::QuotaNotFound(quota_code.to_string()))
    }
}
