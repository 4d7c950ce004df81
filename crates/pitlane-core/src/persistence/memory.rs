// Copyright (C) 2025 The Pitlane Racing Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory persistence for tests and embedded use.
//!
//! Besides plain storage it can inject failures for specific keys, slow down
//! profile writes and record how many profile writes were in flight at once,
//! which is what the batch reset tests observe.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::CoreError;
use crate::job::{JobKey, JobKind, JobStatus, SubmissionJob, WorkflowJob};
use crate::leaderboard::Leaderboard;
use crate::model::{Model, ModelStatus};
use crate::usage::{AccountResourceUsage, Profile, ProfileUsagePatch};

use super::{
    ListRequest, Page, Persistence, STOPPABLE_JOB_STATUSES, STOPPABLE_SUBMISSION_STATUSES,
};

#[derive(Default)]
struct State {
    models: HashMap<(String, String), Model>,
    jobs: HashMap<String, WorkflowJob>,
    profiles: BTreeMap<String, Profile>,
    account_usage: HashMap<(i32, u32), AccountResourceUsage>,
    leaderboards: HashMap<String, Leaderboard>,
    failing_profiles: HashSet<String>,
    failing_models: HashSet<String>,
}

/// In-memory persistence provider.
#[derive(Default)]
pub struct MemoryPersistence {
    state: Mutex<State>,
    profile_update_delay: Option<Duration>,
    in_flight_profile_updates: AtomicUsize,
    peak_profile_updates: AtomicUsize,
    writes: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemoryPersistence {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every profile update for `delay` before applying it.
    pub fn with_profile_update_delay(mut self, delay: Duration) -> Self {
        self.profile_update_delay = Some(delay);
        self
    }

    /// Make every later update of this profile fail with a database error.
    pub async fn fail_profile_updates(&self, profile_id: &str) {
        self.state
            .lock()
            .await
            .failing_profiles
            .insert(profile_id.to_string());
    }

    /// Make every later status update of this model fail with a database error.
    pub async fn fail_model_updates(&self, model_id: &str) {
        self.state
            .lock()
            .await
            .failing_models
            .insert(model_id.to_string());
    }

    /// Highest number of profile updates observed in flight at the same time.
    pub fn peak_concurrent_profile_updates(&self) -> usize {
        self.peak_profile_updates.load(Ordering::SeqCst)
    }

    /// Number of successful writes (creates and updates) so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    fn injected(operation: &str, key: &str) -> CoreError {
        CoreError::Database {
            operation: operation.to_string(),
            details: format!("injected failure for '{}'", key),
        }
    }

    async fn latest_job_matching(
        &self,
        kind: JobKind,
        statuses: &[JobStatus],
        matches: impl Fn(&WorkflowJob) -> bool,
    ) -> Option<WorkflowJob> {
        let state = self.state.lock().await;
        state
            .jobs
            .values()
            .filter(|job| job.kind() == kind && statuses.contains(&job.status()) && matches(job))
            .max_by_key(|job| job.record().created_at)
            .cloned()
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    async fn create_model(&self, model: &Model) -> Result<(), CoreError> {
        let mut state = self.state.lock().await;
        state.models.insert(
            (model.profile_id.clone(), model.model_id.clone()),
            model.clone(),
        );
        self.record_write();
        Ok(())
    }

    async fn get_model(
        &self,
        profile_id: &str,
        model_id: &str,
    ) -> Result<Option<Model>, CoreError> {
        let state = self.state.lock().await;
        Ok(state
            .models
            .get(&(profile_id.to_string(), model_id.to_string()))
            .cloned())
    }

    async fn update_model_status(
        &self,
        profile_id: &str,
        model_id: &str,
        status: ModelStatus,
        error_message: Option<&str>,
    ) -> Result<(), CoreError> {
        let mut state = self.state.lock().await;
        if state.failing_models.contains(model_id) {
            return Err(Self::injected("update_model_status", model_id));
        }
        let model = state
            .models
            .get_mut(&(profile_id.to_string(), model_id.to_string()))
            .ok_or_else(|| CoreError::not_found("Model", model_id))?;
        model.status = status;
        if status == ModelStatus::Ready {
            model.error_message = None;
        } else if let Some(message) = error_message {
            model.error_message = Some(message.to_string());
        }
        model.updated_at = Utc::now();
        self.record_write();
        Ok(())
    }

    async fn create_job(&self, job: &WorkflowJob) -> Result<(), CoreError> {
        let mut state = self.state.lock().await;
        state.jobs.insert(job.name().to_string(), job.clone());
        self.record_write();
        Ok(())
    }

    async fn get_job(&self, job_name: &str) -> Result<Option<WorkflowJob>, CoreError> {
        Ok(self.state.lock().await.jobs.get(job_name).cloned())
    }

    async fn update_job_status(&self, key: &JobKey, status: JobStatus) -> Result<(), CoreError> {
        let mut state = self.state.lock().await;
        let job = state
            .jobs
            .get_mut(&key.job_name)
            .filter(|job| job.key() == *key)
            .ok_or_else(|| CoreError::not_found("Job", key.job_name.clone()))?;
        let record = job.record_mut();
        record.status = status;
        record.updated_at = Utc::now();
        self.record_write();
        Ok(())
    }

    async fn get_stoppable_training(
        &self,
        model_id: &str,
    ) -> Result<Option<WorkflowJob>, CoreError> {
        Ok(self
            .latest_job_matching(JobKind::Training, &STOPPABLE_JOB_STATUSES, |job| {
                job.record().model_id == model_id
            })
            .await)
    }

    async fn get_stoppable_evaluation(
        &self,
        model_id: &str,
    ) -> Result<Option<WorkflowJob>, CoreError> {
        Ok(self
            .latest_job_matching(JobKind::Evaluation, &STOPPABLE_JOB_STATUSES, |job| {
                job.record().model_id == model_id
            })
            .await)
    }

    async fn get_stoppable_submission(
        &self,
        model_id: &str,
        profile_id: &str,
    ) -> Result<Option<WorkflowJob>, CoreError> {
        Ok(self
            .latest_job_matching(
                JobKind::Submission,
                &STOPPABLE_SUBMISSION_STATUSES,
                |job| job.record().model_id == model_id && job.record().profile_id == profile_id,
            )
            .await)
    }

    async fn list_submissions_by_created_at(
        &self,
        profile_id: &str,
        leaderboard_id: &str,
        max_results: usize,
    ) -> Result<Vec<SubmissionJob>, CoreError> {
        let state = self.state.lock().await;
        let mut submissions: Vec<SubmissionJob> = state
            .jobs
            .values()
            .filter_map(|job| match job {
                WorkflowJob::Submission(sub)
                    if sub.job.profile_id == profile_id && sub.leaderboard_id == leaderboard_id =>
                {
                    Some(sub.clone())
                }
                _ => None,
            })
            .collect();
        submissions.sort_by(|a, b| {
            b.job
                .created_at
                .cmp(&a.job.created_at)
                .then(b.submission_number.cmp(&a.submission_number))
        });
        submissions.truncate(max_results);
        Ok(submissions)
    }

    async fn create_profile(&self, profile: &Profile) -> Result<(), CoreError> {
        let mut state = self.state.lock().await;
        state
            .profiles
            .insert(profile.profile_id.clone(), profile.clone());
        self.record_write();
        Ok(())
    }

    async fn get_profile(&self, profile_id: &str) -> Result<Option<Profile>, CoreError> {
        Ok(self.state.lock().await.profiles.get(profile_id).cloned())
    }

    async fn update_profile_usage(
        &self,
        profile_id: &str,
        patch: ProfileUsagePatch,
    ) -> Result<Profile, CoreError> {
        let in_flight = self.in_flight_profile_updates.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight_profile_updates);
        self.peak_profile_updates
            .fetch_max(in_flight, Ordering::SeqCst);

        if let Some(delay) = self.profile_update_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().await;
        if state.failing_profiles.contains(profile_id) {
            return Err(Self::injected("update_profile_usage", profile_id));
        }
        let profile = state
            .profiles
            .get_mut(profile_id)
            .ok_or_else(|| CoreError::not_found("Profile", profile_id))?;
        patch.apply(profile);
        self.record_write();
        Ok(profile.clone())
    }

    async fn list_profiles(&self, request: ListRequest) -> Result<Page<Profile>, CoreError> {
        let limit = request.max_results.max(1);
        let state = self.state.lock().await;
        let lower = match &request.cursor {
            Some(cursor) => Bound::Excluded(cursor.clone()),
            None => Bound::Unbounded,
        };
        let mut data: Vec<Profile> = state
            .profiles
            .range((lower, Bound::Unbounded))
            .take(limit + 1)
            .map(|(_, profile)| profile.clone())
            .collect();

        let cursor = if data.len() > limit {
            data.truncate(limit);
            data.last().map(|p| p.profile_id.clone())
        } else {
            None
        };

        Ok(Page { data, cursor })
    }

    async fn get_account_usage(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Option<AccountResourceUsage>, CoreError> {
        Ok(self
            .state
            .lock()
            .await
            .account_usage
            .get(&(year, month))
            .copied())
    }

    async fn put_account_usage(&self, usage: &AccountResourceUsage) -> Result<(), CoreError> {
        let mut state = self.state.lock().await;
        state.account_usage.insert((usage.year, usage.month), *usage);
        self.record_write();
        Ok(())
    }

    async fn create_leaderboard(&self, leaderboard: &Leaderboard) -> Result<(), CoreError> {
        let mut state = self.state.lock().await;
        state
            .leaderboards
            .insert(leaderboard.leaderboard_id.clone(), leaderboard.clone());
        self.record_write();
        Ok(())
    }

    async fn get_leaderboard(
        &self,
        leaderboard_id: &str,
    ) -> Result<Option<Leaderboard>, CoreError> {
        Ok(self
            .state
            .lock()
            .await
            .leaderboards
            .get(leaderboard_id)
            .cloned())
    }
}
