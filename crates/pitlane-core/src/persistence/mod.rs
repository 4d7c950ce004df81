// Copyright (C) 2025 The Pitlane Racing Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persistence interfaces and backends for pitlane-core.
//!
//! This module defines the store abstraction consumed by the workflow crate
//! and two implementations: SQLite (sqlx) and an in-memory store used by
//! tests and embedded setups. Every call is strongly consistent for the key
//! it touches; nothing here caches records across calls.

pub mod memory;
pub mod sqlite;

pub use self::memory::MemoryPersistence;
pub use self::sqlite::SqlitePersistence;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::job::{JobKey, JobStatus, SubmissionJob, WorkflowJob};
use crate::leaderboard::Leaderboard;
use crate::model::{Model, ModelStatus};
use crate::usage::{AccountResourceUsage, Profile, ProfileUsagePatch};

/// Default page size for list operations.
pub const DEFAULT_MAX_QUERY_RESULTS: usize = 100;

/// Training and evaluation jobs in these statuses back a stoppable model.
pub const STOPPABLE_JOB_STATUSES: [JobStatus; 3] = [
    JobStatus::Queued,
    JobStatus::Initializing,
    JobStatus::InProgress,
];

/// Submissions are only stoppable before they start.
pub const STOPPABLE_SUBMISSION_STATUSES: [JobStatus; 1] = [JobStatus::Queued];

/// Cursor-based page request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    /// Opaque cursor returned by the previous page.
    pub cursor: Option<String>,
    /// Maximum items to return.
    pub max_results: usize,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items in this page.
    pub data: Vec<T>,
    /// Cursor for the next page, `None` when this was the last one.
    pub cursor: Option<String>,
}

/// Persistence interface used by the workflow operations.
#[allow(missing_docs)]
#[async_trait]
pub trait Persistence: Send + Sync {
    // ------------------------------------------------------------------
    // Models
    // ------------------------------------------------------------------

    async fn create_model(&self, model: &Model) -> Result<(), CoreError>;

    async fn get_model(&self, profile_id: &str, model_id: &str)
    -> Result<Option<Model>, CoreError>;

    /// Set a model's status, and its owner-facing error message when given.
    ///
    /// Moving to `Ready` always clears the message.
    /// Fails with `NotFound` when the model does not exist.
    async fn update_model_status(
        &self,
        profile_id: &str,
        model_id: &str,
        status: ModelStatus,
        error_message: Option<&str>,
    ) -> Result<(), CoreError>;

    /// Load a model, failing with `NotFound` when absent.
    async fn load_model(&self, profile_id: &str, model_id: &str) -> Result<Model, CoreError> {
        self.get_model(profile_id, model_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Model", model_id))
    }

    // ------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------

    async fn create_job(&self, job: &WorkflowJob) -> Result<(), CoreError>;

    async fn get_job(&self, job_name: &str) -> Result<Option<WorkflowJob>, CoreError>;

    /// Set a job's status. Fails with `NotFound` when the key matches no job.
    async fn update_job_status(&self, key: &JobKey, status: JobStatus) -> Result<(), CoreError>;

    async fn get_stoppable_training(&self, model_id: &str)
    -> Result<Option<WorkflowJob>, CoreError>;

    async fn get_stoppable_evaluation(
        &self,
        model_id: &str,
    ) -> Result<Option<WorkflowJob>, CoreError>;

    async fn get_stoppable_submission(
        &self,
        model_id: &str,
        profile_id: &str,
    ) -> Result<Option<WorkflowJob>, CoreError>;

    /// A profile's submissions to one leaderboard, newest first.
    async fn list_submissions_by_created_at(
        &self,
        profile_id: &str,
        leaderboard_id: &str,
        max_results: usize,
    ) -> Result<Vec<SubmissionJob>, CoreError>;

    /// Load a job, failing with `NotFound` when absent.
    async fn load_job(&self, job_name: &str) -> Result<WorkflowJob, CoreError> {
        self.get_job(job_name)
            .await?
            .ok_or_else(|| CoreError::not_found("Job", job_name))
    }

    // ------------------------------------------------------------------
    // Profiles
    // ------------------------------------------------------------------

    async fn create_profile(&self, profile: &Profile) -> Result<(), CoreError>;

    async fn get_profile(&self, profile_id: &str) -> Result<Option<Profile>, CoreError>;

    /// Apply a usage patch and return the updated profile.
    ///
    /// Fails with `NotFound` when the profile does not exist.
    async fn update_profile_usage(
        &self,
        profile_id: &str,
        patch: ProfileUsagePatch,
    ) -> Result<Profile, CoreError>;

    /// Page through all profiles in a stable order.
    async fn list_profiles(&self, request: ListRequest) -> Result<Page<Profile>, CoreError>;

    /// Load a profile, failing with `NotFound` when absent.
    async fn load_profile(&self, profile_id: &str) -> Result<Profile, CoreError> {
        self.get_profile(profile_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Profile", profile_id))
    }

    // ------------------------------------------------------------------
    // Account resource usage
    // ------------------------------------------------------------------

    async fn get_account_usage(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Option<AccountResourceUsage>, CoreError>;

    /// Insert or replace the record for `usage.year`/`usage.month`.
    async fn put_account_usage(&self, usage: &AccountResourceUsage) -> Result<(), CoreError>;

    // ------------------------------------------------------------------
    // Leaderboards
    // ------------------------------------------------------------------

    async fn create_leaderboard(&self, leaderboard: &Leaderboard) -> Result<(), CoreError>;

    async fn get_leaderboard(&self, leaderboard_id: &str)
    -> Result<Option<Leaderboard>, CoreError>;

    /// Load a leaderboard, failing with `NotFound` when absent.
    async fn load_leaderboard(&self, leaderboard_id: &str) -> Result<Leaderboard, CoreError> {
        self.get_leaderboard(leaderboard_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Leaderboard", leaderboard_id))
    }
}
