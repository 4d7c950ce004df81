// Copyright (C) 2025 The Pitlane Racing Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Model operation handlers.
//!
//! Handles stop-model and create-submission requests. Each handler reads the
//! records it needs, validates preconditions, talks to the backend and only
//! then writes the resulting statuses.

use std::sync::Arc;

use chrono::Utc;
use pitlane_core::error::{CoreError, INTERNAL_SERVICE_ERROR};
use pitlane_core::job::{
    JobAssetLocations, JobKind, JobRecord, JobStatus, SubmissionJob, TerminationConditions, WorkflowJob,
};
use pitlane_core::leaderboard::DEFAULT_SUBMISSION_MAX_TIME_IN_MINUTES;
use pitlane_core::model::ModelStatus;
use pitlane_core::persistence::Persistence;
use tracing::{debug, error, info, instrument, warn};

use crate::error::Result;
use crate::execution::JobExecutor;
use crate::queue::{JobQueue, WorkflowMessage};

/// Rejection for models without an active job.
pub const NOT_STOPPABLE_MESSAGE: &str = "Model is not in a stoppable state.";

/// Rejection for jobs the backend is still setting up.
pub const INITIALIZING_MESSAGE: &str = "Model cannot be stopped during job initialization.";

/// Rejection for models that are busy or broken.
pub const NOT_SUBMITTABLE_MESSAGE: &str = "Model is not in a submittable state.";

/// Rejection outside a leaderboard's open window.
pub const LEADERBOARD_CLOSED_MESSAGE: &str = "The leaderboard is not accepting submissions.";

/// Rejection once a racer used up their submissions.
pub const MAX_SUBMISSIONS_MESSAGE: &str = "Max number of submissions has been reached.";

/// Shared state for model handlers.
pub struct WorkflowHandlerState {
    /// Record store.
    pub persistence: Arc<dyn Persistence>,
    /// Backend job adapter.
    pub executor: Arc<JobExecutor>,
    /// Queue feeding the workflow.
    pub queue: Arc<dyn JobQueue>,
}

impl WorkflowHandlerState {
    /// Create a new handler state.
    pub fn new(
        persistence: Arc<dyn Persistence>,
        executor: Arc<JobExecutor>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            persistence,
            executor,
            queue,
        }
    }
}

// ============================================================================
// Stop Model
// ============================================================================

/// Request to stop whatever job a model is running.
#[derive(Debug, Clone)]
pub struct StopModelRequest {
    /// Model to stop.
    pub model_id: String,
    /// Caller; must own the model.
    pub profile_id: String,
}

/// Stop model response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopModelResponse {}

/// Handle stop model request.
///
/// Running jobs move to STOPPING and are finalized later by the workflow.
/// Queued jobs are cancelled here and get their final statuses right away:
/// the job becomes CANCELED and the model returns to READY, or to ERROR for
/// training since no artifact exists yet.
#[instrument(skip(state, request), fields(model_id = %request.model_id, profile_id = %request.profile_id))]
pub async fn handle_stop_model(
    state: &WorkflowHandlerState,
    request: StopModelRequest,
) -> Result<StopModelResponse> {
    let StopModelRequest {
        model_id,
        profile_id,
    } = request;
    let persistence = &state.persistence;

    let model = persistence.load_model(&profile_id, &model_id).await?;
    debug!(model_status = %model.status, "Model loaded");

    let stoppable = match model.status {
        ModelStatus::Evaluating => persistence.get_stoppable_evaluation(&model_id).await?,
        ModelStatus::Training => persistence.get_stoppable_training(&model_id).await?,
        ModelStatus::Queued => {
            let (evaluation, submission, training) = tokio::try_join!(
                persistence.get_stoppable_evaluation(&model_id),
                persistence.get_stoppable_submission(&model_id, &profile_id),
                persistence.get_stoppable_training(&model_id),
            )?;
            debug!(
                has_evaluation = evaluation.is_some(),
                has_submission = submission.is_some(),
                has_training = training.is_some(),
                "Stoppable job search complete"
            );
            evaluation.or(submission).or(training)
        }
        status => {
            warn!(model_status = %status, "Model is not in a stoppable state");
            return Err(CoreError::bad_request(NOT_STOPPABLE_MESSAGE).into());
        }
    };

    let Some(job) = stoppable else {
        error!(
            model_status = %model.status,
            "Unable to find stoppable job for model in stoppable status"
        );
        return Err(CoreError::internal(INTERNAL_SERVICE_ERROR).into());
    };
    debug!(job_name = %job.name(), job_status = %job.status(), "Stoppable job found");

    let (job_status, model_status) = match job.status() {
        JobStatus::Initializing => {
            warn!(job_name = %job.name(), "Job is initializing, refusing to stop");
            return Err(CoreError::bad_request(INITIALIZING_MESSAGE).into());
        }
        JobStatus::InProgress => {
            state.executor.stop_training_job(job.name()).await?;
            (JobStatus::Stopping, ModelStatus::Stopping)
        }
        JobStatus::Queued => {
            state.executor.stop_queued_job(job.name()).await?;
            let model_status = if job.is_training() {
                ModelStatus::Error
            } else {
                ModelStatus::Ready
            };
            (JobStatus::Canceled, model_status)
        }
        other => {
            error!(job_name = %job.name(), job_status = %other, "Invalid status for stoppable job");
            return Err(CoreError::internal(INTERNAL_SERVICE_ERROR).into());
        }
    };

    let key = job.key();
    tokio::try_join!(
        persistence.update_model_status(&profile_id, &model_id, model_status, None),
        persistence.update_job_status(&key, job_status),
    )?;

    info!(
        job_name = %key.job_name,
        %job_status,
        %model_status,
        "Model stopped"
    );
    Ok(StopModelResponse {})
}

// ============================================================================
// Create Submission
// ============================================================================

/// Request to race a model on a leaderboard.
#[derive(Debug, Clone)]
pub struct CreateSubmissionRequest {
    /// Target leaderboard.
    pub leaderboard_id: String,
    /// Model to race.
    pub model_id: String,
    /// Caller; must own the model.
    pub profile_id: String,
}

/// Create submission response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSubmissionResponse {
    /// Identifier of the new submission.
    pub submission_id: String,
}

/// Handle create submission request.
#[instrument(skip(state, request), fields(
    leaderboard_id = %request.leaderboard_id,
    model_id = %request.model_id,
    profile_id = %request.profile_id,
))]
pub async fn handle_create_submission(
    state: &WorkflowHandlerState,
    request: CreateSubmissionRequest,
) -> Result<CreateSubmissionResponse> {
    let CreateSubmissionRequest {
        leaderboard_id,
        model_id,
        profile_id,
    } = request;
    let persistence = &state.persistence;

    let (model, leaderboard) = tokio::try_join!(
        persistence.load_model(&profile_id, &model_id),
        persistence.load_leaderboard(&leaderboard_id),
    )?;

    if model.status != ModelStatus::Ready {
        return Err(CoreError::bad_request(NOT_SUBMITTABLE_MESSAGE).into());
    }

    let now = Utc::now();
    if !leaderboard.is_open_at(now) {
        return Err(CoreError::bad_request(LEADERBOARD_CLOSED_MESSAGE).into());
    }

    let previous = persistence
        .list_submissions_by_created_at(&profile_id, &leaderboard_id, 1)
        .await?
        .first()
        .map(|submission| submission.submission_number)
        .unwrap_or(0);
    if previous >= leaderboard.max_submissions_per_user {
        return Err(CoreError::bad_request(MAX_SUBMISSIONS_MESSAGE).into());
    }

    let submission_id = uuid::Uuid::new_v4().to_string();
    let job_name = JobKind::Submission.job_name(&submission_id);
    let conditions = &leaderboard.submission_termination_conditions;
    let job = WorkflowJob::Submission(SubmissionJob {
        job: JobRecord {
            job_name: job_name.clone(),
            model_id: model_id.clone(),
            profile_id: profile_id.clone(),
            status: JobStatus::Queued,
            termination_conditions: TerminationConditions {
                max_time_in_minutes: conditions
                    .max_time_in_minutes
                    .unwrap_or(DEFAULT_SUBMISSION_MAX_TIME_IN_MINUTES),
                max_laps: conditions.max_laps,
            },
            track_config: leaderboard.track_config.clone(),
            asset_locations: JobAssetLocations::for_job(
                &model.asset_locations.model_root,
                JobKind::Submission,
            ),
            created_at: now,
            updated_at: now,
        },
        submission_id: submission_id.clone(),
        leaderboard_id: leaderboard_id.clone(),
        submission_number: previous + 1,
        race_type: leaderboard.race_type,
        object_avoidance_config: leaderboard.object_avoidance_config.clone(),
        resetting_behavior_config: leaderboard.resetting_behavior_config.clone(),
    });

    tokio::try_join!(
        persistence.create_job(&job),
        persistence.update_model_status(&profile_id, &model_id, ModelStatus::Queued, None),
    )?;

    let message = WorkflowMessage {
        model_id,
        profile_id,
        leaderboard_id: Some(leaderboard_id),
        job_name,
    };
    debug!(?message, "Sending workflow message");
    state.queue.enqueue(message).await?;

    info!(%submission_id, submission_number = previous + 1, "Submission created");
    Ok(CreateSubmissionResponse { submission_id })
}
