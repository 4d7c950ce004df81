// Copyright (C) 2025 The Pitlane Racing Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Record fixtures shared by unit and integration tests.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::job::{
    JobAssetLocations, JobKind, JobRecord, JobStatus, RaceType, SubmissionJob,
    TerminationConditions, TrackConfig, TrackDirection, WorkflowJob,
};
use crate::leaderboard::{Leaderboard, SubmissionTerminationConditions};
use crate::model::{Model, ModelAssetLocations, ModelStatus};
use crate::usage::Profile;

/// Bucket used by fixture asset locations.
pub const BUCKET: &str = "pitlane-models";

/// A profile with zero usage and a 600 minute / 10 model quota.
pub fn profile(profile_id: &str) -> Profile {
    Profile {
        profile_id: profile_id.to_string(),
        alias: format!("racer-{}", profile_id),
        compute_minutes_used: 0,
        compute_minutes_queued: 0,
        max_total_compute_minutes: Some(600),
        model_count: 0,
        max_model_count: Some(10),
        created_at: Utc::now(),
    }
}

/// A model with asset locations under [`BUCKET`].
pub fn model(profile_id: &str, model_id: &str, status: ModelStatus) -> Model {
    let root = format!("{}/models/{}", profile_id, model_id);
    let now = Utc::now();
    Model {
        model_id: model_id.to_string(),
        profile_id: profile_id.to_string(),
        name: format!("model-{}", model_id),
        status,
        cloned_from_model_id: None,
        asset_locations: ModelAssetLocations {
            model_root: format!("s3://{}/{}", BUCKET, root),
            model_metadata: format!("s3://{}/{}/model_metadata.json", BUCKET, root),
            reward_function: format!("s3://{}/{}/reward_function.py", BUCKET, root),
            training_artifacts: format!("s3://{}/{}/artifacts", BUCKET, root),
            model_artifact: None,
        },
        hyperparameters: BTreeMap::from([
            ("batch_size".to_string(), serde_json::json!(64)),
            ("discount_factor".to_string(), serde_json::json!(0.99)),
        ]),
        error_message: None,
        created_at: now,
        updated_at: now,
    }
}

fn record(kind: JobKind, id: &str, model_id: &str, profile_id: &str, minutes: i64) -> JobRecord {
    let job_name = kind.job_name(id);
    let now = Utc::now();
    JobRecord {
        asset_locations: JobAssetLocations {
            simulation_yaml: format!(
                "s3://{}/{}/models/{}/{}/sim.yaml",
                BUCKET, profile_id, model_id, job_name
            ),
            simulation_heartbeat: format!(
                "s3://{}/{}/models/{}/{}/heartbeat",
                BUCKET, profile_id, model_id, job_name
            ),
            ..Default::default()
        },
        job_name,
        model_id: model_id.to_string(),
        profile_id: profile_id.to_string(),
        status: JobStatus::Queued,
        termination_conditions: TerminationConditions {
            max_time_in_minutes: minutes,
            max_laps: None,
        },
        track_config: TrackConfig {
            track_id: "reInvent2019_track".to_string(),
            track_direction: TrackDirection::CounterClockwise,
        },
        created_at: now,
        updated_at: now,
    }
}

/// A queued 60 minute training job named after the model.
pub fn training_job(model_id: &str, profile_id: &str) -> WorkflowJob {
    WorkflowJob::Training(record(JobKind::Training, model_id, model_id, profile_id, 60))
}

/// A queued 10 minute evaluation job.
pub fn evaluation_job(id: &str, model_id: &str, profile_id: &str) -> WorkflowJob {
    WorkflowJob::Evaluation(record(JobKind::Evaluation, id, model_id, profile_id, 10))
}

/// A queued 20 minute submission job.
pub fn submission_job(
    submission_id: &str,
    model_id: &str,
    profile_id: &str,
    leaderboard_id: &str,
    submission_number: u32,
) -> WorkflowJob {
    WorkflowJob::Submission(SubmissionJob {
        job: record(
            JobKind::Submission,
            submission_id,
            model_id,
            profile_id,
            crate::leaderboard::DEFAULT_SUBMISSION_MAX_TIME_IN_MINUTES,
        ),
        submission_id: submission_id.to_string(),
        leaderboard_id: leaderboard_id.to_string(),
        submission_number,
        race_type: RaceType::TimeTrial,
        object_avoidance_config: None,
        resetting_behavior_config: None,
    })
}

/// A time-trial leaderboard open between the given instants.
pub fn leaderboard(
    leaderboard_id: &str,
    open_time: DateTime<Utc>,
    close_time: DateTime<Utc>,
) -> Leaderboard {
    Leaderboard {
        leaderboard_id: leaderboard_id.to_string(),
        name: format!("Cup {}", leaderboard_id),
        open_time,
        close_time,
        max_submissions_per_user: 5,
        race_type: RaceType::TimeTrial,
        track_config: TrackConfig {
            track_id: "reInvent2019_track".to_string(),
            track_direction: TrackDirection::Clockwise,
        },
        object_avoidance_config: None,
        resetting_behavior_config: None,
        submission_termination_conditions: SubmissionTerminationConditions::default(),
    }
}

/// A leaderboard that opened an hour ago and closes in a day.
pub fn open_leaderboard(leaderboard_id: &str) -> Leaderboard {
    let now = Utc::now();
    leaderboard(leaderboard_id, now - Duration::hours(1), now + Duration::days(1))
}
