// Copyright (C) 2025 The Pitlane Racing Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tests for the create-submission handler.

mod common;

use chrono::{Duration, Utc};
use common::{MODEL_ID, PROFILE_ID, TestContext};
use pitlane_core::job::{
    JobKind, JobStatus, ObjectAvoidanceConfig, RaceType, WorkflowJob,
};
use pitlane_core::leaderboard::Leaderboard;
use pitlane_core::model::ModelStatus;
use pitlane_core::persistence::Persistence;
use pitlane_core::testing;
use pitlane_workflow::handlers::{
    CreateSubmissionRequest, LEADERBOARD_CLOSED_MESSAGE, MAX_SUBMISSIONS_MESSAGE,
    NOT_SUBMITTABLE_MESSAGE, handle_create_submission,
};

const LEADERBOARD_ID: &str = "spring-cup";

fn request() -> CreateSubmissionRequest {
    CreateSubmissionRequest {
        leaderboard_id: LEADERBOARD_ID.to_string(),
        model_id: MODEL_ID.to_string(),
        profile_id: PROFILE_ID.to_string(),
    }
}

async fn setup(leaderboard: Leaderboard) -> TestContext {
    let ctx = TestContext::new();
    ctx.add_model(MODEL_ID, ModelStatus::Ready).await;
    ctx.store.create_leaderboard(&leaderboard).await.unwrap();
    ctx
}

async fn load_submission(ctx: &TestContext, submission_id: &str) -> WorkflowJob {
    ctx.store
        .load_job(&JobKind::Submission.job_name(submission_id))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_create_submission() {
    let mut ctx = setup(testing::open_leaderboard(LEADERBOARD_ID)).await;

    let response = handle_create_submission(&ctx.state, request()).await.unwrap();

    assert_eq!(ctx.model_status(MODEL_ID).await, ModelStatus::Queued);

    let WorkflowJob::Submission(submission) = load_submission(&ctx, &response.submission_id).await
    else {
        panic!("expected a submission job");
    };
    assert_eq!(submission.submission_number, 1);
    assert_eq!(submission.leaderboard_id, LEADERBOARD_ID);
    assert_eq!(submission.job.status, JobStatus::Queued);
    assert_eq!(submission.job.termination_conditions.max_time_in_minutes, 20);
    assert_eq!(submission.race_type, RaceType::TimeTrial);
    assert!(
        submission
            .job
            .asset_locations
            .simulation_heartbeat
            .ends_with("submission_job_status.json")
    );

    let message = ctx.messages.recv().await.unwrap();
    assert_eq!(message.model_id, MODEL_ID);
    assert_eq!(message.profile_id, PROFILE_ID);
    assert_eq!(message.leaderboard_id.as_deref(), Some(LEADERBOARD_ID));
    assert_eq!(message.job_name, submission.job.job_name);
}

#[tokio::test]
async fn test_submission_numbers_increase() {
    let ctx = setup(testing::open_leaderboard(LEADERBOARD_ID)).await;

    let first = handle_create_submission(&ctx.state, request()).await.unwrap();
    ctx.store
        .update_model_status(PROFILE_ID, MODEL_ID, ModelStatus::Ready, None)
        .await
        .unwrap();
    let second = handle_create_submission(&ctx.state, request()).await.unwrap();

    assert_ne!(first.submission_id, second.submission_id);
    let WorkflowJob::Submission(submission) = load_submission(&ctx, &second.submission_id).await
    else {
        panic!("expected a submission job");
    };
    assert_eq!(submission.submission_number, 2);
}

#[tokio::test]
async fn test_leaderboard_settings_are_copied() {
    let mut leaderboard = testing::open_leaderboard(LEADERBOARD_ID);
    leaderboard.race_type = RaceType::ObjectAvoidance;
    leaderboard.object_avoidance_config = Some(ObjectAvoidanceConfig {
        number_of_objects: 3,
        object_positions: Vec::new(),
    });
    leaderboard.submission_termination_conditions.max_time_in_minutes = Some(30);
    leaderboard.submission_termination_conditions.max_laps = Some(3);
    let ctx = setup(leaderboard.clone()).await;

    let response = handle_create_submission(&ctx.state, request()).await.unwrap();

    let WorkflowJob::Submission(submission) = load_submission(&ctx, &response.submission_id).await
    else {
        panic!("expected a submission job");
    };
    assert_eq!(submission.race_type, RaceType::ObjectAvoidance);
    assert_eq!(
        submission.object_avoidance_config,
        leaderboard.object_avoidance_config
    );
    assert_eq!(submission.job.track_config, leaderboard.track_config);
    assert_eq!(submission.job.termination_conditions.max_time_in_minutes, 30);
    assert_eq!(submission.job.termination_conditions.max_laps, Some(3));
}

#[tokio::test]
async fn test_model_must_be_ready() {
    for status in [
        ModelStatus::Queued,
        ModelStatus::Training,
        ModelStatus::Error,
    ] {
        let ctx = TestContext::new();
        ctx.add_model(MODEL_ID, status).await;
        ctx.store
            .create_leaderboard(&testing::open_leaderboard(LEADERBOARD_ID))
            .await
            .unwrap();

        let err = handle_create_submission(&ctx.state, request())
            .await
            .unwrap_err();
        assert!(err.is_bad_request());
        assert_eq!(err.to_string(), NOT_SUBMITTABLE_MESSAGE);
    }
}

#[tokio::test]
async fn test_closed_leaderboard_rejects_submissions() {
    let now = Utc::now();
    let closed = testing::leaderboard(
        LEADERBOARD_ID,
        now - Duration::days(7),
        now - Duration::minutes(1),
    );
    let not_yet_open = testing::leaderboard(
        LEADERBOARD_ID,
        now + Duration::hours(1),
        now + Duration::days(7),
    );

    for leaderboard in [closed, not_yet_open] {
        let ctx = setup(leaderboard).await;
        let writes = ctx.store.write_count();

        let err = handle_create_submission(&ctx.state, request())
            .await
            .unwrap_err();
        assert!(err.is_bad_request());
        assert_eq!(err.to_string(), LEADERBOARD_CLOSED_MESSAGE);
        assert_eq!(ctx.store.write_count(), writes);
        assert_eq!(ctx.model_status(MODEL_ID).await, ModelStatus::Ready);
    }
}

#[tokio::test]
async fn test_max_submissions_reached() {
    let ctx = setup(testing::open_leaderboard(LEADERBOARD_ID)).await;
    ctx.store
        .create_job(&testing::submission_job(
            "earlier",
            MODEL_ID,
            PROFILE_ID,
            LEADERBOARD_ID,
            5,
        ))
        .await
        .unwrap();
    let writes = ctx.store.write_count();

    let err = handle_create_submission(&ctx.state, request())
        .await
        .unwrap_err();

    assert!(err.is_bad_request());
    assert_eq!(err.to_string(), MAX_SUBMISSIONS_MESSAGE);
    assert_eq!(ctx.store.write_count(), writes);
}

#[tokio::test]
async fn test_last_allowed_submission() {
    let ctx = setup(testing::open_leaderboard(LEADERBOARD_ID)).await;
    ctx.store
        .create_job(&testing::submission_job(
            "earlier",
            MODEL_ID,
            PROFILE_ID,
            LEADERBOARD_ID,
            4,
        ))
        .await
        .unwrap();

    let response = handle_create_submission(&ctx.state, request()).await.unwrap();

    let WorkflowJob::Submission(submission) = load_submission(&ctx, &response.submission_id).await
    else {
        panic!("expected a submission job");
    };
    assert_eq!(submission.submission_number, 5);
}

#[tokio::test]
async fn test_other_profiles_submissions_do_not_count() {
    let ctx = setup(testing::open_leaderboard(LEADERBOARD_ID)).await;
    ctx.store
        .create_job(&testing::submission_job(
            "theirs",
            "their-model",
            "someone-else",
            LEADERBOARD_ID,
            5,
        ))
        .await
        .unwrap();

    let response = handle_create_submission(&ctx.state, request()).await.unwrap();
    let WorkflowJob::Submission(submission) = load_submission(&ctx, &response.submission_id).await
    else {
        panic!("expected a submission job");
    };
    assert_eq!(submission.submission_number, 1);
}

#[tokio::test]
async fn test_missing_leaderboard_is_not_found() {
    let ctx = TestContext::new();
    ctx.add_model(MODEL_ID, ModelStatus::Ready).await;

    let err = handle_create_submission(&ctx.state, request())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
