// Copyright (C) 2025 The Pitlane Racing Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Behaviour shared by every Persistence implementation.
//!
//! Each scenario runs against both the in-memory store and SQLite.

use pitlane_core::job::JobStatus;
use pitlane_core::model::ModelStatus;
use pitlane_core::persistence::{ListRequest, MemoryPersistence, Persistence, SqlitePersistence};
use pitlane_core::testing;
use pitlane_core::usage::{AccountResourceUsage, ProfileUsagePatch};

async fn stores() -> Vec<(&'static str, Box<dyn Persistence>)> {
    vec![
        (
            "memory",
            Box::new(MemoryPersistence::new()) as Box<dyn Persistence>,
        ),
        (
            "sqlite",
            Box::new(SqlitePersistence::connect("sqlite::memory:").await.unwrap()) as Box<dyn Persistence>,
        ),
    ]
}

#[tokio::test]
async fn test_model_status_updates() {
    for (name, store) in stores().await {
        store
            .create_model(&testing::model("p-1", "m-1", ModelStatus::Importing))
            .await
            .unwrap();

        store
            .update_model_status("p-1", "m-1", ModelStatus::Error, Some("import failed"))
            .await
            .unwrap();
        let model = store.load_model("p-1", "m-1").await.unwrap();
        assert_eq!(model.status, ModelStatus::Error, "{}", name);
        assert_eq!(model.error_message.as_deref(), Some("import failed"), "{}", name);

        store
            .update_model_status("p-1", "m-1", ModelStatus::Ready, None)
            .await
            .unwrap();
        let model = store.load_model("p-1", "m-1").await.unwrap();
        assert_eq!(model.error_message, None, "{}", name);

        let err = store
            .update_model_status("p-1", "missing", ModelStatus::Ready, None)
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "{}", name);
    }
}

#[tokio::test]
async fn test_stoppable_lookups() {
    for (name, store) in stores().await {
        let mut training = testing::training_job("m-1", "p-1");
        training.record_mut().status = JobStatus::Initializing;
        let mut finished = testing::evaluation_job("e-1", "m-1", "p-1");
        finished.record_mut().status = JobStatus::Completed;
        let mut running_submission = testing::submission_job("s-1", "m-1", "p-1", "lb-1", 1);
        running_submission.record_mut().status = JobStatus::InProgress;

        for job in [&training, &finished, &running_submission] {
            store.create_job(job).await.unwrap();
        }

        let found = store.get_stoppable_training("m-1").await.unwrap();
        assert_eq!(found.as_ref().map(|j| j.name()), Some(training.name()), "{}", name);
        assert!(store.get_stoppable_evaluation("m-1").await.unwrap().is_none(), "{}", name);
        assert!(
            store
                .get_stoppable_submission("m-1", "p-1")
                .await
                .unwrap()
                .is_none(),
            "{}",
            name
        );

        store
            .update_job_status(&running_submission.key(), JobStatus::Queued)
            .await
            .unwrap();
        assert!(
            store
                .get_stoppable_submission("m-1", "p-1")
                .await
                .unwrap()
                .is_some(),
            "{}",
            name
        );
    }
}

#[tokio::test]
async fn test_profile_usage_and_paging() {
    for (name, store) in stores().await {
        for id in ["a", "b", "c", "d", "e"] {
            store.create_profile(&testing::profile(id)).await.unwrap();
        }

        let updated = store
            .update_profile_usage(
                "c",
                ProfileUsagePatch {
                    compute_minutes_used: Some(30),
                    compute_minutes_queued: Some(15),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.compute_minutes_used, 30, "{}", name);
        assert_eq!(updated.compute_minutes_queued, 15, "{}", name);
        assert_eq!(updated.model_count, 0, "{}", name);

        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let page = store
                .list_profiles(ListRequest {
                    cursor,
                    max_results: 2,
                })
                .await
                .unwrap();
            assert!(page.data.len() <= 2, "{}", name);
            seen.extend(page.data.into_iter().map(|p| p.profile_id));
            cursor = page.cursor;
            if cursor.is_none() {
                break;
            }
        }
        assert_eq!(seen, vec!["a", "b", "c", "d", "e"], "{}", name);
    }
}

#[tokio::test]
async fn test_account_usage_upsert() {
    for (name, store) in stores().await {
        assert!(store.get_account_usage(2025, 1).await.unwrap().is_none(), "{}", name);

        let mut usage = AccountResourceUsage::empty(2025, 1);
        usage.account_compute_minutes_queued = 60;
        store.put_account_usage(&usage).await.unwrap();
        usage.account_compute_minutes_used = 25;
        store.put_account_usage(&usage).await.unwrap();

        assert_eq!(
            store.get_account_usage(2025, 1).await.unwrap(),
            Some(usage),
            "{}",
            name
        );
    }
}
