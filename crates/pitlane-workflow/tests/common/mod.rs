// Copyright (C) 2025 The Pitlane Racing Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for pitlane-workflow integration tests.
//!
//! Provides TestContext wiring an in-memory store, a mock backend and a
//! channel queue into handler state.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use pitlane_core::job::{JobStatus, WorkflowJob};
use pitlane_core::model::ModelStatus;
use pitlane_core::persistence::{MemoryPersistence, Persistence};
use pitlane_core::testing;
use pitlane_workflow::backend::MockBackend;
use pitlane_workflow::execution::{ExecutionSettings, JobExecutor};
use pitlane_workflow::handlers::WorkflowHandlerState;
use pitlane_workflow::queue::{ChannelQueue, WorkflowMessage};

pub const PROFILE_ID: &str = "profile-1";
pub const MODEL_ID: &str = "model-1";

/// Queued-cancel budget used by tests; time is paused so this costs nothing.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(10);
pub const STOP_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Test context holding the fakes behind a handler state.
pub struct TestContext {
    pub store: Arc<MemoryPersistence>,
    pub backend: Arc<MockBackend>,
    pub state: WorkflowHandlerState,
    pub messages: mpsc::Receiver<WorkflowMessage>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_store(MemoryPersistence::new())
    }

    pub fn with_store(store: MemoryPersistence) -> Self {
        let store = Arc::new(store);
        let backend = Arc::new(MockBackend::new());
        let executor = Arc::new(JobExecutor::new(
            backend.clone(),
            store.clone(),
            ExecutionSettings {
                training_image: Some("registry/sim:test".to_string()),
                stop_queued_timeout: STOP_TIMEOUT,
                stop_queued_poll_interval: STOP_POLL_INTERVAL,
                ..Default::default()
            },
        ));
        let (queue, messages) = ChannelQueue::new(16);
        let state = WorkflowHandlerState::new(store.clone(), executor, Arc::new(queue));

        Self {
            store,
            backend,
            state,
            messages,
        }
    }

    /// Store a model owned by [`PROFILE_ID`].
    pub async fn add_model(&self, model_id: &str, status: ModelStatus) {
        self.store
            .create_model(&testing::model(PROFILE_ID, model_id, status))
            .await
            .unwrap();
    }

    /// Store a job with the given status.
    pub async fn add_job(&self, job: WorkflowJob, status: JobStatus) -> WorkflowJob {
        let job = with_status(job, status);
        self.store.create_job(&job).await.unwrap();
        job
    }

    pub async fn model_status(&self, model_id: &str) -> ModelStatus {
        self.store
            .load_model(PROFILE_ID, model_id)
            .await
            .unwrap()
            .status
    }

    pub async fn job_status(&self, job_name: &str) -> JobStatus {
        self.store.load_job(job_name).await.unwrap().status()
    }
}

pub fn with_status(mut job: WorkflowJob, status: JobStatus) -> WorkflowJob {
    job.record_mut().status = status;
    job
}
