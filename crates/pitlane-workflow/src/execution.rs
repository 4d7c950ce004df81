// Copyright (C) 2025 The Pitlane Racing Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Job execution adapter.
//!
//! Wraps a [`JobBackend`] with the rules the workflow needs on top of raw
//! backend calls:
//!
//! - building the create-job payload (runtime ceiling, simulation parameters)
//! - stopping a running job only after confirming it is still running
//! - cancelling a queued job, which the backend cannot do directly
//! - checking training instance capacity against the service quota
//!
//! # Queued cancellation
//!
//! A job the backend accepted may start at any moment without notice, and
//! the backend refuses to stop a job that is not running. Cancellation
//! therefore polls until stopping is meaningful or unnecessary:
//!
//! ```text
//!             ┌──────────── describe ◄───────────┐
//!             │                                  │ sleep(poll_interval)
//!             ▼                                  │
//!   IN_PROGRESS ──► stop, done     PENDING / STOPPING / error
//!   COMPLETED | STOPPED | FAILED ──► done
//!   deadline passed ──► InternalFailure
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pitlane_core::error::CoreError;
use pitlane_core::job::{JOB_NAME_PREFIX, TrackDirection, WorkflowJob};
use pitlane_core::model::{Model, split_storage_uri};
use pitlane_core::persistence::Persistence;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::backend::{
    BackendJobStatus, CreateJobRequest, InstanceConfig, JobBackend, JobHandle, ListJobsFilter,
};
use crate::config::{ConfigError, DEFAULT_STOP_QUEUED_POLL_INTERVAL, DEFAULT_STOP_QUEUED_TIMEOUT};
use crate::error::Result;

/// Message returned when a queued job never became stoppable.
pub const CANCEL_TIMEOUT_MESSAGE: &str =
    "Failed to cancel job. Please check with your administrator";

/// Message returned when a clone's source model has been deleted.
pub const MISSING_CLONE_SOURCE_MESSAGE: &str = "Pre-trained source model for clone does not exist.";

/// Longest job runtime plus a ten minute buffer.
pub const INSTANCE_USAGE_WINDOW_MINUTES: i64 = 24 * 60 + 10;

/// Service code used for training instance quota lookups.
pub const TRAINING_QUOTA_SERVICE: &str = "sagemaker";

/// Settings for [`JobExecutor`].
#[derive(Debug, Clone)]
pub struct ExecutionSettings {
    /// Training container image
    pub training_image: Option<String>,
    /// Role the backend assumes
    pub role_arn: Option<String>,
    /// Region passed to the simulation
    pub region: String,
    /// Bucket receiving simulation logs
    pub model_data_bucket: Option<String>,
    /// Compute resources per job
    pub instance: InstanceConfig,
    /// Deadline for queued cancellation
    pub stop_queued_timeout: Duration,
    /// Pause between polls during queued cancellation
    pub stop_queued_poll_interval: Duration,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            training_image: None,
            role_arn: None,
            region: "us-east-1".to_string(),
            model_data_bucket: None,
            instance: InstanceConfig {
                instance_type: "ml.c5.4xlarge".to_string(),
                instance_count: 1,
                volume_size_gb: 40,
            },
            stop_queued_timeout: DEFAULT_STOP_QUEUED_TIMEOUT,
            stop_queued_poll_interval: DEFAULT_STOP_QUEUED_POLL_INTERVAL,
        }
    }
}

/// Job execution adapter over a [`JobBackend`].
pub struct JobExecutor {
    backend: Arc<dyn JobBackend>,
    persistence: Arc<dyn Persistence>,
    settings: ExecutionSettings,
}

impl JobExecutor {
    /// Create a new executor.
    pub fn new(
        backend: Arc<dyn JobBackend>,
        persistence: Arc<dyn Persistence>,
        settings: ExecutionSettings,
    ) -> Self {
        Self {
            backend,
            persistence,
            settings,
        }
    }

    /// Settings in use.
    pub fn settings(&self) -> &ExecutionSettings {
        &self.settings
    }

    /// Start the backend job for `job`, returning the backend handle.
    #[instrument(skip_all, fields(job_name = %job.name(), model_id = %model.model_id))]
    pub async fn create_training_job(&self, job: &WorkflowJob, model: &Model) -> Result<JobHandle> {
        let image = self
            .settings
            .training_image
            .clone()
            .ok_or(ConfigError::Missing("PITLANE_TRAINING_IMAGE"))?;

        let request = CreateJobRequest {
            job_name: job.name().to_string(),
            role_arn: self.settings.role_arn.clone(),
            image,
            output_path: model.asset_locations.training_artifacts.clone(),
            instance: self.settings.instance.clone(),
            max_runtime_seconds: job.record().termination_conditions.max_time_in_minutes * 60,
            hyperparameters: self.hyperparameters(job, model).await?,
        };

        let handle = self.backend.create_job(&request).await?;
        info!(job_arn = %handle.job_arn, "Backend job created");
        Ok(handle)
    }

    /// Simulation parameters for `job`, every value rendered as a string.
    pub async fn hyperparameters(
        &self,
        job: &WorkflowJob,
        model: &Model,
    ) -> Result<BTreeMap<String, String>> {
        let record = job.record();
        let mut params: BTreeMap<String, String> = model
            .hyperparameters
            .iter()
            .map(|(key, value)| {
                let rendered = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), rendered)
            })
            .collect();

        if let Some(source_id) = &model.cloned_from_model_id {
            let source = self
                .persistence
                .get_model(&model.profile_id, source_id)
                .await?
                .ok_or_else(|| {
                    warn!(
                        model_id = %model.model_id,
                        source_model_id = %source_id,
                        "Clone source model is gone"
                    );
                    CoreError::internal(MISSING_CLONE_SOURCE_MESSAGE)
                })?;
            let (bucket, prefix) = split_storage_uri(&source.asset_locations.training_artifacts)?;
            params.insert("pretrained_s3_bucket".to_string(), bucket.to_string());
            params.insert("pretrained_s3_prefix".to_string(), prefix.to_string());
        }

        let (bucket, prefix) = split_storage_uri(&model.asset_locations.training_artifacts)?;
        let yaml_name = Path::new(&record.asset_locations.simulation_yaml)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let fixed = [
            ("aws_region", self.settings.region.clone()),
            (
                "heartbeat_s3_location",
                record.asset_locations.simulation_heartbeat.clone(),
            ),
            ("kinesis_stream_name", record.job_name.clone()),
            (
                "model_metadata_s3_key",
                model.asset_locations.model_metadata.clone(),
            ),
            (
                "reward_function_s3_source",
                model.asset_locations.reward_function.clone(),
            ),
            ("s3_bucket", bucket.to_string()),
            ("s3_prefix", prefix.to_string()),
            (
                "s3_ros_log_bucket",
                self.settings.model_data_bucket.clone().unwrap_or_default(),
            ),
            ("s3_yaml_name", yaml_name),
            (
                "simulation_launch_file",
                job.kind().simulation_launch_file().to_string(),
            ),
            (
                "track_direction_clockwise",
                (record.track_config.track_direction == TrackDirection::Clockwise).to_string(),
            ),
            ("world_name", record.track_config.track_id.clone()),
        ];
        params.extend(fixed.into_iter().map(|(k, v)| (k.to_string(), v)));

        Ok(params)
    }

    /// Stop a job if it is running; warn and return otherwise.
    #[instrument(skip(self))]
    pub async fn stop_training_job(&self, job_name: &str) -> Result<()> {
        let description = self.backend.describe_job(job_name).await?;

        if description.status == BackendJobStatus::InProgress {
            self.backend.stop_job(job_name).await?;
            debug!("Stop command sent");
        } else {
            warn!(status = %description.status, "Backend job is not running, nothing to stop");
        }

        Ok(())
    }

    /// Cancel a queued job using the configured timeout and poll interval.
    pub async fn stop_queued_job(&self, job_name: &str) -> Result<()> {
        self.stop_queued_job_with(
            job_name,
            self.settings.stop_queued_timeout,
            self.settings.stop_queued_poll_interval,
        )
        .await
    }

    /// Cancel a queued job: wait for it to start, then stop it.
    ///
    /// Describe errors count as "still pending" since a freshly created job
    /// may not be visible yet. Fails with `InternalFailure` once `timeout`
    /// elapses without the job running or finishing.
    #[instrument(skip(self))]
    pub async fn stop_queued_job_with(
        &self,
        job_name: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<()> {
        let deadline = Instant::now() + timeout;

        while Instant::now() < deadline {
            match self.backend.describe_job(job_name).await {
                Ok(description) if description.status == BackendJobStatus::InProgress => {
                    debug!("Job started, sending stop command");
                    self.backend.stop_job(job_name).await?;
                    return Ok(());
                }
                Ok(description) if description.status.is_terminal() => {
                    debug!(status = %description.status, "Job already terminal, no stop needed");
                    return Ok(());
                }
                Ok(description) => {
                    debug!(status = %description.status, "Job still pending");
                }
                Err(e) => {
                    debug!(error = %e, "Error checking job status, will retry");
                }
            }
            tokio::time::sleep(poll_interval).await;
        }

        warn!(
            timeout_ms = timeout.as_millis() as u64,
            "Timed out waiting for queued job to start"
        );
        Err(CoreError::internal(CANCEL_TIMEOUT_MESSAGE).into())
    }

    /// Quota name of the configured instance type.
    pub fn training_instance_quota_code(&self) -> String {
        format!(
            "{} for training job usage",
            self.settings.instance.instance_type
        )
    }

    /// Training instances the account may run at once.
    pub async fn training_instance_quota(&self) -> Result<f64> {
        let quota = self
            .backend
            .get_service_quota(TRAINING_QUOTA_SERVICE, &self.training_instance_quota_code())
            .await?;
        info!(
            instance_type = %self.settings.instance.instance_type,
            quota,
            "Training instance quota"
        );
        Ok(quota)
    }

    /// Training instances in use: our running or stopping jobs created
    /// within [`INSTANCE_USAGE_WINDOW_MINUTES`].
    pub async fn training_instance_usage(&self) -> Result<usize> {
        let created_after = Utc::now() - chrono::Duration::minutes(INSTANCE_USAGE_WINDOW_MINUTES);
        let mut usage = 0;

        for status in [BackendJobStatus::InProgress, BackendJobStatus::Stopping] {
            let filter = ListJobsFilter {
                name_contains: Some(JOB_NAME_PREFIX.to_string()),
                status: Some(status),
                created_after: Some(created_after),
            };
            let mut next_token = None;
            loop {
                let page = self.backend.list_jobs(&filter, next_token).await?;
                usage += page.jobs.len();
                next_token = page.next_token;
                if next_token.is_none() {
                    break;
                }
            }
        }

        Ok(usage)
    }

    /// Whether another training job fits under the instance quota.
    pub async fn is_training_instance_capacity_available(&self) -> Result<bool> {
        let (quota, usage) = tokio::try_join!(
            self.training_instance_quota(),
            self.training_instance_usage()
        )?;

        let available = quota > usage as f64;
        if available {
            info!(usage, quota, "Training instance capacity available");
        } else {
            warn!(usage, quota, "Training instances at or above quota");
        }

        Ok(available)
    }
}
