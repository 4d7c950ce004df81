// Copyright (C) 2025 The Pitlane Racing Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for pitlane-workflow.

use std::str::FromStr;
use std::time::Duration;

use pitlane_core::persistence::DEFAULT_MAX_QUERY_RESULTS;

use crate::backend::InstanceConfig;
use crate::execution::ExecutionSettings;
use crate::quota::QuotaSettings;

/// Default number of profile updates issued concurrently by the monthly reset.
pub const DEFAULT_PROFILE_UPDATE_CONCURRENCY: usize = 10;

/// Default time allowed for a queued job to start before cancellation gives up.
pub const DEFAULT_STOP_QUEUED_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Default pause between backend polls while cancelling a queued job.
pub const DEFAULT_STOP_QUEUED_POLL_INTERVAL: Duration = Duration::from_millis(2_000);

/// Workflow configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection URL
    pub database_url: String,
    /// Profile updates in flight at once during the monthly reset
    pub profile_update_concurrency: usize,
    /// Page size when listing profiles
    pub max_query_results: usize,
    /// How long to wait for a queued job to become stoppable
    pub stop_queued_timeout: Duration,
    /// Pause between polls while waiting
    pub stop_queued_poll_interval: Duration,
    /// Training container image; job creation fails without it
    pub training_image: Option<String>,
    /// Role the backend assumes for training jobs
    pub role_arn: Option<String>,
    /// Region passed to the simulation
    pub region: String,
    /// Bucket receiving simulation logs
    pub model_data_bucket: Option<String>,
    /// Instance type for training jobs
    pub instance_type: String,
    /// Instances per training job
    pub instance_count: u32,
    /// Volume size per instance
    pub instance_volume_gb: u32,
}

fn parse_or<T: FromStr>(
    key: &'static str,
    default: T,
    reason: &'static str,
) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid(key, reason)),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `PITLANE_DATABASE_URL`: SQLite connection string
    ///
    /// Optional (with defaults):
    /// - `PROFILE_UPDATE_CONCURRENCY`: concurrent profile updates (default: 10, at least 1)
    /// - `PITLANE_MAX_QUERY_RESULTS`: profile page size (default: 100)
    /// - `PITLANE_STOP_QUEUED_TIMEOUT_MS`: queued cancel timeout (default: 60000)
    /// - `PITLANE_STOP_QUEUED_POLL_INTERVAL_MS`: queued cancel poll interval (default: 2000)
    /// - `PITLANE_TRAINING_IMAGE`, `PITLANE_ROLE_ARN`, `PITLANE_MODEL_DATA_BUCKET`
    /// - `PITLANE_REGION` (default: us-east-1)
    /// - `PITLANE_INSTANCE_TYPE` (default: ml.c5.4xlarge)
    /// - `PITLANE_INSTANCE_COUNT` (default: 1)
    /// - `PITLANE_INSTANCE_VOLUME_GB` (default: 40)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("PITLANE_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("PITLANE_DATABASE_URL"))?;

        let profile_update_concurrency: usize = parse_or(
            "PROFILE_UPDATE_CONCURRENCY",
            DEFAULT_PROFILE_UPDATE_CONCURRENCY,
            "must be a positive integer",
        )?;
        if profile_update_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "PROFILE_UPDATE_CONCURRENCY",
                "must be a positive integer",
            ));
        }

        let max_query_results: usize = parse_or(
            "PITLANE_MAX_QUERY_RESULTS",
            DEFAULT_MAX_QUERY_RESULTS,
            "must be a positive integer",
        )?;

        let stop_queued_timeout_ms: u64 = parse_or(
            "PITLANE_STOP_QUEUED_TIMEOUT_MS",
            DEFAULT_STOP_QUEUED_TIMEOUT.as_millis() as u64,
            "must be a number of milliseconds",
        )?;

        let stop_queued_poll_interval_ms: u64 = parse_or(
            "PITLANE_STOP_QUEUED_POLL_INTERVAL_MS",
            DEFAULT_STOP_QUEUED_POLL_INTERVAL.as_millis() as u64,
            "must be a number of milliseconds",
        )?;

        let instance_count: u32 = parse_or(
            "PITLANE_INSTANCE_COUNT",
            1,
            "must be a positive integer",
        )?;

        let instance_volume_gb: u32 = parse_or(
            "PITLANE_INSTANCE_VOLUME_GB",
            40,
            "must be a positive integer",
        )?;

        Ok(Self {
            database_url,
            profile_update_concurrency,
            max_query_results,
            stop_queued_timeout: Duration::from_millis(stop_queued_timeout_ms),
            stop_queued_poll_interval: Duration::from_millis(stop_queued_poll_interval_ms),
            training_image: std::env::var("PITLANE_TRAINING_IMAGE").ok(),
            role_arn: std::env::var("PITLANE_ROLE_ARN").ok(),
            region: std::env::var("PITLANE_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            model_data_bucket: std::env::var("PITLANE_MODEL_DATA_BUCKET").ok(),
            instance_type: std::env::var("PITLANE_INSTANCE_TYPE")
                .unwrap_or_else(|_| "ml.c5.4xlarge".to_string()),
            instance_count,
            instance_volume_gb,
        })
    }

    /// Settings for the job execution adapter.
    pub fn execution_settings(&self) -> ExecutionSettings {
        ExecutionSettings {
            training_image: self.training_image.clone(),
            role_arn: self.role_arn.clone(),
            region: self.region.clone(),
            model_data_bucket: self.model_data_bucket.clone(),
            instance: InstanceConfig {
                instance_type: self.instance_type.clone(),
                instance_count: self.instance_count,
                volume_size_gb: self.instance_volume_gb,
            },
            stop_queued_timeout: self.stop_queued_timeout,
            stop_queued_poll_interval: self.stop_queued_poll_interval,
        }
    }

    /// Settings for the quota engine.
    pub fn quota_settings(&self) -> QuotaSettings {
        QuotaSettings {
            profile_update_concurrency: self.profile_update_concurrency,
            max_query_results: self.max_query_results,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
