// Copyright (C) 2025 The Pitlane Racing Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Model records.
//!
//! A model's status is a coarse projection of the status of its active job.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Status of a model as seen by its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelStatus {
    /// Has a usable artifact and no active job.
    Ready,
    /// A job for the model is waiting to run.
    Queued,
    /// A training job is running.
    Training,
    /// An evaluation job is running.
    Evaluating,
    /// A stop was requested and the backend has not confirmed it yet.
    Stopping,
    /// Unusable; no valid artifact.
    Error,
    /// An uploaded model is being imported.
    Importing,
    /// Being deleted.
    Deleting,
}

impl ModelStatus {
    /// Stable string form used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Queued => "QUEUED",
            Self::Training => "TRAINING",
            Self::Evaluating => "EVALUATING",
            Self::Stopping => "STOPPING",
            Self::Error => "ERROR",
            Self::Importing => "IMPORTING",
            Self::Deleting => "DELETING",
        }
    }

    /// Only these statuses have a job behind them that can be stopped.
    pub fn is_stoppable(&self) -> bool {
        matches!(self, Self::Queued | Self::Training | Self::Evaluating)
    }
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "READY" => Ok(Self::Ready),
            "QUEUED" => Ok(Self::Queued),
            "TRAINING" => Ok(Self::Training),
            "EVALUATING" => Ok(Self::Evaluating),
            "STOPPING" => Ok(Self::Stopping),
            "ERROR" => Ok(Self::Error),
            "IMPORTING" => Ok(Self::Importing),
            "DELETING" => Ok(Self::Deleting),
            other => Err(CoreError::Serialization(format!(
                "unknown model status '{}'",
                other
            ))),
        }
    }
}

/// Storage locations fixed when the model is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelAssetLocations {
    /// Root prefix of everything stored for the model.
    pub model_root: String,
    /// Model metadata (action space, sensors).
    pub model_metadata: String,
    /// Reward function source.
    pub reward_function: String,
    /// Where the backend writes training output, as `s3://bucket/key`.
    pub training_artifacts: String,
    /// Packaged model artifact, once exported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_artifact: Option<String>,
}

/// A trained, training or imported model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Model identifier, unique per profile.
    pub model_id: String,
    /// Owning profile.
    pub profile_id: String,
    /// Display name.
    pub name: String,
    /// Current status.
    pub status: ModelStatus,
    /// Source model when this model was cloned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloned_from_model_id: Option<String>,
    /// Storage locations.
    pub asset_locations: ModelAssetLocations,
    /// Training hyperparameters as supplied by the owner.
    #[serde(default)]
    pub hyperparameters: BTreeMap<String, serde_json::Value>,
    /// Message shown to the owner when the model is in ERROR.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// Parse an `s3://bucket/key` location into its bucket and key.
pub fn split_storage_uri(uri: &str) -> Result<(&str, &str), CoreError> {
    let rest = uri
        .strip_prefix("s3://")
        .ok_or_else(|| CoreError::Serialization(format!("invalid storage uri '{}'", uri)))?;
    match rest.split_once('/') {
        Some((bucket, key)) if !bucket.is_empty() => Ok((bucket, key)),
        None if !rest.is_empty() => Ok((rest, "")),
        _ => Err(CoreError::Serialization(format!(
            "invalid storage uri '{}'",
            uri
        ))),
    }
}
