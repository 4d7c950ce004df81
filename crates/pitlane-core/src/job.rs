// Copyright (C) 2025 The Pitlane Racing Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Workflow job records.
//!
//! Training, evaluation and submission jobs share one record shape; the kind
//! is carried by the [`WorkflowJob`] discriminant.
//!
//! # Job Status State Machine
//!
//! ```text
//!        ┌────────┐  cancel   ┌──────────┐
//!        │ QUEUED │──────────►│ CANCELED │
//!        └───┬────┘           └──────────┘
//!            │ accepted
//!            ▼
//!     ┌──────────────┐
//!     │ INITIALIZING │   (not stoppable)
//!     └──────┬───────┘
//!            │ running
//!            ▼
//!     ┌─────────────┐  stop   ┌──────────┐        ┌─────────┐
//!     │ IN_PROGRESS │────────►│ STOPPING │───────►│ STOPPED │
//!     └──────┬──────┘         └──────────┘        └─────────┘
//!            │
//!      ┌─────┴──────┐
//!      ▼            ▼
//! ┌───────────┐ ┌────────┐
//! │ COMPLETED │ │ FAILED │
//! └───────────┘ └────────┘
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Prefix shared by every job name submitted to the execution backend.
pub const JOB_NAME_PREFIX: &str = "pitlane";

/// Lifecycle status of a workflow job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Accepted but not yet picked up by the backend.
    Queued,
    /// Accepted by the backend, not yet running. Cannot be stopped.
    Initializing,
    /// Running on the backend.
    InProgress,
    /// Stop requested, waiting for the backend to confirm.
    Stopping,
    /// Stopped after running.
    Stopped,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Canceled before it ever ran.
    Canceled,
}

impl JobStatus {
    /// Stable string form used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Initializing => "INITIALIZING",
            Self::InProgress => "IN_PROGRESS",
            Self::Stopping => "STOPPING",
            Self::Stopped => "STOPPED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
        }
    }

    /// No further transitions happen from a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Stopped | Self::Canceled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QUEUED" => Ok(Self::Queued),
            "INITIALIZING" => Ok(Self::Initializing),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "STOPPING" => Ok(Self::Stopping),
            "STOPPED" => Ok(Self::Stopped),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            "CANCELED" => Ok(Self::Canceled),
            other => Err(CoreError::Serialization(format!(
                "unknown job status '{}'",
                other
            ))),
        }
    }
}

/// The three supported job kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Model training.
    Training,
    /// Model evaluation on a track.
    Evaluation,
    /// Leaderboard submission.
    Submission,
}

impl JobKind {
    /// Stable string form used in storage and job names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Training => "training",
            Self::Evaluation => "evaluation",
            Self::Submission => "submission",
        }
    }

    /// Build the backend job name for a job of this kind.
    pub fn job_name(&self, id: &str) -> String {
        format!("{}-{}-{}", JOB_NAME_PREFIX, self.as_str(), id)
    }

    /// Recover the kind from a job name built by [`JobKind::job_name`].
    pub fn from_job_name(job_name: &str) -> Option<Self> {
        let rest = job_name.strip_prefix(JOB_NAME_PREFIX)?.strip_prefix('-')?;
        let (kind, _) = rest.split_once('-')?;
        kind.parse().ok()
    }

    /// Simulation launch file used by the backend for this kind of job.
    pub fn simulation_launch_file(&self) -> &'static str {
        match self {
            Self::Training => "distributed_training.launch",
            Self::Evaluation | Self::Submission => "evaluation.launch",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "training" => Ok(Self::Training),
            "evaluation" => Ok(Self::Evaluation),
            "submission" => Ok(Self::Submission),
            other => Err(CoreError::Serialization(format!(
                "unknown job kind '{}'",
                other
            ))),
        }
    }
}

/// Direction a car drives around the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackDirection {
    /// Clockwise.
    Clockwise,
    /// Counter-clockwise.
    CounterClockwise,
}

/// Track a job races on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackConfig {
    /// Track (world) identifier.
    pub track_id: String,
    /// Driving direction.
    pub track_direction: TrackDirection,
}

/// When the backend should end a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminationConditions {
    /// Hard runtime ceiling; also the compute reservation for the job.
    pub max_time_in_minutes: i64,
    /// Optional lap limit (evaluation and submission only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_laps: Option<u32>,
}

/// Kind of race a leaderboard runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RaceType {
    /// Fastest lap on an empty track.
    TimeTrial,
    /// Laps with static obstacles.
    ObjectAvoidance,
}

/// Obstacle placement for object-avoidance races.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectAvoidanceConfig {
    /// How many obstacles are placed on the track.
    pub number_of_objects: u32,
    /// Fixed obstacle positions as (track progress %, lane); random when empty.
    #[serde(default)]
    pub object_positions: Vec<ObjectPosition>,
}

/// A single obstacle position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectPosition {
    /// Progress along the track, 0-100.
    pub track_percentage: f64,
    /// Lane the obstacle is placed in.
    pub lane: String,
}

/// Penalties applied when a car leaves the track or collides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResettingBehaviorConfig {
    /// Whether the lap continues after a reset.
    pub continuous_lap: bool,
    /// Seconds added per off-track event.
    pub off_track_penalty_seconds: f64,
    /// Seconds added per collision.
    pub collision_penalty_seconds: f64,
}

/// Storage locations written when a job is created.
///
/// The simulation artifacts are populated lazily once the job produces them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAssetLocations {
    /// Rendered simulation environment file.
    pub simulation_yaml: String,
    /// Heartbeat file the simulation writes while alive.
    pub simulation_heartbeat: String,
    /// Recorded video, once available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulation_video: Option<String>,
    /// Packaged logs, once available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_archive: Option<String>,
}

impl JobAssetLocations {
    /// Locations for a new job of `kind` under a model's root prefix.
    pub fn for_job(model_root: &str, kind: JobKind) -> Self {
        let artifacts = format!("{}/sagemaker-artifacts", model_root.trim_end_matches('/'));
        Self {
            simulation_yaml: format!("{}/training_params.yaml", artifacts),
            simulation_heartbeat: format!("{}/{}_job_status.json", artifacts, kind),
            simulation_video: None,
            log_archive: None,
        }
    }
}

/// Fields shared by every job kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    /// Backend job name, unique across kinds.
    pub job_name: String,
    /// Model the job runs for.
    pub model_id: String,
    /// Owning profile.
    pub profile_id: String,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Runtime limits.
    pub termination_conditions: TerminationConditions,
    /// Track the job runs on.
    pub track_config: TrackConfig,
    /// Storage locations.
    pub asset_locations: JobAssetLocations,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// Submission-only fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionJob {
    /// Shared job fields.
    #[serde(flatten)]
    pub job: JobRecord,
    /// Public submission identifier.
    pub submission_id: String,
    /// Leaderboard the submission races on.
    pub leaderboard_id: String,
    /// 1-based position among this profile's submissions to the leaderboard.
    pub submission_number: u32,
    /// Race type copied from the leaderboard.
    pub race_type: RaceType,
    /// Obstacle setup copied from the leaderboard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_avoidance_config: Option<ObjectAvoidanceConfig>,
    /// Reset penalties copied from the leaderboard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resetting_behavior_config: Option<ResettingBehaviorConfig>,
}

/// A job of any kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkflowJob {
    /// Training job.
    Training(JobRecord),
    /// Evaluation job.
    Evaluation(JobRecord),
    /// Leaderboard submission job.
    Submission(SubmissionJob),
}

impl WorkflowJob {
    /// Discriminant of this job.
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Training(_) => JobKind::Training,
            Self::Evaluation(_) => JobKind::Evaluation,
            Self::Submission(_) => JobKind::Submission,
        }
    }

    /// Shared fields.
    pub fn record(&self) -> &JobRecord {
        match self {
            Self::Training(job) | Self::Evaluation(job) => job,
            Self::Submission(sub) => &sub.job,
        }
    }

    /// Shared fields, mutably.
    pub fn record_mut(&mut self) -> &mut JobRecord {
        match self {
            Self::Training(job) | Self::Evaluation(job) => job,
            Self::Submission(sub) => &mut sub.job,
        }
    }

    /// Backend job name.
    pub fn name(&self) -> &str {
        &self.record().job_name
    }

    /// Current status.
    pub fn status(&self) -> JobStatus {
        self.record().status
    }

    /// Leaderboard for submissions, `None` otherwise.
    pub fn leaderboard_id(&self) -> Option<&str> {
        match self {
            Self::Submission(sub) => Some(&sub.leaderboard_id),
            _ => None,
        }
    }

    /// True for training jobs.
    pub fn is_training(&self) -> bool {
        matches!(self, Self::Training(_))
    }

    /// Key used to address this job in the store.
    pub fn key(&self) -> JobKey {
        let record = self.record();
        JobKey {
            kind: self.kind(),
            job_name: record.job_name.clone(),
            model_id: record.model_id.clone(),
            profile_id: record.profile_id.clone(),
            leaderboard_id: self.leaderboard_id().map(str::to_string),
        }
    }
}

/// Identity of a stored job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey {
    /// Job kind.
    pub kind: JobKind,
    /// Backend job name.
    pub job_name: String,
    /// Model the job belongs to.
    pub model_id: String,
    /// Owning profile.
    pub profile_id: String,
    /// Leaderboard, submissions only.
    pub leaderboard_id: Option<String>,
}
