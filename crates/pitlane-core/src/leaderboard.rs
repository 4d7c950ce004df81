// Copyright (C) 2025 The Pitlane Racing Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Leaderboard records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::{ObjectAvoidanceConfig, RaceType, ResettingBehaviorConfig, TrackConfig};

/// Runtime limit applied to submissions when the leaderboard sets none.
pub const DEFAULT_SUBMISSION_MAX_TIME_IN_MINUTES: i64 = 20;

/// Termination conditions a leaderboard imposes on its submissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionTerminationConditions {
    /// Runtime limit; falls back to [`DEFAULT_SUBMISSION_MAX_TIME_IN_MINUTES`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_time_in_minutes: Option<i64>,
    /// Lap limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_laps: Option<u32>,
}

/// A race that accepts submissions during a time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Leaderboard {
    /// Leaderboard identifier.
    pub leaderboard_id: String,
    /// Display name.
    pub name: String,
    /// First instant submissions are accepted.
    pub open_time: DateTime<Utc>,
    /// Submissions are rejected from this instant on.
    pub close_time: DateTime<Utc>,
    /// Submission cap per profile.
    pub max_submissions_per_user: u32,
    /// Kind of race.
    pub race_type: RaceType,
    /// Track raced on.
    pub track_config: TrackConfig,
    /// Obstacle setup for object-avoidance races.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_avoidance_config: Option<ObjectAvoidanceConfig>,
    /// Reset penalties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resetting_behavior_config: Option<ResettingBehaviorConfig>,
    /// Limits applied to each submission.
    #[serde(default)]
    pub submission_termination_conditions: SubmissionTerminationConditions,
}

impl Leaderboard {
    /// Whether submissions are accepted at `now`.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.open_time <= now && now < self.close_time
    }
}
