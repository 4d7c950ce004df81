// Copyright (C) 2025 The Pitlane Racing Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Profile and account resource usage records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Quota value meaning "no limit".
pub const UNLIMITED: i64 = -1;

/// A racer profile together with its monthly usage counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Profile identifier.
    pub profile_id: String,
    /// Public racer name.
    pub alias: String,
    /// Minutes metered by the backend this month.
    pub compute_minutes_used: i64,
    /// Minutes reserved by jobs that have not finished yet.
    pub compute_minutes_queued: i64,
    /// Monthly compute ceiling; `-1` is unlimited, absent is zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_total_compute_minutes: Option<i64>,
    /// Models created this month.
    pub model_count: i64,
    /// Monthly model ceiling; `-1` is unlimited, absent is zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_model_count: Option<i64>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// The quota-relevant slice of a profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileQuotaUsage {
    /// Minutes reserved by unfinished jobs.
    pub compute_minutes_queued: i64,
    /// Minutes metered this month.
    pub compute_minutes_used: i64,
    /// Monthly compute ceiling.
    pub max_total_compute_minutes: Option<i64>,
    /// Models created this month.
    pub model_count: i64,
    /// Monthly model ceiling.
    pub max_model_count: Option<i64>,
}

impl From<&Profile> for ProfileQuotaUsage {
    fn from(profile: &Profile) -> Self {
        Self {
            compute_minutes_queued: profile.compute_minutes_queued,
            compute_minutes_used: profile.compute_minutes_used,
            max_total_compute_minutes: profile.max_total_compute_minutes,
            model_count: profile.model_count,
            max_model_count: profile.max_model_count,
        }
    }
}

/// Partial update of a profile's usage counters. `None` leaves a field as is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileUsagePatch {
    /// New metered minutes.
    pub compute_minutes_used: Option<i64>,
    /// New reserved minutes.
    pub compute_minutes_queued: Option<i64>,
    /// New model count.
    pub model_count: Option<i64>,
}

impl ProfileUsagePatch {
    /// Patch applied by the monthly reset.
    pub fn monthly_reset() -> Self {
        Self {
            compute_minutes_used: Some(0),
            model_count: Some(0),
            ..Default::default()
        }
    }

    /// Apply this patch to a profile in place.
    pub fn apply(&self, profile: &mut Profile) {
        if let Some(used) = self.compute_minutes_used {
            profile.compute_minutes_used = used;
        }
        if let Some(queued) = self.compute_minutes_queued {
            profile.compute_minutes_queued = queued;
        }
        if let Some(count) = self.model_count {
            profile.model_count = count;
        }
    }
}

/// Account-wide usage for one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResourceUsage {
    /// Calendar year.
    pub year: i32,
    /// Calendar month, 1-12.
    pub month: u32,
    /// Minutes reserved by unfinished jobs across all profiles.
    pub account_compute_minutes_queued: i64,
    /// Minutes metered across all profiles.
    pub account_compute_minutes_used: i64,
}

impl AccountResourceUsage {
    /// An empty record for the given period.
    pub fn empty(year: i32, month: u32) -> Self {
        Self {
            year,
            month,
            account_compute_minutes_queued: 0,
            account_compute_minutes_used: 0,
        }
    }
}
