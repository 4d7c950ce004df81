// Copyright (C) 2025 The Pitlane Racing Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Compute quota reconciliation.
//!
//! Jobs reserve their full runtime ceiling as *queued* minutes when they are
//! created. When a job finishes, the reservation is released and the metered
//! runtime is credited as *used*, capped at what was reserved:
//!
//! ```text
//! queued' = max(queued - reserved, 0)
//! used'   = used + min(reserved, actual)
//! ```
//!
//! The same formula applies to the account-wide record for the job's month.

use std::sync::Arc;

use futures::future::try_join_all;
use pitlane_core::error::CoreError;
use pitlane_core::persistence::{DEFAULT_MAX_QUERY_RESULTS, ListRequest, Persistence};
use pitlane_core::usage::{
    AccountResourceUsage, Profile, ProfileQuotaUsage, ProfileUsagePatch, UNLIMITED,
};
use tracing::{debug, info, instrument, warn};

use crate::config::DEFAULT_PROFILE_UPDATE_CONCURRENCY;
use crate::error::Result;

/// Rejection for requests that would exceed the monthly compute ceiling.
pub const COMPUTE_LIMIT_EXCEEDED: &str = "Total compute minutes for the month exceeded.";

/// Rejection for requests that would exceed the monthly model ceiling.
pub const MODEL_LIMIT_EXCEEDED: &str = "Total number of models for the month exceeded.";

/// Settings for [`QuotaEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaSettings {
    /// Profile updates in flight at once during the monthly reset
    pub profile_update_concurrency: usize,
    /// Default page size for the monthly reset
    pub max_query_results: usize,
}

impl Default for QuotaSettings {
    fn default() -> Self {
        Self {
            profile_update_concurrency: DEFAULT_PROFILE_UPDATE_CONCURRENCY,
            max_query_results: DEFAULT_MAX_QUERY_RESULTS,
        }
    }
}

/// Outcome of a monthly reset run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetSummary {
    /// Profiles reset.
    pub profiles: usize,
    /// Pages fetched.
    pub pages: usize,
}

/// Check a request against a profile's monthly ceilings.
///
/// A ceiling of [`UNLIMITED`] always passes and an absent ceiling counts as
/// zero. Any other value, negative ones included, is enforced as is.
pub fn validate_racer_compute_limits(
    usage: &ProfileQuotaUsage,
    requested_minutes: i64,
    is_model_count_check: bool,
) -> std::result::Result<(), CoreError> {
    let (used, max, requested, message) = if is_model_count_check {
        (
            usage.model_count,
            usage.max_model_count,
            1,
            MODEL_LIMIT_EXCEEDED,
        )
    } else {
        (
            usage.compute_minutes_used,
            usage.max_total_compute_minutes,
            requested_minutes,
            COMPUTE_LIMIT_EXCEEDED,
        )
    };

    let max = max.unwrap_or(0);
    if max != UNLIMITED && used.saturating_add(requested) > max {
        debug!(used, requested, max, "Monthly limit exceeded");
        return Err(CoreError::bad_request(message));
    }

    Ok(())
}

/// Releases reservations, credits metered usage and resets monthly counters.
pub struct QuotaEngine {
    persistence: Arc<dyn Persistence>,
    settings: QuotaSettings,
}

impl QuotaEngine {
    /// Create a new quota engine.
    pub fn new(persistence: Arc<dyn Persistence>, settings: QuotaSettings) -> Self {
        Self {
            persistence,
            settings,
        }
    }

    /// Current quota counters of a profile.
    pub async fn load_profile_compute_usage(&self, profile_id: &str) -> Result<ProfileQuotaUsage> {
        let profile = self.persistence.load_profile(profile_id).await?;
        Ok(ProfileQuotaUsage::from(&profile))
    }

    /// Settle a finished job against its profile.
    #[instrument(skip(self))]
    pub async fn finalize_profile_compute_usage(
        &self,
        profile_id: &str,
        reserved_minutes: i64,
        actual_minutes: i64,
    ) -> Result<Profile> {
        let profile = self.persistence.load_profile(profile_id).await?;
        let (queued, used) = settle(
            profile.compute_minutes_queued,
            profile.compute_minutes_used,
            reserved_minutes,
            actual_minutes,
        );

        let updated = self
            .persistence
            .update_profile_usage(
                profile_id,
                ProfileUsagePatch {
                    compute_minutes_queued: Some(queued),
                    compute_minutes_used: Some(used),
                    ..Default::default()
                },
            )
            .await?;

        info!(
            compute_minutes_queued = updated.compute_minutes_queued,
            compute_minutes_used = updated.compute_minutes_used,
            "Profile compute usage finalized"
        );
        Ok(updated)
    }

    /// Settle a finished job against the account record for its month.
    ///
    /// Nothing happens when the month has no record.
    #[instrument(skip(self))]
    pub async fn finalize_account_compute_usage(
        &self,
        year: i32,
        month: u32,
        reserved_minutes: i64,
        actual_minutes: i64,
    ) -> Result<()> {
        let Some(mut usage) = self.persistence.get_account_usage(year, month).await? else {
            debug!("No account usage record for period, skipping");
            return Ok(());
        };

        let (queued, used) = settle(
            usage.account_compute_minutes_queued,
            usage.account_compute_minutes_used,
            reserved_minutes,
            actual_minutes,
        );
        usage.account_compute_minutes_queued = queued;
        usage.account_compute_minutes_used = used;
        self.persistence.put_account_usage(&usage).await?;

        info!(
            account_compute_minutes_queued = queued,
            account_compute_minutes_used = used,
            "Account compute usage finalized"
        );
        Ok(())
    }

    /// Reserve a new job's runtime ceiling on its profile and on the account.
    #[instrument(skip(self))]
    pub async fn reserve_compute_minutes(
        &self,
        profile_id: &str,
        year: i32,
        month: u32,
        minutes: i64,
    ) -> Result<Profile> {
        let profile = self.persistence.load_profile(profile_id).await?;
        let updated = self
            .persistence
            .update_profile_usage(
                profile_id,
                ProfileUsagePatch {
                    compute_minutes_queued: Some(
                        profile.compute_minutes_queued.saturating_add(minutes),
                    ),
                    ..Default::default()
                },
            )
            .await?;

        let mut usage = self
            .persistence
            .get_account_usage(year, month)
            .await?
            .unwrap_or_else(|| AccountResourceUsage::empty(year, month));
        usage.account_compute_minutes_queued = usage
            .account_compute_minutes_queued
            .saturating_add(minutes);
        self.persistence.put_account_usage(&usage).await?;

        debug!(
            compute_minutes_queued = updated.compute_minutes_queued,
            "Compute minutes reserved"
        );
        Ok(updated)
    }

    /// Count one more model against the profile's monthly ceiling.
    pub async fn increment_model_count(&self, profile_id: &str) -> Result<Profile> {
        let profile = self.persistence.load_profile(profile_id).await?;
        let updated = self
            .persistence
            .update_profile_usage(
                profile_id,
                ProfileUsagePatch {
                    model_count: Some(profile.model_count.saturating_add(1)),
                    ..Default::default()
                },
            )
            .await?;
        Ok(updated)
    }

    /// Zero every profile's used minutes and model count.
    ///
    /// Pages are processed one after another; within a page, at most
    /// `profile_update_concurrency` updates run at once. The first failed
    /// update aborts the run. Queued minutes are left alone since they belong
    /// to jobs that are still running.
    #[instrument(skip(self))]
    pub async fn reset_monthly_quotas(&self, page_size: Option<usize>) -> Result<ResetSummary> {
        let page_size = page_size.unwrap_or(self.settings.max_query_results).max(1);
        let concurrency = self.settings.profile_update_concurrency.max(1);
        let mut summary = ResetSummary::default();
        let mut cursor = None;

        loop {
            let page = self
                .persistence
                .list_profiles(ListRequest {
                    cursor,
                    max_results: page_size,
                })
                .await?;
            summary.pages += 1;

            for chunk in page.data.chunks(concurrency) {
                let updates = chunk.iter().map(|profile| {
                    self.persistence
                        .update_profile_usage(&profile.profile_id, ProfileUsagePatch::monthly_reset())
                });
                if let Err(e) = try_join_all(updates).await {
                    warn!(
                        error = %e,
                        profiles_reset = summary.profiles,
                        "Monthly reset aborted"
                    );
                    return Err(e.into());
                }
                summary.profiles += chunk.len();
            }

            debug!(
                page = summary.pages,
                profiles = page.data.len(),
                "Reset page of profiles"
            );

            cursor = page.cursor;
            if cursor.is_none() {
                break;
            }
        }

        info!(
            profiles = summary.profiles,
            pages = summary.pages,
            "Monthly quotas reset"
        );
        Ok(summary)
    }
}

fn settle(queued: i64, used: i64, reserved: i64, actual: i64) -> (i64, i64) {
    let queued = queued.saturating_sub(reserved).max(0);
    let used = used.saturating_add(reserved.min(actual)).max(0);
    (queued, used)
}
