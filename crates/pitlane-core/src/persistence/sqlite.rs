// Copyright (C) 2025 The Pitlane Racing Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed persistence implementation.

use std::path::Path;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::error::CoreError;
use crate::job::{JobKey, JobKind, JobStatus, SubmissionJob, WorkflowJob};
use crate::leaderboard::Leaderboard;
use crate::model::{Model, ModelStatus};
use crate::usage::{AccountResourceUsage, Profile, ProfileUsagePatch};

use super::{
    ListRequest, Page, Persistence, STOPPABLE_JOB_STATUSES, STOPPABLE_SUBMISSION_STATUSES,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

const PROFILE_COLUMNS: &str = "profile_id, alias, compute_minutes_used, compute_minutes_queued, \
     max_total_compute_minutes, model_count, max_model_count, created_at";

/// SQLite-backed persistence provider.
#[derive(Clone)]
pub struct SqlitePersistence {
    pool: SqlitePool,
}

impl SqlitePersistence {
    /// Create a new SQLite persistence provider from an existing, migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Run the embedded migrations against `pool`.
    pub async fn migrate(pool: &SqlitePool) -> Result<(), CoreError> {
        MIGRATOR.run(pool).await.map_err(|e| CoreError::Database {
            operation: "migrate".to_string(),
            details: format!("Failed to run migrations: {}", e),
        })
    }

    /// Connect to a database URL (e.g. `sqlite::memory:` or
    /// `sqlite:.data/pitlane.db?mode=rwc`) and run migrations.
    pub async fn connect(url: &str) -> Result<Self, CoreError> {
        // A pooled in-memory database is one database per connection.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| CoreError::Database {
                operation: "connect".to_string(),
                details: format!("Failed to connect to SQLite at {}: {}", url, e),
            })?;

        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// Create and initialize a SQLite database at `path`, creating parent
    /// directories and the file itself when missing.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::Database {
                operation: "create_dir".to_string(),
                details: format!("Failed to create directory {:?}: {}", parent, e),
            })?;
        }

        Self::connect(&format!("sqlite:{}?mode=rwc", path.to_string_lossy())).await
    }

    async fn find_stoppable(
        &self,
        kind: JobKind,
        statuses: &[JobStatus],
        model_id: &str,
        profile_id: Option<&str>,
    ) -> Result<Option<WorkflowJob>, CoreError> {
        let placeholders = vec!["?"; statuses.len()].join(", ");
        let profile_filter = if profile_id.is_some() {
            " AND profile_id = ?"
        } else {
            ""
        };
        let sql = format!(
            "SELECT status, updated_at, body FROM jobs \
             WHERE kind = ? AND model_id = ?{} AND status IN ({}) \
             ORDER BY created_at DESC LIMIT 1",
            profile_filter, placeholders
        );

        let mut query = sqlx::query(&sql).bind(kind.as_str()).bind(model_id);
        if let Some(profile_id) = profile_id {
            query = query.bind(profile_id);
        }
        for status in statuses {
            query = query.bind(status.as_str());
        }

        query
            .fetch_optional(&self.pool)
            .await?
            .map(|row| job_from_row(&row))
            .transpose()
    }
}

fn model_from_row(row: &SqliteRow) -> Result<Model, CoreError> {
    let status: String = row.try_get("status")?;
    let asset_locations: String = row.try_get("asset_locations")?;
    let hyperparameters: String = row.try_get("hyperparameters")?;
    Ok(Model {
        model_id: row.try_get("model_id")?,
        profile_id: row.try_get("profile_id")?,
        name: row.try_get("name")?,
        status: status.parse()?,
        cloned_from_model_id: row.try_get("cloned_from_model_id")?,
        asset_locations: serde_json::from_str(&asset_locations)?,
        hyperparameters: serde_json::from_str(&hyperparameters)?,
        error_message: row.try_get("error_message")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn job_from_row(row: &SqliteRow) -> Result<WorkflowJob, CoreError> {
    let body: String = row.try_get("body")?;
    let status: String = row.try_get("status")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    let mut job: WorkflowJob = serde_json::from_str(&body)?;
    let record = job.record_mut();
    record.status = status.parse()?;
    record.updated_at = updated_at;
    Ok(job)
}

fn profile_from_row(row: &SqliteRow) -> Result<Profile, CoreError> {
    Ok(Profile {
        profile_id: row.try_get("profile_id")?,
        alias: row.try_get("alias")?,
        compute_minutes_used: row.try_get("compute_minutes_used")?,
        compute_minutes_queued: row.try_get("compute_minutes_queued")?,
        max_total_compute_minutes: row.try_get("max_total_compute_minutes")?,
        model_count: row.try_get("model_count")?,
        max_model_count: row.try_get("max_model_count")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait::async_trait]
impl Persistence for SqlitePersistence {
    async fn create_model(&self, model: &Model) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO models (profile_id, model_id, name, status, cloned_from_model_id,
                                asset_locations, hyperparameters, error_message,
                                created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&model.profile_id)
        .bind(&model.model_id)
        .bind(&model.name)
        .bind(model.status.as_str())
        .bind(&model.cloned_from_model_id)
        .bind(serde_json::to_string(&model.asset_locations)?)
        .bind(serde_json::to_string(&model.hyperparameters)?)
        .bind(&model.error_message)
        .bind(model.created_at)
        .bind(model.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_model(
        &self,
        profile_id: &str,
        model_id: &str,
    ) -> Result<Option<Model>, CoreError> {
        sqlx::query(
            r#"
            SELECT profile_id, model_id, name, status, cloned_from_model_id,
                   asset_locations, hyperparameters, error_message, created_at, updated_at
            FROM models
            WHERE profile_id = ? AND model_id = ?
            "#,
        )
        .bind(profile_id)
        .bind(model_id)
        .fetch_optional(&self.pool)
        .await?
        .map(|row| model_from_row(&row))
        .transpose()
    }

    async fn update_model_status(
        &self,
        profile_id: &str,
        model_id: &str,
        status: ModelStatus,
        error_message: Option<&str>,
    ) -> Result<(), CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE models
            SET status = ?,
                error_message = CASE WHEN ? THEN NULL ELSE COALESCE(?, error_message) END,
                updated_at = ?
            WHERE profile_id = ? AND model_id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(status == ModelStatus::Ready)
        .bind(error_message)
        .bind(Utc::now())
        .bind(profile_id)
        .bind(model_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("Model", model_id));
        }

        Ok(())
    }

    async fn create_job(&self, job: &WorkflowJob) -> Result<(), CoreError> {
        let record = job.record();
        let submission_number = match job {
            WorkflowJob::Submission(sub) => Some(i64::from(sub.submission_number)),
            _ => None,
        };

        sqlx::query(
            r#"
            INSERT INTO jobs (job_name, kind, model_id, profile_id, leaderboard_id,
                              submission_number, status, body, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.job_name)
        .bind(job.kind().as_str())
        .bind(&record.model_id)
        .bind(&record.profile_id)
        .bind(job.leaderboard_id())
        .bind(submission_number)
        .bind(record.status.as_str())
        .bind(serde_json::to_string(job)?)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_job(&self, job_name: &str) -> Result<Option<WorkflowJob>, CoreError> {
        sqlx::query("SELECT status, updated_at, body FROM jobs WHERE job_name = ?")
            .bind(job_name)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| job_from_row(&row))
            .transpose()
    }

    async fn update_job_status(&self, key: &JobKey, status: JobStatus) -> Result<(), CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?, updated_at = ?
            WHERE job_name = ? AND kind = ? AND model_id = ? AND profile_id = ?
              AND leaderboard_id IS ?
            "#,
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(&key.job_name)
        .bind(key.kind.as_str())
        .bind(&key.model_id)
        .bind(&key.profile_id)
        .bind(&key.leaderboard_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("Job", key.job_name.clone()));
        }

        Ok(())
    }

    async fn get_stoppable_training(
        &self,
        model_id: &str,
    ) -> Result<Option<WorkflowJob>, CoreError> {
        self.find_stoppable(JobKind::Training, &STOPPABLE_JOB_STATUSES, model_id, None)
            .await
    }

    async fn get_stoppable_evaluation(
        &self,
        model_id: &str,
    ) -> Result<Option<WorkflowJob>, CoreError> {
        self.find_stoppable(JobKind::Evaluation, &STOPPABLE_JOB_STATUSES, model_id, None)
            .await
    }

    async fn get_stoppable_submission(
        &self,
        model_id: &str,
        profile_id: &str,
    ) -> Result<Option<WorkflowJob>, CoreError> {
        self.find_stoppable(
            JobKind::Submission,
            &STOPPABLE_SUBMISSION_STATUSES,
            model_id,
            Some(profile_id),
        )
        .await
    }

    async fn list_submissions_by_created_at(
        &self,
        profile_id: &str,
        leaderboard_id: &str,
        max_results: usize,
    ) -> Result<Vec<SubmissionJob>, CoreError> {
        let rows = sqlx::query(
            r#"
            SELECT status, updated_at, body
            FROM jobs
            WHERE kind = 'submission' AND profile_id = ? AND leaderboard_id = ?
            ORDER BY created_at DESC, submission_number DESC
            LIMIT ?
            "#,
        )
        .bind(profile_id)
        .bind(leaderboard_id)
        .bind(max_results as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut submissions = Vec::with_capacity(rows.len());
        for row in rows {
            match job_from_row(&row)? {
                WorkflowJob::Submission(sub) => submissions.push(sub),
                other => {
                    return Err(CoreError::Serialization(format!(
                        "job '{}' stored as submission has kind '{}'",
                        other.name(),
                        other.kind()
                    )));
                }
            }
        }

        Ok(submissions)
    }

    async fn create_profile(&self, profile: &Profile) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO profiles (profile_id, alias, compute_minutes_used, compute_minutes_queued,
                                  max_total_compute_minutes, model_count, max_model_count,
                                  created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&profile.profile_id)
        .bind(&profile.alias)
        .bind(profile.compute_minutes_used)
        .bind(profile.compute_minutes_queued)
        .bind(profile.max_total_compute_minutes)
        .bind(profile.model_count)
        .bind(profile.max_model_count)
        .bind(profile.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_profile(&self, profile_id: &str) -> Result<Option<Profile>, CoreError> {
        let sql = format!("SELECT {} FROM profiles WHERE profile_id = ?", PROFILE_COLUMNS);
        sqlx::query(&sql)
            .bind(profile_id)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| profile_from_row(&row))
            .transpose()
    }

    async fn update_profile_usage(
        &self,
        profile_id: &str,
        patch: ProfileUsagePatch,
    ) -> Result<Profile, CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET compute_minutes_used = COALESCE(?, compute_minutes_used),
                compute_minutes_queued = COALESCE(?, compute_minutes_queued),
                model_count = COALESCE(?, model_count)
            WHERE profile_id = ?
            "#,
        )
        .bind(patch.compute_minutes_used)
        .bind(patch.compute_minutes_queued)
        .bind(patch.model_count)
        .bind(profile_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("Profile", profile_id));
        }

        self.load_profile(profile_id).await
    }

    async fn list_profiles(&self, request: ListRequest) -> Result<Page<Profile>, CoreError> {
        let limit = request.max_results.max(1);
        let sql = format!(
            "SELECT {} FROM profiles WHERE (? IS NULL OR profile_id > ?) \
             ORDER BY profile_id LIMIT ?",
            PROFILE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(&request.cursor)
            .bind(&request.cursor)
            .bind((limit + 1) as i64)
            .fetch_all(&self.pool)
            .await?;

        let mut data = rows
            .iter()
            .map(profile_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let cursor = if data.len() > limit {
            data.truncate(limit);
            data.last().map(|p| p.profile_id.clone())
        } else {
            None
        };

        Ok(Page { data, cursor })
    }

    async fn get_account_usage(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Option<AccountResourceUsage>, CoreError> {
        let row = sqlx::query(
            r#"
            SELECT account_compute_minutes_queued, account_compute_minutes_used
            FROM account_resource_usage
            WHERE year = ? AND month = ?
            "#,
        )
        .bind(year)
        .bind(i64::from(month))
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(AccountResourceUsage {
                year,
                month,
                account_compute_minutes_queued: row.try_get("account_compute_minutes_queued")?,
                account_compute_minutes_used: row.try_get("account_compute_minutes_used")?,
            })
        })
        .transpose()
    }

    async fn put_account_usage(&self, usage: &AccountResourceUsage) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO account_resource_usage
                (year, month, account_compute_minutes_queued, account_compute_minutes_used)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (year, month) DO UPDATE SET
                account_compute_minutes_queued = excluded.account_compute_minutes_queued,
                account_compute_minutes_used = excluded.account_compute_minutes_used
            "#,
        )
        .bind(usage.year)
        .bind(i64::from(usage.month))
        .bind(usage.account_compute_minutes_queued)
        .bind(usage.account_compute_minutes_used)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_leaderboard(&self, leaderboard: &Leaderboard) -> Result<(), CoreError> {
        sqlx::query("INSERT INTO leaderboards (leaderboard_id, body) VALUES (?, ?)")
            .bind(&leaderboard.leaderboard_id)
            .bind(serde_json::to_string(leaderboard)?)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_leaderboard(
        &self,
        leaderboard_id: &str,
    ) -> Result<Option<Leaderboard>, CoreError> {
        let body: Option<String> =
            sqlx::query_scalar("SELECT body FROM leaderboards WHERE leaderboard_id = ?")
                .bind(leaderboard_id)
                .fetch_optional(&self.pool)
                .await?;

        body.map(|body| serde_json::from_str(&body).map_err(CoreError::from))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use chrono::Duration;

    /// Create an in-memory SQLite pool for testing.
    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory SQLite pool");

        MIGRATOR.run(&pool).await.expect("Failed to run migrations");

        pool
    }

    #[tokio::test]
    async fn test_create_and_get_model() {
        let persistence = SqlitePersistence::new(test_pool().await);
        let model = testing::model("p-1", "m-1", ModelStatus::Ready);

        persistence.create_model(&model).await.unwrap();

        let loaded = persistence
            .get_model("p-1", "m-1")
            .await
            .unwrap()
            .expect("model should exist");
        assert_eq!(loaded.name, model.name);
        assert_eq!(loaded.status, ModelStatus::Ready);
        assert_eq!(loaded.asset_locations, model.asset_locations);
        assert_eq!(loaded.hyperparameters, model.hyperparameters);

        assert!(persistence.get_model("p-2", "m-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_model_status_keeps_message_when_absent() {
        let persistence = SqlitePersistence::new(test_pool().await);
        persistence
            .create_model(&testing::model("p-1", "m-1", ModelStatus::Importing))
            .await
            .unwrap();

        persistence
            .update_model_status("p-1", "m-1", ModelStatus::Error, Some("import failed"))
            .await
            .unwrap();
        persistence
            .update_model_status("p-1", "m-1", ModelStatus::Error, None)
            .await
            .unwrap();

        let model = persistence.load_model("p-1", "m-1").await.unwrap();
        assert_eq!(model.status, ModelStatus::Error);
        assert_eq!(model.error_message.as_deref(), Some("import failed"));

        persistence
            .update_model_status("p-1", "m-1", ModelStatus::Ready, None)
            .await
            .unwrap();
        let model = persistence.load_model("p-1", "m-1").await.unwrap();
        assert_eq!(model.status, ModelStatus::Ready);
        assert_eq!(model.error_message, None);

        let err = persistence
            .update_model_status("p-1", "missing", ModelStatus::Ready, None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_job_status_column_wins_over_body() {
        let persistence = SqlitePersistence::new(test_pool().await);
        let job = testing::training_job("m-1", "p-1");
        persistence.create_job(&job).await.unwrap();

        persistence
            .update_job_status(&job.key(), JobStatus::InProgress)
            .await
            .unwrap();

        let loaded = persistence.load_job(job.name()).await.unwrap();
        assert_eq!(loaded.status(), JobStatus::InProgress);
        assert_eq!(loaded.record().termination_conditions.max_time_in_minutes, 60);
    }

    #[tokio::test]
    async fn test_update_job_status_with_wrong_key_is_not_found() {
        let persistence = SqlitePersistence::new(test_pool().await);
        let job = testing::training_job("m-1", "p-1");
        persistence.create_job(&job).await.unwrap();

        let mut key = job.key();
        key.profile_id = "someone-else".to_string();
        let err = persistence
            .update_job_status(&key, JobStatus::Stopping)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_stoppable_lookups_filter_by_status() {
        let persistence = SqlitePersistence::new(test_pool().await);
        let training = testing::training_job("m-1", "p-1");
        let evaluation = testing::evaluation_job("e-1", "m-1", "p-1");
        persistence.create_job(&training).await.unwrap();
        persistence.create_job(&evaluation).await.unwrap();

        assert!(persistence.get_stoppable_training("m-1").await.unwrap().is_some());
        assert!(persistence.get_stoppable_evaluation("m-1").await.unwrap().is_some());

        persistence
            .update_job_status(&training.key(), JobStatus::Completed)
            .await
            .unwrap();
        persistence
            .update_job_status(&evaluation.key(), JobStatus::Initializing)
            .await
            .unwrap();

        assert!(persistence.get_stoppable_training("m-1").await.unwrap().is_none());
        let evaluation = persistence
            .get_stoppable_evaluation("m-1")
            .await
            .unwrap()
            .expect("initializing evaluation is stoppable");
        assert_eq!(evaluation.status(), JobStatus::Initializing);
    }

    #[tokio::test]
    async fn test_stoppable_submission_is_scoped_to_profile() {
        let persistence = SqlitePersistence::new(test_pool().await);
        let submission = testing::submission_job("s-1", "m-1", "p-1", "lb-1", 1);
        persistence.create_job(&submission).await.unwrap();

        assert!(
            persistence
                .get_stoppable_submission("m-1", "p-1")
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            persistence
                .get_stoppable_submission("m-1", "p-2")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_list_submissions_newest_first() {
        let persistence = SqlitePersistence::new(test_pool().await);
        let base = Utc::now();
        for n in 1..=3u32 {
            let mut job = testing::submission_job(&format!("s-{}", n), "m-1", "p-1", "lb-1", n);
            job.record_mut().created_at = base + Duration::seconds(i64::from(n));
            persistence.create_job(&job).await.unwrap();
        }
        persistence
            .create_job(&testing::submission_job("s-x", "m-1", "p-1", "lb-2", 9))
            .await
            .unwrap();

        let latest = persistence
            .list_submissions_by_created_at("p-1", "lb-1", 1)
            .await
            .unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].submission_number, 3);

        let all = persistence
            .list_submissions_by_created_at("p-1", "lb-1", 10)
            .await
            .unwrap();
        let numbers: Vec<u32> = all.iter().map(|s| s.submission_number).collect();
        assert_eq!(numbers, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_profile_usage_patch() {
        let persistence = SqlitePersistence::new(test_pool().await);
        let mut profile = testing::profile("p-1");
        profile.compute_minutes_used = 50;
        profile.compute_minutes_queued = 30;
        profile.model_count = 4;
        persistence.create_profile(&profile).await.unwrap();

        let updated = persistence
            .update_profile_usage("p-1", ProfileUsagePatch::monthly_reset())
            .await
            .unwrap();
        assert_eq!(updated.compute_minutes_used, 0);
        assert_eq!(updated.model_count, 0);
        assert_eq!(updated.compute_minutes_queued, 30);

        let err = persistence
            .update_profile_usage("ghost", ProfileUsagePatch::monthly_reset())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_profiles_pages() {
        let persistence = SqlitePersistence::new(test_pool().await);
        for i in 0..5 {
            persistence
                .create_profile(&testing::profile(&format!("p-{}", i)))
                .await
                .unwrap();
        }

        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let page = persistence
                .list_profiles(ListRequest {
                    cursor,
                    max_results: 2,
                })
                .await
                .unwrap();
            seen.extend(page.data.into_iter().map(|p| p.profile_id));
            cursor = page.cursor;
            if cursor.is_none() {
                break;
            }
        }

        assert_eq!(seen, vec!["p-0", "p-1", "p-2", "p-3", "p-4"]);
    }

    #[tokio::test]
    async fn test_account_usage_upsert() {
        let persistence = SqlitePersistence::new(test_pool().await);
        assert!(persistence.get_account_usage(2025, 3).await.unwrap().is_none());

        let mut usage = AccountResourceUsage::empty(2025, 3);
        usage.account_compute_minutes_queued = 20;
        persistence.put_account_usage(&usage).await.unwrap();

        usage.account_compute_minutes_used = 7;
        persistence.put_account_usage(&usage).await.unwrap();

        let loaded = persistence.get_account_usage(2025, 3).await.unwrap().unwrap();
        assert_eq!(loaded, usage);
    }

    #[tokio::test]
    async fn test_leaderboard_round_trip() {
        let persistence = SqlitePersistence::new(test_pool().await);
        let leaderboard = testing::open_leaderboard("lb-1");
        persistence.create_leaderboard(&leaderboard).await.unwrap();

        let loaded = persistence.load_leaderboard("lb-1").await.unwrap();
        assert_eq!(loaded, leaderboard);
        assert!(persistence.load_leaderboard("lb-2").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_from_path_creates_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pitlane.db");

        let persistence = SqlitePersistence::from_path(&path).await.unwrap();
        persistence
            .create_profile(&testing::profile("p-1"))
            .await
            .unwrap();

        assert!(path.exists());
    }
}
