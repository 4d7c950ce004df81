// Copyright (C) 2025 The Pitlane Racing Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Pitlane Core - domain model and persistence
//!
//! This crate holds the records that the pitlane workflow layer reads and
//! mutates (models, workflow jobs, racer profiles, account usage and
//! leaderboards) together with the store abstraction they live behind.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          pitlane-workflow                                │
//! │   stop model · create submission · quota reconciliation · dead letters   │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    │ Persistence trait
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         pitlane-core (this crate)                        │
//! │        records · errors · settings whitelist · store backends            │
//! └─────────────────────────────────────────────────────────────────────────┘
//!           │                                              │
//!           ▼                                              ▼
//! ┌───────────────────────┐                    ┌─────────────────────────────┐
//! │  SqlitePersistence    │                    │    MemoryPersistence        │
//! │  (sqlx, migrations)   │                    │  (tests, fault injection)   │
//! └───────────────────────┘                    └─────────────────────────────┘
//! ```
//!
//! # Records
//!
//! | Record | Key | Notes |
//! |--------|-----|-------|
//! | [`model::Model`] | `(profile_id, model_id)` | status projects the active job |
//! | [`job::WorkflowJob`] | `job_name` | training, evaluation or submission |
//! | [`usage::Profile`] | `profile_id` | monthly compute and model counters |
//! | [`usage::AccountResourceUsage`] | `(year, month)` | account-wide counters |
//! | [`leaderboard::Leaderboard`] | `leaderboard_id` | submission window and race setup |
//!
//! # Errors
//!
//! Every fallible call returns [`error::CoreError`]. Callers map
//! `BadRequest`, `NotFound` and `InternalFailure` straight to their
//! responses; store failures surface as `Database`.

#![deny(missing_docs)]

/// Error types shared by every pitlane crate.
pub mod error;

/// Workflow job records and the job status state machine.
pub mod job;

/// Leaderboard records.
pub mod leaderboard;

/// Model records and storage locations.
pub mod model;

/// Store abstraction with SQLite and in-memory backends.
pub mod persistence;

/// Settings document and its write whitelist.
pub mod settings;

/// Record fixtures for tests.
pub mod testing;

/// Profile and account usage counters.
pub mod usage;

pub use error::{CoreError, Result};
pub use persistence::{MemoryPersistence, Persistence, SqlitePersistence};
