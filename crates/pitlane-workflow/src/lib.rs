// Copyright (C) 2025 The Pitlane Racing Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Pitlane Workflow - Job Lifecycle and Quota Operations
//!
//! This crate implements the operations that move models and jobs through
//! their lifecycle and keep compute quotas in balance. Records live in
//! [`pitlane_core`]; simulations run on a remote backend behind
//! [`backend::JobBackend`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          API / Scheduler                            │
//! └─────────────────────────────────────────────────────────────────────┘
//!           │ stop / submit            │ reset / finalize    │ DLQ batch
//!           ▼                          ▼                     ▼
//! ┌───────────────────┐      ┌──────────────────┐   ┌────────────────┐
//! │     handlers      │      │      quota       │   │  dead_letter   │
//! └───────────────────┘      └──────────────────┘   └────────────────┘
//!      │          │                   │                     │
//!      │          ▼                   │                     │
//!      │  ┌──────────────┐            │                     │
//!      │  │  execution   │──► backend (describe/stop/list)  │
//!      │  └──────────────┘            │                     │
//!      ▼                              ▼                     ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                pitlane-core Persistence (SQLite / memory)           │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Operations
//!
//! | Operation | Entry point |
//! |-----------|-------------|
//! | Stop model | [`handlers::handle_stop_model`] |
//! | Create submission | [`handlers::handle_create_submission`] |
//! | Cancel queued job | [`execution::JobExecutor::stop_queued_job`] |
//! | Finalize usage | [`quota::QuotaEngine::finalize_profile_compute_usage`] |
//! | Monthly reset | [`quota::QuotaEngine::reset_monthly_quotas`] |
//! | Limit check | [`quota::validate_racer_compute_limits`] |
//! | Import dead letters | [`dead_letter::process_dead_letters`] |
//!
//! # Configuration
//!
//! See [`config::Config::from_env`] for the environment variables read by
//! the `pitlane-workflow` binary.

#![deny(missing_docs)]

pub mod backend;
pub mod config;
pub mod dead_letter;
pub mod error;
pub mod execution;
pub mod handlers;
pub mod queue;
pub mod quota;

pub use error::{Error, Result};
