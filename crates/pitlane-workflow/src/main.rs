// Copyright (C) 2025 The Pitlane Racing Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Pitlane Workflow - maintenance commands
//!
//! ```text
//! pitlane-workflow reset-quotas [page-size]
//! pitlane-workflow dead-letter <messages.json>
//! ```

use std::sync::Arc;

use anyhow::{Context, bail};
use tracing::{info, warn};

use pitlane_core::persistence::SqlitePersistence;
use pitlane_workflow::config::Config;
use pitlane_workflow::dead_letter::{DeadLetterMessage, process_dead_letters};
use pitlane_workflow::quota::QuotaEngine;

const USAGE: &str = "usage: pitlane-workflow <reset-quotas [page-size] | dead-letter <file.json>>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pitlane_workflow=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        bail!(USAGE);
    };

    let config = Config::from_env()?;
    let persistence = Arc::new(SqlitePersistence::connect(&config.database_url).await?);
    info!(database_url = %config.database_url, "Connected to database");

    match command.as_str() {
        "reset-quotas" => {
            let page_size = args
                .get(1)
                .map(|s| s.parse::<usize>())
                .transpose()
                .context("page-size must be a positive integer")?;

            let engine = QuotaEngine::new(persistence, config.quota_settings());
            let summary = engine.reset_monthly_quotas(page_size).await?;
            info!(
                profiles = summary.profiles,
                pages = summary.pages,
                "Reset complete"
            );
        }
        "dead-letter" => {
            let path = args.get(1).context(USAGE)?;
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read {}", path))?;
            let batch: Vec<DeadLetterMessage> =
                serde_json::from_str(&raw).context("expected a JSON array of messages")?;

            let request_id = uuid::Uuid::new_v4().to_string();
            let summary = process_dead_letters(persistence.as_ref(), &batch, &request_id).await;
            info!(
                request_id,
                updated = summary.updated,
                skipped = summary.skipped,
                failed = summary.failed,
                "Dead-letter batch processed"
            );
        }
        other => bail!("unknown command '{}'\n{}", other, USAGE),
    }

    Ok(())
}
