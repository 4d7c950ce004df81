// Copyright (C) 2025 The Pitlane Racing Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Dead-letter reconciler for model imports.
//!
//! Import messages that exhausted their deliveries land here. The model they
//! refer to would otherwise stay IMPORTING forever, so each one is moved to
//! ERROR with a message the owner can quote to support.

use pitlane_core::model::ModelStatus;
use pitlane_core::persistence::Persistence;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// A message redelivered from the dead-letter queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterMessage {
    /// Queue message id.
    pub message_id: String,
    /// Original message body, JSON.
    pub body: String,
}

/// Outcome of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeadLetterSummary {
    /// Models moved to ERROR.
    pub updated: usize,
    /// Messages without a model or profile id.
    pub skipped: usize,
    /// Messages that could not be parsed or applied.
    pub failed: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportContext {
    #[serde(default)]
    model_id: Option<String>,
    #[serde(default)]
    profile_id: Option<String>,
}

/// Owner-facing error message for a model whose import was dead-lettered.
pub fn import_failure_message(request_id: &str) -> String {
    format!(
        "Unexpected error occurred while processing the model import. Please try again in few \
         minutes or contact support if issue persists with Request ID: {}",
        request_id
    )
}

/// Move the model behind each message to ERROR.
///
/// Never fails: a bad message is logged and counted, and the batch goes on.
pub async fn process_dead_letters(
    persistence: &dyn Persistence,
    batch: &[DeadLetterMessage],
    request_id: &str,
) -> DeadLetterSummary {
    info!(
        messages = batch.len(),
        request_id, "Processing dead-letter messages"
    );
    let mut summary = DeadLetterSummary::default();
    let error_message = import_failure_message(request_id);

    for message in batch {
        let context: ImportContext = match serde_json::from_str(&message.body) {
            Ok(context) => context,
            Err(e) => {
                error!(
                    message_id = %message.message_id,
                    request_id,
                    error = %e,
                    "Failed to parse dead-letter message"
                );
                summary.failed += 1;
                continue;
            }
        };

        let ids = context
            .model_id
            .filter(|id| !id.is_empty())
            .zip(context.profile_id.filter(|id| !id.is_empty()));
        let Some((model_id, profile_id)) = ids else {
            warn!(
                message_id = %message.message_id,
                body = %message.body,
                "Dead-letter message missing modelId or profileId"
            );
            summary.skipped += 1;
            continue;
        };

        match persistence
            .update_model_status(
                &profile_id,
                &model_id,
                ModelStatus::Error,
                Some(&error_message),
            )
            .await
        {
            Ok(()) => {
                info!(
                    %model_id,
                    %profile_id,
                    message_id = %message.message_id,
                    "Model status set to ERROR"
                );
                summary.updated += 1;
            }
            Err(e) => {
                error!(
                    %model_id,
                    message_id = %message.message_id,
                    request_id,
                    error = %e,
                    "Failed to process dead-letter message"
                );
                summary.failed += 1;
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_context_tolerates_extra_fields() {
        let context: ImportContext =
            serde_json::from_str(r#"{"modelId":"m-1","s3Bucket":"b"}"#).unwrap();
        assert_eq!(context.model_id.as_deref(), Some("m-1"));
        assert!(context.profile_id.is_none());
    }

    #[test]
    fn test_failure_message_carries_request_id() {
        let message = import_failure_message("req-42");
        assert!(message.starts_with("Unexpected error occurred while processing the model import."));
        assert!(message.ends_with("with Request ID: req-42"));
    }
}
