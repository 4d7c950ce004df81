// Copyright (C) 2025 The Pitlane Racing Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Workflow job queue.
//!
//! Creating a job ends with a fire-and-forget message telling the workflow
//! to pick the job up. Messages are deduplicated on the job name within a
//! five-minute window, so re-sending the same job is harmless.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;
use tracing::debug;

/// How long a job name is remembered for deduplication.
pub const DEDUP_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Errors from queue operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum QueueError {
    /// The consumer side is gone.
    #[error("Queue closed")]
    Closed,
}

/// Message asking the workflow to run a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowMessage {
    /// Model the job runs for.
    pub model_id: String,
    /// Owning profile.
    pub profile_id: String,
    /// Leaderboard, submissions only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaderboard_id: Option<String>,
    /// Backend job name.
    pub job_name: String,
}

impl WorkflowMessage {
    /// Messages with the same id within [`DEDUP_WINDOW`] are delivered once.
    pub fn deduplication_id(&self) -> &str {
        &self.job_name
    }
}

/// Fire-and-forget queue feeding the workflow.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a message. Duplicates are accepted and dropped.
    async fn enqueue(&self, message: WorkflowMessage) -> Result<(), QueueError>;
}

/// In-process queue over a tokio channel.
pub struct ChannelQueue {
    sender: mpsc::Sender<WorkflowMessage>,
    seen: Mutex<HashMap<String, Instant>>,
}

impl ChannelQueue {
    /// Create a queue and the receiver the workflow consumes from.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<WorkflowMessage>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                sender,
                seen: Mutex::new(HashMap::new()),
            },
            receiver,
        )
    }

    /// Job names currently held for deduplication.
    pub async fn remembered(&self) -> usize {
        self.seen.lock().await.len()
    }
}

#[async_trait]
impl JobQueue for ChannelQueue {
    async fn enqueue(&self, message: WorkflowMessage) -> Result<(), QueueError> {
        let now = Instant::now();
        let mut seen = self.seen.lock().await;
        seen.retain(|_, sent_at| now.duration_since(*sent_at) < DEDUP_WINDOW);
        if seen.contains_key(message.deduplication_id()) {
            debug!(job_name = %message.job_name, "Duplicate workflow message dropped");
            return Ok(());
        }
        seen.insert(message.deduplication_id().to_string(), now);

        if self.sender.send(message).await.is_err() {
            return Err(QueueError::Closed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(job_name: &str) -> WorkflowMessage {
        WorkflowMessage {
            model_id: "m-1".to_string(),
            profile_id: "p-1".to_string(),
            leaderboard_id: Some("lb-1".to_string()),
            job_name: job_name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicates_are_dropped() {
        let (queue, mut receiver) = ChannelQueue::new(8);

        queue.enqueue(message("job-a")).await.unwrap();
        queue.enqueue(message("job-a")).await.unwrap();
        queue.enqueue(message("job-b")).await.unwrap();
        drop(queue);

        let mut names = Vec::new();
        while let Some(msg) = receiver.recv().await {
            names.push(msg.job_name);
        }
        assert_eq!(names, vec!["job-a", "job-b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_names_expire_after_window() {
        let (queue, mut receiver) = ChannelQueue::new(8);

        queue.enqueue(message("job-a")).await.unwrap();
        tokio::time::advance(DEDUP_WINDOW - Duration::from_secs(1)).await;
        queue.enqueue(message("job-a")).await.unwrap();
        queue.enqueue(message("job-b")).await.unwrap();
        assert_eq!(queue.remembered().await, 2);

        tokio::time::advance(Duration::from_secs(1)).await;
        queue.enqueue(message("job-a")).await.unwrap();
        assert_eq!(queue.remembered().await, 2);

        tokio::time::advance(DEDUP_WINDOW).await;
        queue.enqueue(message("job-c")).await.unwrap();
        assert_eq!(queue.remembered().await, 1);
        drop(queue);

        let mut names = Vec::new();
        while let Some(msg) = receiver.recv().await {
            names.push(msg.job_name);
        }
        assert_eq!(names, vec!["job-a", "job-b", "job-a", "job-c"]);
    }

    #[tokio::test]
    async fn test_closed_queue() {
        let (queue, receiver) = ChannelQueue::new(1);
        drop(receiver);
        assert_eq!(
            queue.enqueue(message("job-a")).await,
            Err(QueueError::Closed)
        );
    }

    #[test]
    fn test_message_wire_format() {
        let value = serde_json::to_value(message("job-a")).unwrap();
        assert_eq!(value["modelId"], "m-1");
        assert_eq!(value["leaderboardId"], "lb-1");
        assert_eq!(value["jobName"], "job-a");
    }
}
