// Copyright (C) 2025 The Pitlane Racing Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for pitlane-workflow.

use pitlane_core::error::CoreError;
use thiserror::Error;

/// Workflow errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Domain or store error; the message is passed through unchanged.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Job execution backend call failed.
    #[error("Backend error: {0}")]
    Backend(#[from] crate::backend::BackendError),

    /// Workflow queue rejected a message.
    #[error("Queue error: {0}")]
    Queue(#[from] crate::queue::QueueError),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Error code reported to callers.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Core(err) => err.error_code(),
            Self::Config(_) => "CONFIGURATION_ERROR",
            Self::Backend(_) => "BACKEND_ERROR",
            Self::Queue(_) => "QUEUE_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Caller-fixable precondition violation.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::Core(err) if err.is_bad_request())
    }

    /// Missing model, job, leaderboard or profile.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Core(err) if err.is_not_found())
    }

    /// Backend inconsistency or exhausted wait.
    pub fn is_internal_failure(&self) -> bool {
        matches!(self, Self::Core(CoreError::InternalFailure { .. }))
    }
}

/// Result type using workflow Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_pass_through() {
        let err: Error = CoreError::bad_request("Model is not in a stoppable state.").into();
        assert!(err.is_bad_request());
        assert_eq!(err.error_code(), "BAD_REQUEST");
        assert_eq!(err.to_string(), "Model is not in a stoppable state.");

        let err: Error = CoreError::not_found("Model", "m-1").into();
        assert!(err.is_not_found());
        assert!(!err.is_bad_request());

        let err: Error = CoreError::internal("boom").into();
        assert!(err.is_internal_failure());
    }

    #[test]
    fn test_backend_error_code() {
        let err: Error = crate::backend::BackendError::JobNotFound("j".to_string()).into();
        assert_eq!(err.error_code(), "BACKEND_ERROR");
        assert!(!err.is_bad_request());
    }
}
