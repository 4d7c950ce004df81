// Copyright (C) 2025 The Pitlane Racing Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for pitlane-core.
//!
//! Every failure surfaced to callers falls into one of three classes:
//! caller-fixable (`BadRequest`), missing resource (`NotFound`) or an
//! operator-facing inconsistency (`InternalFailure`). Store failures keep
//! their own variants so they propagate unchanged.

use thiserror::Error;

/// Result type using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Generic message for internal failures that must not leak details.
pub const INTERNAL_SERVICE_ERROR: &str = "Internal service error.";

/// Core errors that can occur while processing a request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum CoreError {
    /// A caller-fixable precondition was violated.
    #[error("{message}")]
    BadRequest {
        /// Message returned verbatim to the caller.
        message: String,
    },

    /// A model, job, leaderboard or profile does not exist.
    #[error("{resource} '{id}' not found")]
    NotFound {
        /// Kind of resource that was looked up.
        resource: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// Backend inconsistency or exhausted retry budget.
    #[error("{message}")]
    InternalFailure {
        /// Message returned verbatim to the caller.
        message: String,
    },

    /// Database operation failed.
    #[error("Database error during '{operation}': {details}")]
    Database {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },

    /// A stored document could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CoreError {
    /// Shorthand for a [`CoreError::BadRequest`].
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Shorthand for a [`CoreError::NotFound`].
    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }

    /// Shorthand for a [`CoreError::InternalFailure`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalFailure {
            message: message.into(),
        }
    }

    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "BAD_REQUEST",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InternalFailure { .. } => "INTERNAL_FAILURE",
            Self::Database { .. } => "DATABASE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Whether the caller can fix the request and retry.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::BadRequest { .. })
    }

    /// Whether the error reports a missing resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::Database {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}
