//! Error types used throughout the synchronization core

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ProviderId;

/// Main error type for FinSync operations
///
/// Authentication failures abort whole operations. Per-record failures never
/// surface here during a push; they are collected as [`RecordError`]s inside a
/// `SyncResult` instead.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum FinSyncError {
    #[error("Authentication error ({provider}): {message}")]
    Authentication { provider: ProviderId, message: String },

    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FinSyncError {
    /// Shorthand for an authentication failure against `provider`.
    pub fn auth(provider: ProviderId, message: impl Into<String>) -> Self {
        Self::Authentication { provider, message: message.into() }
    }

    /// True for failures that abort a whole operation rather than a record.
    #[must_use]
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Single actionable line for the UI layer.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Authentication { provider, .. } => {
                format!("Reconnect to {}", provider.display_name())
            }
            Self::Cancelled => "Sync cancelled".to_string(),
            Self::Timeout(_) | Self::Transport(_) => {
                "The provider could not be reached. Please try again shortly.".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Stable label suitable for structured logging.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Authentication { .. } => "authentication",
            Self::RateLimitExceeded(_) => "rate_limit",
            Self::Validation(_) => "validation",
            Self::Transport(_) => "transport",
            Self::InvalidState(_) => "invalid_state",
            Self::Config(_) => "config",
            Self::Storage(_) => "storage",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal",
        }
    }
}

/// Result type alias for FinSync operations
pub type Result<T> = std::result::Result<T, FinSyncError>;

/// Classification of a single record's failure during a push
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordErrorKind {
    /// The provider rejected the record's shape or values (4xx)
    Validation,
    /// The record already exists remotely (409 / duplicate reference)
    Conflict,
    /// Network failure, timeout, 429 or 5xx after the single retry
    Transport,
}

/// Failure of one record in a batch
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct RecordError {
    pub kind: RecordErrorKind,
    pub message: String,
}

impl RecordError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self { kind: RecordErrorKind::Validation, message: message.into() }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self { kind: RecordErrorKind::Conflict, message: message.into() }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self { kind: RecordErrorKind::Transport, message: message.into() }
    }

    /// Only transport failures are worth a second attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind == RecordErrorKind::Transport
    }
}

/// Outcome of a single record API call.
///
/// `Abort` carries failures that invalidate the whole batch (an expired or
/// revoked token discovered mid-batch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    Record(RecordError),
    Abort(FinSyncError),
}

impl From<RecordError> for CallError {
    fn from(value: RecordError) -> Self {
        Self::Record(value)
    }
}

impl From<FinSyncError> for CallError {
    fn from(value: FinSyncError) -> Self {
        Self::Abort(value)
    }
}
