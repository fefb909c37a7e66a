//! Error taxonomy for client operations.
//!
//! Classification happens once, at the client boundary: callers receive a
//! single typed error per failed call. [`ApiError::RetryableSessionRestored`]
//! is the one retry signal — the session was recovered from persisted state
//! and the original call should be retried exactly once.

use std::time::Duration;

use thiserror::Error;

use integram_common::{ErrorClassification, ErrorSeverity, SessionError, StorageError};

/// Failures of client operations.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("network unreachable; check the connection")]
    NetworkUnreachable,

    #[error("no response received from the server")]
    NoResponse,

    #[error("session expired; authenticate again")]
    SessionExpired,

    #[error("session restored from persisted state; retry the call once")]
    RetryableSessionRestored,

    #[error("access forbidden")]
    Forbidden,

    #[error("resource not found")]
    NotFound,

    #[error("server error: {0}")]
    ServerError(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("no database selected")]
    NoDatabaseSelected,

    #[error("no session for database `{0}`; authenticate first")]
    UnknownDatabase(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("invalid response from server: {0}")]
    InvalidResponse(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("configuration error: {0}")]
    Config(String),

    /// Transport failure that fits no other category, passed through
    /// unclassified.
    #[error(transparent)]
    Transport(reqwest::Error),
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::UnknownDatabase(database) => Self::UnknownDatabase(database),
            SessionError::NoDatabaseSelected => Self::NoDatabaseSelected,
        }
    }
}

impl ErrorClassification for ApiError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::RetryableSessionRestored)
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotFound => ErrorSeverity::Info,
            Self::Timeout(_)
            | Self::NetworkUnreachable
            | Self::NoResponse
            | Self::RetryableSessionRestored
            | Self::SessionExpired => ErrorSeverity::Warning,
            Self::Forbidden
            | Self::ServerError(_)
            | Self::Http { .. }
            | Self::NoDatabaseSelected
            | Self::UnknownDatabase(_)
            | Self::AuthenticationFailed(_)
            | Self::InvalidResponse(_)
            | Self::Config(_)
            | Self::Transport(_) => ErrorSeverity::Error,
            Self::Storage(_) => ErrorSeverity::Critical,
        }
    }
}
