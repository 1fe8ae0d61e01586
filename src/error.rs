use std::time::Duration;
use thiserror::Error;

/// Failures talking to the repository hosting API.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Network failure, timeout, or server-side error. `retryable` is false
    /// for unexpected client errors that retrying cannot fix.
    #[error("remote unavailable: {message}")]
    Unavailable { message: String, retryable: bool },

    /// The path does not exist (at all, or at the requested commit).
    #[error("not found: {0}")]
    NotFound(String),

    /// The API quota is exhausted.
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },
}

impl RemoteError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        RemoteError::Unavailable {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Unavailable { retryable, .. } => *retryable,
            RemoteError::RateLimited { .. } => true,
            RemoteError::NotFound(_) => false,
        }
    }
}

/// Failures of the catalog store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or failed the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// Why a commit's content does not describe a publishable version.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("no version field")]
    NoVersionField,
    #[error("malformed content: {0}")]
    MalformedContent(String),
    #[error("schema file absent at commit")]
    FileAbsent,
}
