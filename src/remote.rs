//! Remote history abstraction.
//!
//! A [`HistorySource`] lists the commits that touched a tracked schema file
//! and fetches the file content as it was at a given commit. The GitHub
//! implementation lives in [`github`](crate::github); tests substitute an
//! in-memory history.
//!
//! # Retries
//!
//! [`retry_with_backoff`] wraps a single remote call. `RateLimited` and
//! retryable `Unavailable` errors are retried with exponential backoff
//! (`base`, `2 * base`, `4 * base`, ... capped at [`MAX_BACKOFF`]); a
//! larger `retry_after` hint from the server wins over the computed delay.
//! `NotFound` and non-retryable errors propagate immediately.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::models::{CommitDescriptor, TrackedModel};

/// Longest computed backoff between two attempts.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Longest server-requested wait that is honored.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(15 * 60);

#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Commits touching the model's schema file, newest first.
    ///
    /// Pages through the full history unless `limit` caps the number of
    /// commits returned.
    async fn list_commits(
        &self,
        model: &TrackedModel,
        limit: Option<usize>,
    ) -> Result<Vec<CommitDescriptor>, RemoteError>;

    /// Raw schema content at `commit_hash`. `NotFound` when the file did
    /// not exist at that commit.
    async fn fetch_content_at(
        &self,
        model: &TrackedModel,
        commit_hash: &str,
    ) -> Result<Vec<u8>, RemoteError>;
}

/// Bounded exponential backoff settings.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt` (1-based, attempt 1 has no delay).
    pub fn delay_for(&self, attempt: u32, err: &RemoteError) -> Duration {
        let shift = attempt.saturating_sub(2).min(16);
        let computed = self
            .base_delay
            .saturating_mul(1u32 << shift)
            .min(MAX_BACKOFF);
        match err {
            RemoteError::RateLimited {
                retry_after: Some(hint),
            } => computed.max((*hint).min(MAX_RETRY_AFTER)),
            _ => computed,
        }
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are exhausted.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<T, RemoteError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                attempt += 1;
                let delay = policy.delay_for(attempt, &err);
                tracing::warn!(
                    target: "sdm_versions::remote",
                    "{} failed ({}); retrying in {:.1}s (attempt {}/{})",
                    what,
                    err,
                    delay.as_secs_f64(),
                    attempt,
                    max_attempts
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
