//! GitHub history client.
//!
//! Implements [`HistorySource`] on top of the GitHub REST API (commit
//! listing) and the raw-content host (file content at a commit).
//!
//! # Endpoints
//!
//! | Call | Request |
//! |------|---------|
//! | list commits | `GET {api_url}/repos/{org}/{repo}/commits?path={model}/{file}&per_page=N&page=P` |
//! | fetch content | `GET {raw_url}/{org}/{repo}/{sha}/{model}/{file}` |
//!
//! # Status mapping
//!
//! | Response | Error |
//! |----------|-------|
//! | 404 | `NotFound` |
//! | 429, or 403 with an exhausted quota | `RateLimited` (hint from `Retry-After` or `X-RateLimit-Reset`) |
//! | 5xx, connect error, timeout | `Unavailable` (retried) |
//! | other 4xx | `Unavailable` (not retried) |
//!
//! Every request goes through [`retry_with_backoff`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Response, StatusCode};
use serde::Deserialize;

use crate::config::GithubConfig;
use crate::error::RemoteError;
use crate::models::{CommitDescriptor, RepoLayout, TrackedModel};
use crate::remote::{retry_with_backoff, HistorySource, RetryPolicy};

/// GitHub-backed [`HistorySource`].
pub struct GithubClient {
    client: reqwest::Client,
    api_url: String,
    layout: RepoLayout,
    token: Option<String>,
    per_page: u32,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct CommitItem {
    sha: String,
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    committer: Option<CommitPerson>,
    author: Option<CommitPerson>,
}

#[derive(Debug, Deserialize)]
struct CommitPerson {
    date: Option<String>,
}

impl GithubClient {
    /// Builds a client from configuration, reading the token from the
    /// environment variable named in `token_env`.
    pub fn new(config: &GithubConfig) -> anyhow::Result<Self> {
        let token = config.token();
        if token.is_none() {
            tracing::warn!(
                "{} not set; using unauthenticated GitHub requests (low rate limit)",
                config.token_env
            );
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            layout: config.layout(),
            token,
            per_page: config.per_page,
            retry: RetryPolicy {
                max_attempts: config.max_retries,
                base_delay: Duration::from_millis(config.backoff_base_ms),
            },
        })
    }

    fn commits_url(&self, model: &TrackedModel) -> String {
        format!(
            "{}/repos/{}/{}/commits",
            self.api_url,
            self.layout.org,
            self.layout.repo_name(&model.subject)
        )
    }

    async fn fetch_commit_page(
        &self,
        model: &TrackedModel,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<CommitItem>, RemoteError> {
        let url = self.commits_url(model);
        let path = self.layout.schema_path(&model.data_model);
        let per_page = per_page.to_string();
        let page_str = page.to_string();

        let mut req = self
            .client
            .get(&url)
            .query(&[
                ("path", path.as_str()),
                ("per_page", per_page.as_str()),
                ("page", page_str.as_str()),
            ])
            .header(ACCEPT, "application/vnd.github.v3+json")
            .header(USER_AGENT, concat!("sdmv/", env!("CARGO_PKG_VERSION")));
        if let Some(ref token) = self.token {
            req = req.header(AUTHORIZATION, format!("token {}", token));
        }

        let resp = req.send().await.map_err(map_transport_error)?;
        let resp = check_status(resp, &format!("{} commits page {}", model, page)).await?;
        warn_on_low_quota(resp.headers());

        resp.json::<Vec<CommitItem>>()
            .await
            .map_err(|e| RemoteError::unavailable(format!("invalid commit listing: {}", e)))
    }
}

#[async_trait]
impl HistorySource for GithubClient {
    async fn list_commits(
        &self,
        model: &TrackedModel,
        limit: Option<usize>,
    ) -> Result<Vec<CommitDescriptor>, RemoteError> {
        let mut commits = Vec::new();
        let mut page = 1u32;
        // Page offsets are `(page - 1) * per_page`, so the size stays fixed
        // for the whole listing.
        let per_page = match limit {
            Some(lim) => lim.clamp(1, self.per_page as usize) as u32,
            None => self.per_page,
        };

        loop {
            let what = format!("list commits {} (page {})", model, page);
            let items = retry_with_backoff(self.retry, &what, || {
                self.fetch_commit_page(model, page, per_page)
            })
            .await?;

            let short_page = (items.len() as u32) < per_page;
            for item in items {
                commits.push(to_descriptor(item)?);
            }

            if limit.is_some_and(|lim| commits.len() >= lim) || short_page {
                break;
            }
            page += 1;
        }

        if let Some(lim) = limit {
            commits.truncate(lim);
        }

        if commits.is_empty() {
            return Err(RemoteError::NotFound(format!(
                "no history for {} in {}",
                self.layout.schema_path(&model.data_model),
                self.layout.repo_name(&model.subject)
            )));
        }

        tracing::debug!(model = %model, commits = commits.len(), "listed commit history");
        Ok(commits)
    }

    async fn fetch_content_at(
        &self,
        model: &TrackedModel,
        commit_hash: &str,
    ) -> Result<Vec<u8>, RemoteError> {
        let url = self.layout.schema_url(model, commit_hash);
        let what = format!("fetch {} at {}", model, commit_hash);

        retry_with_backoff(self.retry, &what, || async {
            let resp = self
                .client
                .get(&url)
                .header(USER_AGENT, concat!("sdmv/", env!("CARGO_PKG_VERSION")))
                .send()
                .await
                .map_err(map_transport_error)?;
            let resp = check_status(resp, &url).await?;
            let bytes = resp.bytes().await.map_err(map_transport_error)?;
            Ok(bytes.to_vec())
        })
        .await
    }
}

fn to_descriptor(item: CommitItem) -> Result<CommitDescriptor, RemoteError> {
    let raw_date = item
        .commit
        .committer
        .and_then(|c| c.date)
        .or_else(|| item.commit.author.and_then(|a| a.date))
        .ok_or_else(|| RemoteError::unavailable(format!("commit {} has no date", item.sha)))?;

    Ok(CommitDescriptor {
        hash: item.sha,
        date: normalize_date(&raw_date),
    })
}

/// Normalizes an RFC 3339 timestamp to UTC with a `Z` suffix so stored
/// dates sort chronologically as text. Unparseable input is kept verbatim.
pub fn normalize_date(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| {
            dt.with_timezone(&Utc)
                .format("%Y-%m-%dT%H:%M:%SZ")
                .to_string()
        })
        .unwrap_or_else(|_| raw.to_string())
}

fn map_transport_error(e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::unavailable(format!("request timed out: {}", e))
    } else {
        RemoteError::unavailable(e.to_string())
    }
}

async fn check_status(resp: Response, what: &str) -> Result<Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let headers = resp.headers().clone();
    let body = resp.text().await.unwrap_or_default();
    Err(classify_status(status, &headers, &body, what))
}

/// Maps a non-success response onto the remote error taxonomy.
pub fn classify_status(
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
    what: &str,
) -> RemoteError {
    if status == StatusCode::NOT_FOUND {
        return RemoteError::NotFound(what.to_string());
    }

    let quota_exhausted = header_u64(headers, "x-ratelimit-remaining") == Some(0)
        || body.to_lowercase().contains("rate limit");
    if status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && quota_exhausted)
    {
        return RemoteError::RateLimited {
            retry_after: retry_after_hint(headers, Utc::now().timestamp()),
        };
    }

    let snippet: String = body.chars().take(200).collect();
    RemoteError::Unavailable {
        message: format!("{} returned HTTP {}: {}", what, status, snippet),
        retryable: status.is_server_error(),
    }
}

/// Wait hint from `Retry-After` (seconds) or `X-RateLimit-Reset` (epoch).
pub fn retry_after_hint(headers: &HeaderMap, now_epoch: i64) -> Option<Duration> {
    if let Some(secs) = header_u64(headers, "retry-after") {
        return Some(Duration::from_secs(secs));
    }
    let reset = header_u64(headers, "x-ratelimit-reset")? as i64;
    let wait = (reset - now_epoch).max(0) as u64 + 1;
    Some(Duration::from_secs(wait))
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn warn_on_low_quota(headers: &HeaderMap) {
    if let Some(remaining) = header_u64(headers, "x-ratelimit-remaining") {
        if remaining <= 1 {
            tracing::warn!(
                remaining,
                reset = header_u64(headers, "x-ratelimit-reset"),
                "GitHub rate limit nearly exhausted"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn not_found_maps_to_not_found() {
        let err = classify_status(StatusCode::NOT_FOUND, &HeaderMap::new(), "", "x");
        assert!(matches!(err, RemoteError::NotFound(_)));
    }

    #[test]
    fn exhausted_quota_maps_to_rate_limited() {
        let h = headers(&[("x-ratelimit-remaining", "0"), ("retry-after", "42")]);
        let err = classify_status(StatusCode::FORBIDDEN, &h, "", "x");
        match err {
            RemoteError::RateLimited { retry_after } => {
                assert_eq!(retry_after, Some(Duration::from_secs(42)))
            }
            other => panic!("unexpected: {:?}", other),
        }

        let err = classify_status(
            StatusCode::FORBIDDEN,
            &HeaderMap::new(),
            "API rate limit exceeded for 1.2.3.4",
            "x",
        );
        assert!(matches!(err, RemoteError::RateLimited { .. }));
    }

    #[test]
    fn plain_forbidden_is_not_retryable() {
        let err = classify_status(StatusCode::FORBIDDEN, &HeaderMap::new(), "nope", "x");
        assert!(!err.is_retryable());
    }

    #[test]
    fn server_errors_are_retryable() {
        let err = classify_status(StatusCode::BAD_GATEWAY, &HeaderMap::new(), "", "x");
        assert!(err.is_retryable());
    }

    #[test]
    fn reset_header_gives_wait_from_now() {
        let h = headers(&[("x-ratelimit-reset", "1000")]);
        assert_eq!(retry_after_hint(&h, 990), Some(Duration::from_secs(11)));
        assert_eq!(retry_after_hint(&h, 2000), Some(Duration::from_secs(1)));
        assert_eq!(retry_after_hint(&HeaderMap::new(), 0), None);
    }

    #[test]
    fn dates_are_normalized_to_utc() {
        assert_eq!(
            normalize_date("2024-05-01T12:00:00+02:00"),
            "2024-05-01T10:00:00Z"
        );
        assert_eq!(normalize_date("2024-05-01T10:00:00Z"), "2024-05-01T10:00:00Z");
        assert_eq!(normalize_date("yesterday"), "yesterday");
    }

    #[test]
    fn commit_item_prefers_committer_date() {
        let json = r#"{"sha": "abc", "commit": {"committer": {"date": "2024-01-02T03:04:05Z"}, "author": {"date": "2023-01-01T00:00:00Z"}}}"#;
        let item: CommitItem = serde_json::from_str(json).unwrap();
        let d = to_descriptor(item).unwrap();
        assert_eq!(d.hash, "abc");
        assert_eq!(d.date, "2024-01-02T03:04:05Z");
    }
}
