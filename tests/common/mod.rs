#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use sdm_versions::error::RemoteError;
use sdm_versions::models::{CommitDescriptor, TrackedModel};
use sdm_versions::remote::HistorySource;

/// One scripted commit: hash, date, and file content (None = file absent).
#[derive(Clone)]
pub struct FakeCommit {
    pub hash: String,
    pub date: String,
    pub content: Option<Vec<u8>>,
}

pub fn schema(version: &str) -> Option<Vec<u8>> {
    Some(
        format!(
            r#"{{"$schema": "http://json-schema.org/schema#", "$schemaVersion": "{}", "title": "test"}}"#,
            version
        )
        .into_bytes(),
    )
}

pub fn schema_without_version() -> Option<Vec<u8>> {
    Some(br#"{"$schema": "http://json-schema.org/schema#", "title": "draft"}"#.to_vec())
}

/// Builds commits `C1..Cn` (oldest first) from a list of contents.
pub fn history(prefix: &str, contents: Vec<Option<Vec<u8>>>) -> Vec<FakeCommit> {
    contents
        .into_iter()
        .enumerate()
        .map(|(i, content)| FakeCommit {
            hash: format!("{}{}", prefix, i + 1),
            date: format!("2024-01-{:02}T00:00:00Z", i + 1),
            content,
        })
        .collect()
}

/// In-memory remote history, oldest commit first per model.
#[derive(Default)]
pub struct FakeHistory {
    commits: Mutex<HashMap<TrackedModel, Vec<FakeCommit>>>,
    failing: Mutex<Vec<TrackedModel>>,
    pub list_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
}

impl FakeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, model: &TrackedModel, commits: Vec<FakeCommit>) {
        self.commits.lock().unwrap().insert(model.clone(), commits);
    }

    /// Appends a newer commit to a model's history.
    pub fn push(&self, model: &TrackedModel, commit: FakeCommit) {
        self.commits
            .lock()
            .unwrap()
            .entry(model.clone())
            .or_default()
            .push(commit);
    }

    /// Makes every call for `model` fail as unavailable.
    pub fn fail(&self, model: &TrackedModel) {
        self.failing.lock().unwrap().push(model.clone());
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn reset_counters(&self) {
        self.list_calls.store(0, Ordering::SeqCst);
        self.fetch_calls.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl HistorySource for FakeHistory {
    async fn list_commits(
        &self,
        model: &TrackedModel,
        limit: Option<usize>,
    ) -> Result<Vec<CommitDescriptor>, RemoteError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(model) {
            return Err(RemoteError::unavailable("connection refused"));
        }
        let commits = self.commits.lock().unwrap();
        let Some(list) = commits.get(model) else {
            return Err(RemoteError::NotFound(model.to_string()));
        };
        let mut out: Vec<CommitDescriptor> = list
            .iter()
            .rev()
            .map(|c| CommitDescriptor {
                hash: c.hash.clone(),
                date: c.date.clone(),
            })
            .collect();
        if let Some(lim) = limit {
            out.truncate(lim);
        }
        Ok(out)
    }

    async fn fetch_content_at(
        &self,
        model: &TrackedModel,
        commit_hash: &str,
    ) -> Result<Vec<u8>, RemoteError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(model) {
            return Err(RemoteError::unavailable("connection refused"));
        }
        let commits = self.commits.lock().unwrap();
        commits
            .get(model)
            .and_then(|list| list.iter().find(|c| c.hash == commit_hash))
            .and_then(|c| c.content.clone())
            .ok_or_else(|| RemoteError::NotFound(commit_hash.to_string()))
    }
}
