//! Core data models used throughout the version catalog.
//!
//! These types represent the tracked models read from configuration, the
//! commits discovered in remote history, and the version records that are
//! persisted in the catalog.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A (subject, data model) pair whose schema history is tracked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackedModel {
    pub subject: String,
    pub data_model: String,
}

impl TrackedModel {
    pub fn new(subject: impl Into<String>, data_model: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            data_model: data_model.into(),
        }
    }

    /// Parses the `Subject/DataModel` form used on the command line.
    pub fn parse(value: &str) -> Option<Self> {
        let (subject, data_model) = value.split_once('/')?;
        if subject.is_empty() || data_model.is_empty() {
            return None;
        }
        Some(Self::new(subject, data_model))
    }
}

impl fmt::Display for TrackedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.subject, self.data_model)
    }
}

/// One published schema version, the catalog's unit of storage.
///
/// `(subject, data_model, version)` is unique within the catalog.
/// Records are append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    pub subject: String,
    pub data_model: String,
    pub version: String,
    pub schema_url: String,
    /// ISO-8601 timestamp of the commit that produced this version.
    pub commit_date: String,
    pub commit_hash: String,
}

/// A commit touching a tracked schema file, as reported by the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitDescriptor {
    pub hash: String,
    /// ISO-8601 commit timestamp (UTC, `Z` suffix).
    pub date: String,
}

/// How repositories and raw schema artifacts are addressed for a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLayout {
    pub raw_url: String,
    pub org: String,
    pub repo_prefix: String,
    pub schema_file: String,
}

impl RepoLayout {
    pub fn repo_name(&self, subject: &str) -> String {
        format!("{}{}", self.repo_prefix, subject)
    }

    /// Path of the schema file inside the subject repository.
    pub fn schema_path(&self, data_model: &str) -> String {
        format!("{}/{}", data_model, self.schema_file)
    }

    /// Commit-pinned raw-content URL of a schema artifact.
    pub fn schema_url(&self, model: &TrackedModel, commit_hash: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.raw_url,
            self.org,
            self.repo_name(&model.subject),
            commit_hash,
            self.schema_path(&model.data_model)
        )
    }
}

impl Default for RepoLayout {
    fn default() -> Self {
        Self {
            raw_url: "https://raw.githubusercontent.com".to_string(),
            org: "smart-data-models".to_string(),
            repo_prefix: "dataModel.".to_string(),
            schema_file: "schema.json".to_string(),
        }
    }
}
