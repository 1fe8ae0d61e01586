//! Catalog storage abstraction.
//!
//! The [`CatalogStore`] trait is the only gateway to persisted version
//! records. It carries no business logic: the reconciliation engine decides
//! what is written, the store only enforces the uniqueness key
//! `(subject, data_model, version)`.
//!
//! Implementations must be `Send + Sync`; every call is self-contained so
//! concurrent callers working on different models need no coordination.

pub mod memory;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{TrackedModel, VersionRecord};

/// Outcome of a successful insert call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

/// Abstract catalog backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`exists`](CatalogStore::exists) | Point lookup on the uniqueness key |
/// | [`insert`](CatalogStore::insert) | Append a record; no-op when the key exists |
/// | [`commit_recorded`](CatalogStore::commit_recorded) | Whether a commit already backs a record |
/// | [`list_versions`](CatalogStore::list_versions) | Versions of a model, newest first |
/// | [`latest_version`](CatalogStore::latest_version) | First of `list_versions` |
/// | [`versions_for_data_model`](CatalogStore::versions_for_data_model) | Query-side listing by data model name |
/// | [`find_version`](CatalogStore::find_version) | Query-side point lookup by name and version |
/// | [`summary`](CatalogStore::summary) | Per-model counts for `sdmv stats` |
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn exists(&self, model: &TrackedModel, version: &str) -> Result<bool, StoreError>;

    /// Appends a record. Returns `AlreadyExists` instead of overwriting when
    /// the uniqueness key is taken, even if two callers race.
    async fn insert(&self, record: &VersionRecord) -> Result<InsertOutcome, StoreError>;

    async fn commit_recorded(
        &self,
        model: &TrackedModel,
        commit_hash: &str,
    ) -> Result<bool, StoreError>;

    /// All stored versions of the model, newest commit first.
    async fn list_versions(&self, model: &TrackedModel) -> Result<Vec<String>, StoreError>;

    async fn latest_version(&self, model: &TrackedModel) -> Result<Option<String>, StoreError> {
        Ok(self.list_versions(model).await?.into_iter().next())
    }

    /// Versions stored under a data model name (any subject), newest first.
    async fn versions_for_data_model(&self, name: &str) -> Result<Vec<String>, StoreError>;

    async fn find_version(
        &self,
        name: &str,
        version: &str,
    ) -> Result<Option<VersionRecord>, StoreError>;

    async fn summary(&self) -> Result<Vec<ModelSummary>, StoreError>;
}

/// Per-model catalog summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSummary {
    pub subject: String,
    pub data_model: String,
    pub version_count: i64,
    pub latest_version: Option<String>,
    pub latest_commit_date: Option<String>,
}
