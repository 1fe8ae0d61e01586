//! In-memory [`CatalogStore`] implementation for tests and dry runs.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`, kept in insertion
//! order. Newest-first listings sort by commit date and fall back to
//! reverse insertion order, matching the SQLite store.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{TrackedModel, VersionRecord};

use super::{CatalogStore, InsertOutcome, ModelSummary};

/// In-memory catalog.
pub struct InMemoryCatalog {
    records: RwLock<Vec<VersionRecord>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    /// Snapshot of every record in insertion order.
    pub fn records(&self) -> Vec<VersionRecord> {
        self.read().clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<VersionRecord>> {
        self.records.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Matching records ordered newest first.
    fn newest_first<F>(&self, keep: F) -> Vec<VersionRecord>
    where
        F: Fn(&VersionRecord) -> bool,
    {
        let records = self.read();
        let mut matched: Vec<(usize, VersionRecord)> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| keep(r))
            .map(|(i, r)| (i, r.clone()))
            .collect();
        matched.sort_by(|(ia, a), (ib, b)| b.commit_date.cmp(&a.commit_date).then(ib.cmp(ia)));
        matched.into_iter().map(|(_, r)| r).collect()
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

fn same_model(record: &VersionRecord, model: &TrackedModel) -> bool {
    record.subject == model.subject && record.data_model == model.data_model
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn exists(&self, model: &TrackedModel, version: &str) -> Result<bool, StoreError> {
        Ok(self
            .read()
            .iter()
            .any(|r| same_model(r, model) && r.version == version))
    }

    async fn insert(&self, record: &VersionRecord) -> Result<InsertOutcome, StoreError> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let taken = records.iter().any(|r| {
            r.subject == record.subject
                && r.data_model == record.data_model
                && r.version == record.version
        });
        if taken {
            return Ok(InsertOutcome::AlreadyExists);
        }
        records.push(record.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn commit_recorded(
        &self,
        model: &TrackedModel,
        commit_hash: &str,
    ) -> Result<bool, StoreError> {
        Ok(self
            .read()
            .iter()
            .any(|r| same_model(r, model) && r.commit_hash == commit_hash))
    }

    async fn list_versions(&self, model: &TrackedModel) -> Result<Vec<String>, StoreError> {
        Ok(self
            .newest_first(|r| same_model(r, model))
            .into_iter()
            .map(|r| r.version)
            .collect())
    }

    async fn versions_for_data_model(&self, name: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .newest_first(|r| r.data_model == name)
            .into_iter()
            .map(|r| r.version)
            .collect())
    }

    async fn find_version(
        &self,
        name: &str,
        version: &str,
    ) -> Result<Option<VersionRecord>, StoreError> {
        Ok(self
            .newest_first(|r| r.data_model == name && r.version == version)
            .into_iter()
            .next())
    }

    async fn summary(&self) -> Result<Vec<ModelSummary>, StoreError> {
        let mut models: Vec<TrackedModel> = Vec::new();
        for r in self.read().iter() {
            let m = TrackedModel::new(r.subject.clone(), r.data_model.clone());
            if !models.contains(&m) {
                models.push(m);
            }
        }
        models.sort_by(|a, b| {
            (a.subject.as_str(), a.data_model.as_str())
                .cmp(&(b.subject.as_str(), b.data_model.as_str()))
        });

        Ok(models
            .into_iter()
            .map(|m| {
                let rows = self.newest_first(|r| same_model(r, &m));
                ModelSummary {
                    version_count: rows.len() as i64,
                    latest_version: rows.first().map(|r| r.version.clone()),
                    latest_commit_date: rows.first().map(|r| r.commit_date.clone()),
                    subject: m.subject,
                    data_model: m.data_model,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(version: &str, date: &str, hash: &str) -> VersionRecord {
        VersionRecord {
            subject: "Weather".into(),
            data_model: "WeatherObserved".into(),
            version: version.into(),
            schema_url: format!("https://example.test/{}", hash),
            commit_date: date.into(),
            commit_hash: hash.into(),
        }
    }

    fn model() -> TrackedModel {
        TrackedModel::new("Weather", "WeatherObserved")
    }

    #[tokio::test]
    async fn insert_is_idempotent_on_key() {
        let store = InMemoryCatalog::new();
        let r = record("0.0.1", "2023-01-01T00:00:00Z", "c1");
        assert_eq!(store.insert(&r).await.unwrap(), InsertOutcome::Inserted);
        let again = record("0.0.1", "2023-02-01T00:00:00Z", "c2");
        assert_eq!(
            store.insert(&again).await.unwrap(),
            InsertOutcome::AlreadyExists
        );
        assert_eq!(store.records().len(), 1);
        assert!(store.exists(&model(), "0.0.1").await.unwrap());
        assert!(store.commit_recorded(&model(), "c1").await.unwrap());
        assert!(!store.commit_recorded(&model(), "c2").await.unwrap());
    }

    #[tokio::test]
    async fn versions_are_listed_newest_first() {
        let store = InMemoryCatalog::new();
        store
            .insert(&record("0.0.2", "2023-02-01T00:00:00Z", "c2"))
            .await
            .unwrap();
        store
            .insert(&record("0.0.1", "2023-01-01T00:00:00Z", "c1"))
            .await
            .unwrap();
        store
            .insert(&record("0.0.3", "2023-03-01T00:00:00Z", "c3"))
            .await
            .unwrap();

        assert_eq!(
            store.list_versions(&model()).await.unwrap(),
            vec!["0.0.3", "0.0.2", "0.0.1"]
        );
        assert_eq!(
            store.latest_version(&model()).await.unwrap().as_deref(),
            Some("0.0.3")
        );
        assert_eq!(
            store
                .versions_for_data_model("WeatherObserved")
                .await
                .unwrap()
                .len(),
            3
        );
        assert!(store
            .find_version("WeatherObserved", "0.0.9")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn summary_counts_per_model() {
        let store = InMemoryCatalog::new();
        store
            .insert(&record("0.0.1", "2023-01-01T00:00:00Z", "c1"))
            .await
            .unwrap();
        store
            .insert(&record("0.0.2", "2023-02-01T00:00:00Z", "c2"))
            .await
            .unwrap();
        let summary = store.summary().await.unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].version_count, 2);
        assert_eq!(summary[0].latest_version.as_deref(), Some("0.0.2"));
    }
}
