//! SQLite-backed [`CatalogStore`] implementation.
//!
//! Maps each store operation onto the `versions` table created by
//! [`migrate`](crate::migrate). Uniqueness is enforced by the table's
//! `UNIQUE(subject, data_model, version)` constraint, so racing inserts
//! resolve to a single row and the loser sees `AlreadyExists`.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::config::DbConfig;
use crate::error::StoreError;
use crate::models::{TrackedModel, VersionRecord};
use crate::store::{CatalogStore, InsertOutcome, ModelSummary};

/// SQLite implementation of the [`CatalogStore`] trait.
#[derive(Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens the catalog at `[db].path`, creating the file and its parent
    /// directory if needed, and applies migrations. The pool runs in WAL
    /// mode with a 5 s busy timeout.
    pub async fn open(db: &DbConfig) -> anyhow::Result<Self> {
        if let Some(parent) = db.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&db.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open catalog: {}", db.path.display()))?;

        crate::migrate::apply(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn row_to_record(row: &SqliteRow) -> VersionRecord {
    VersionRecord {
        subject: row.get("subject"),
        data_model: row.get("data_model"),
        version: row.get("version"),
        schema_url: row.get("schema_url"),
        commit_date: row.get("commit_date"),
        commit_hash: row.get("commit_hash"),
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalog {
    async fn exists(&self, model: &TrackedModel, version: &str) -> Result<bool, StoreError> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM versions WHERE subject = ? AND data_model = ? AND version = ? LIMIT 1",
        )
        .bind(&model.subject)
        .bind(&model.data_model)
        .bind(version)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    async fn insert(&self, record: &VersionRecord) -> Result<InsertOutcome, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO versions (subject, data_model, version, schema_url,
                                  commit_date, commit_hash, inserted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(subject, data_model, version) DO NOTHING
            "#,
        )
        .bind(&record.subject)
        .bind(&record.data_model)
        .bind(&record.version)
        .bind(&record.schema_url)
        .bind(&record.commit_date)
        .bind(&record.commit_hash)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::AlreadyExists)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    async fn commit_recorded(
        &self,
        model: &TrackedModel,
        commit_hash: &str,
    ) -> Result<bool, StoreError> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM versions WHERE subject = ? AND data_model = ? AND commit_hash = ? LIMIT 1",
        )
        .bind(&model.subject)
        .bind(&model.data_model)
        .bind(commit_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    async fn list_versions(&self, model: &TrackedModel) -> Result<Vec<String>, StoreError> {
        let versions: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT version FROM versions
            WHERE subject = ? AND data_model = ?
            ORDER BY commit_date DESC, id DESC
            "#,
        )
        .bind(&model.subject)
        .bind(&model.data_model)
        .fetch_all(&self.pool)
        .await?;
        Ok(versions)
    }

    async fn latest_version(&self, model: &TrackedModel) -> Result<Option<String>, StoreError> {
        let latest: Option<String> = sqlx::query_scalar(
            r#"
            SELECT version FROM versions
            WHERE subject = ? AND data_model = ?
            ORDER BY commit_date DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(&model.subject)
        .bind(&model.data_model)
        .fetch_optional(&self.pool)
        .await?;
        Ok(latest)
    }

    async fn versions_for_data_model(&self, name: &str) -> Result<Vec<String>, StoreError> {
        let versions: Vec<String> = sqlx::query_scalar(
            "SELECT version FROM versions WHERE data_model = ? ORDER BY commit_date DESC, id DESC",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;
        Ok(versions)
    }

    async fn find_version(
        &self,
        name: &str,
        version: &str,
    ) -> Result<Option<VersionRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT subject, data_model, version, schema_url, commit_date, commit_hash
            FROM versions
            WHERE data_model = ? AND version = ?
            ORDER BY commit_date DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(name)
        .bind(version)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_record))
    }

    async fn summary(&self) -> Result<Vec<ModelSummary>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                v.subject,
                v.data_model,
                COUNT(*) AS version_count,
                (SELECT l.version FROM versions l
                 WHERE l.subject = v.subject AND l.data_model = v.data_model
                 ORDER BY l.commit_date DESC, l.id DESC LIMIT 1) AS latest_version,
                MAX(v.commit_date) AS latest_commit_date
            FROM versions v
            GROUP BY v.subject, v.data_model
            ORDER BY v.subject, v.data_model
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| ModelSummary {
                subject: row.get("subject"),
                data_model: row.get("data_model"),
                version_count: row.get("version_count"),
                latest_version: row.get("latest_version"),
                latest_commit_date: row.get("latest_commit_date"),
            })
            .collect())
    }
}
