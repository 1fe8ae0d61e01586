use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::sqlite_store::SqliteCatalog;

/// `sdmv init`: opens (and so creates and migrates) the catalog database.
pub async fn run_migrations(config: &Config) -> Result<()> {
    SqliteCatalog::open(&config.db).await?.close().await;
    Ok(())
}

/// Creates the catalog schema on an open pool. Safe to run repeatedly.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS versions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            subject TEXT NOT NULL,
            data_model TEXT NOT NULL,
            version TEXT NOT NULL,
            schema_url TEXT NOT NULL,
            commit_date TEXT NOT NULL,
            commit_hash TEXT NOT NULL,
            inserted_at INTEGER NOT NULL,
            UNIQUE(subject, data_model, version)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_versions_commit ON versions(subject, data_model, commit_hash)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_versions_data_model ON versions(data_model)")
        .execute(pool)
        .await?;

    Ok(())
}
