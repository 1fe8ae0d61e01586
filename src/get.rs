//! Catalog lookups from the command line.
//!
//! `sdmv versions <dataModel> [version]` prints the same data the query
//! service returns for `/datamodel/{name}/versions[/{version}]`.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::sqlite_store::SqliteCatalog;
use crate::store::CatalogStore;

pub async fn run_versions(config: &Config, name: &str, version: Option<&str>) -> Result<()> {
    let store = SqliteCatalog::open(&config.db).await?;

    match version {
        None => {
            let versions = store.versions_for_data_model(name).await?;
            store.close().await;
            if versions.is_empty() {
                bail!("data model not found: {}", name);
            }
            for v in versions {
                println!("{}", v);
            }
        }
        Some(v) => {
            let record = store.find_version(name, v).await?;
            store.close().await;
            let Some(record) = record else {
                bail!("data model version not found: {} {}", name, v);
            };
            println!("version:     {}", record.version);
            println!("schema_url:  {}", record.schema_url);
            println!("subject:     {}", record.subject);
            println!("commit:      {}", record.commit_hash);
            println!("commit_date: {}", record.commit_date);
        }
    }

    Ok(())
}
