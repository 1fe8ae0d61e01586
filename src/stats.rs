//! Catalog statistics.
//!
//! Summarizes what the catalog holds per tracked model: how many versions,
//! the latest one and when it was committed. Configured models with no
//! records are listed too, so a model that never yields a version (for
//! example because extraction always fails) stands out.

use anyhow::Result;

use crate::config::Config;
use crate::models::TrackedModel;
use crate::sqlite_store::SqliteCatalog;
use crate::store::{CatalogStore, ModelSummary};

/// Run the stats command: query the catalog and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let store = SqliteCatalog::open(&config.db).await?;
    let summary = store.summary().await?;
    let rows = merge_with_config(&config.models, summary);

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);
    let total: i64 = rows.iter().map(|r| r.version_count).sum();

    println!("SDM Versions — Catalog Stats");
    println!("============================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Models:      {}", rows.len());
    println!("  Versions:    {}", total);

    if !rows.is_empty() {
        println!();
        println!(
            "  {:<48} {:>8} {:>10}   {}",
            "MODEL", "VERSIONS", "LATEST", "COMMITTED"
        );
        println!("  {}", "-".repeat(86));
        for r in &rows {
            println!(
                "  {:<48} {:>8} {:>10}   {}",
                format!("{}/{}", r.subject, r.data_model),
                r.version_count,
                r.latest_version.as_deref().unwrap_or("-"),
                r.latest_commit_date.as_deref().unwrap_or("never")
            );
        }
    }
    println!();

    store.close().await;
    Ok(())
}

/// Adds an empty row for each configured model the catalog has no records for.
pub fn merge_with_config(models: &[TrackedModel], mut summary: Vec<ModelSummary>) -> Vec<ModelSummary> {
    for m in models {
        let known = summary
            .iter()
            .any(|s| s.subject == m.subject && s.data_model == m.data_model);
        if !known {
            summary.push(ModelSummary {
                subject: m.subject.clone(),
                data_model: m.data_model.clone(),
                version_count: 0,
                latest_version: None,
                latest_commit_date: None,
            });
        }
    }
    summary.sort_by(|a, b| (&a.subject, &a.data_model).cmp(&(&b.subject, &b.data_model)));
    summary
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
