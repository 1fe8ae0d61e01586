//! TOML configuration parsing and validation.
//!
//! The configuration names the tracked data models, the hosting API
//! settings, the catalog database and the query server bind address.
//! API credentials are never stored in the file; `[github].token_env`
//! names the environment variable that holds them.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::models::{RepoLayout, TrackedModel};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub models: Vec<TrackedModel>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GithubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_raw_url")]
    pub raw_url: String,
    #[serde(default = "default_org")]
    pub org: String,
    #[serde(default = "default_repo_prefix")]
    pub repo_prefix: String,
    #[serde(default = "default_schema_file")]
    pub schema_file: String,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            raw_url: default_raw_url(),
            org: default_org(),
            repo_prefix: default_repo_prefix(),
            schema_file: default_schema_file(),
            token_env: default_token_env(),
            per_page: default_per_page(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_raw_url() -> String {
    "https://raw.githubusercontent.com".to_string()
}
fn default_org() -> String {
    "smart-data-models".to_string()
}
fn default_repo_prefix() -> String {
    "dataModel.".to_string()
}
fn default_schema_file() -> String {
    "schema.json".to_string()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}
fn default_per_page() -> u32 {
    100
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_backoff_base_ms() -> u64 {
    1000
}

impl GithubConfig {
    /// Repository naming and raw-content URL layout derived from this config.
    pub fn layout(&self) -> RepoLayout {
        RepoLayout {
            raw_url: self.raw_url.trim_end_matches('/').to_string(),
            org: self.org.clone(),
            repo_prefix: self.repo_prefix.clone(),
            schema_file: self.schema_file.clone(),
        }
    }

    /// Reads the API token from the configured environment variable.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_incremental_window")]
    pub incremental_window: usize,
    /// Optional JSON file holding `[["Subject", "DataModel"], ...]` pairs.
    #[serde(default)]
    pub models_file: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            incremental_window: default_incremental_window(),
            models_file: None,
        }
    }
}

fn default_concurrency() -> usize {
    4
}
fn default_incremental_window() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config = parse_config(&content)?;

    if let Some(models_file) = config.sync.models_file.clone() {
        // Relative paths resolve against the config file's directory.
        let models_path = if models_file.is_relative() {
            path.parent()
                .unwrap_or_else(|| Path::new("."))
                .join(models_file)
        } else {
            models_file
        };
        let extra = load_models_file(&models_path)?;
        config.models.extend(extra);
    }

    validate(&config)?;
    Ok(config)
}

/// Parses configuration text without touching the filesystem.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

/// Loads a JSON list of `[subject, dataModel]` pairs.
pub fn load_models_file(path: &Path) -> Result<Vec<TrackedModel>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read models file: {}", path.display()))?;
    let pairs: Vec<(String, String)> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse models file: {}", path.display()))?;
    Ok(pairs
        .into_iter()
        .map(|(subject, data_model)| TrackedModel::new(subject, data_model))
        .collect())
}

pub fn validate(config: &Config) -> Result<()> {
    if !(1..=100).contains(&config.github.per_page) {
        bail!("github.per_page must be in [1, 100]");
    }
    if config.github.max_retries == 0 {
        bail!("github.max_retries must be >= 1");
    }
    if config.github.timeout_secs == 0 {
        bail!("github.timeout_secs must be > 0");
    }
    if config.sync.concurrency == 0 {
        bail!("sync.concurrency must be >= 1");
    }
    if config.sync.incremental_window == 0 {
        bail!("sync.incremental_window must be >= 1");
    }

    let mut seen = HashSet::new();
    for model in &config.models {
        if model.subject.trim().is_empty() || model.data_model.trim().is_empty() {
            bail!("models entries must have a non-empty subject and data_model");
        }
        if !seen.insert((model.subject.as_str(), model.data_model.as_str())) {
            bail!("duplicate model entry: {}", model);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[db]
path = "./data/versions.sqlite"

[[models]]
subject = "Weather"
data_model = "WeatherObserved"
"#;

    #[test]
    fn defaults_fill_missing_sections() {
        let cfg = parse_config(MINIMAL).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.github.api_url, "https://api.github.com");
        assert_eq!(cfg.github.org, "smart-data-models");
        assert_eq!(cfg.github.per_page, 100);
        assert_eq!(cfg.sync.concurrency, 4);
        assert_eq!(cfg.server.bind, "127.0.0.1:8000");
        assert_eq!(cfg.models.len(), 1);
        assert_eq!(cfg.models[0].data_model, "WeatherObserved");
    }

    #[test]
    fn rejects_duplicate_models() {
        let text = format!(
            "{}\n[[models]]\nsubject = \"Weather\"\ndata_model = \"WeatherObserved\"\n",
            MINIMAL
        );
        let cfg = parse_config(&text).unwrap();
        let err = validate(&cfg).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn rejects_out_of_range_page_size() {
        let text = format!("{}\n[github]\nper_page = 500\n", MINIMAL);
        let cfg = parse_config(&text).unwrap();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn models_file_pairs_are_appended() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("models.json"),
            r#"[["Energy", "EnergyCIM"], ["Transportation", "Vehicle"]]"#,
        )
        .unwrap();
        let cfg_path = tmp.path().join("sdmv.toml");
        std::fs::write(
            &cfg_path,
            format!("{}\n[sync]\nmodels_file = \"models.json\"\n", MINIMAL),
        )
        .unwrap();

        let cfg = load_config(&cfg_path).unwrap();
        assert_eq!(cfg.models.len(), 3);
        assert_eq!(cfg.models[2].subject, "Transportation");
    }
}
