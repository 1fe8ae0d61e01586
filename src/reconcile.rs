//! Version history reconciliation.
//!
//! The [`Reconciler`] drives a [`HistorySource`], the version extractor and
//! a [`CatalogStore`] to keep the catalog in step with remote history. It
//! has two modes over the same core primitive:
//!
//! - **Backfill** walks the full commit history of each tracked model,
//!   oldest first, and records the first commit of every distinct version.
//! - **Incremental** inspects only a small window of the newest commits and
//!   appends versions published since the stored latest one.
//!
//! # Chronological dedup
//!
//! Within one model, commits are processed strictly in order. A version is
//! recorded at the commit where the version string changes; following
//! commits that repeat it are ignored. Commits whose content has no usable
//! version are skipped without resetting the current version. A version
//! that reappears after a different one is a new boundary, but the store's
//! `(subject, dataModel, version)` key still wins, so it is counted as a
//! duplicate rather than stored twice.
//!
//! # Failure isolation
//!
//! Models are processed independently on a bounded worker pool. Remote
//! failures end only the affected model's processing. A store failure marks
//! the run as aborted: no further writes are attempted by any worker, and
//! models not yet started are reported as not run.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::Config;
use crate::error::{RemoteError, SkipReason, StoreError};
use crate::extract::{extract_version, Extraction};
use crate::github::GithubClient;
use crate::models::{CommitDescriptor, RepoLayout, TrackedModel, VersionRecord};
use crate::remote::HistorySource;
use crate::sqlite_store::SqliteCatalog;
use crate::store::{CatalogStore, InsertOutcome};

/// Which reconciliation pass to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Backfill,
    Incremental,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Backfill => write!(f, "backfill"),
            Mode::Incremental => write!(f, "incremental"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReconcileOptions {
    /// Maximum number of models processed at once.
    pub concurrency: usize,
    /// Newest commits inspected per model in incremental mode.
    pub incremental_window: usize,
    /// Discover versions without writing them.
    pub dry_run: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            incremental_window: 10,
            dry_run: false,
        }
    }
}

/// Why a model's processing ended early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// The remote could not be reached or the path does not exist.
    Remote(String),
    /// The store failed; the whole run is aborted.
    Store(String),
    /// Another model's store failure aborted the run first.
    Aborted,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Remote(msg) => write!(f, "remote: {}", msg),
            Failure::Store(msg) => write!(f, "store: {}", msg),
            Failure::Aborted => write!(f, "not run (aborted)"),
        }
    }
}

/// Per-model result of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReport {
    pub model: TrackedModel,
    /// Versions inserted (or, in dry-run mode, that would be inserted),
    /// oldest first.
    pub inserted: Vec<String>,
    /// Commits skipped because they carried no usable version.
    pub skipped: usize,
    /// Versions found that the catalog already holds.
    pub duplicates: usize,
    pub failure: Option<Failure>,
}

impl ModelReport {
    fn new(model: TrackedModel) -> Self {
        Self {
            model,
            inserted: Vec::new(),
            skipped: 0,
            duplicates: 0,
            failure: None,
        }
    }

    fn aborted(model: TrackedModel) -> Self {
        let mut report = Self::new(model);
        report.failure = Some(Failure::Aborted);
        report
    }
}

/// Result of a run across all tracked models, in configuration order.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub mode: Mode,
    pub dry_run: bool,
    pub models: Vec<ModelReport>,
}

impl RunReport {
    pub fn total_inserted(&self) -> usize {
        self.models.iter().map(|m| m.inserted.len()).sum()
    }

    pub fn failed(&self) -> impl Iterator<Item = &ModelReport> {
        self.models.iter().filter(|m| m.failure.is_some())
    }

    /// The store failure that aborted the run, if any.
    pub fn store_failure(&self) -> Option<&str> {
        self.models.iter().find_map(|m| match &m.failure {
            Some(Failure::Store(msg)) => Some(msg.as_str()),
            _ => None,
        })
    }

    pub fn report(&self, model: &TrackedModel) -> Option<&ModelReport> {
        self.models.iter().find(|m| &m.model == model)
    }

    pub fn print_summary(&self) {
        let verb = if self.dry_run { "would add" } else { "added" };
        println!("{} summary:", self.mode);
        for m in &self.models {
            match &m.failure {
                None => println!(
                    "  {:<50} {} {} (skipped commits: {}, known: {})",
                    m.model.to_string(),
                    verb,
                    m.inserted.len(),
                    m.skipped,
                    m.duplicates
                ),
                Some(f) => println!(
                    "  {:<50} FAILED after {} {}: {}",
                    m.model.to_string(),
                    verb,
                    m.inserted.len(),
                    f
                ),
            }
        }
        println!(
            "  total {}: {}, failed models: {}",
            verb,
            self.total_inserted(),
            self.failed().count()
        );
    }
}

/// Errors that end one model's processing.
#[derive(Debug, Error)]
enum ModelError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("run aborted")]
    Aborted,
}

/// Reconciliation engine over a history source and a catalog store.
#[derive(Clone)]
pub struct Reconciler {
    history: Arc<dyn HistorySource>,
    store: Arc<dyn CatalogStore>,
    layout: RepoLayout,
    options: ReconcileOptions,
}

impl Reconciler {
    pub fn new(
        history: Arc<dyn HistorySource>,
        store: Arc<dyn CatalogStore>,
        layout: RepoLayout,
    ) -> Self {
        Self {
            history,
            store,
            layout,
            options: ReconcileOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    /// Full-history population for every model.
    pub async fn backfill(&self, models: &[TrackedModel]) -> RunReport {
        self.run(models, Mode::Backfill).await
    }

    /// Bounded check for newly published versions of every model.
    pub async fn incremental(&self, models: &[TrackedModel]) -> RunReport {
        self.run(models, Mode::Incremental).await
    }

    pub async fn run(&self, models: &[TrackedModel], mode: Mode) -> RunReport {
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let abort = Arc::new(AtomicBool::new(false));
        let mut joins = JoinSet::new();

        tracing::info!(%mode, models = models.len(), dry_run = self.options.dry_run, "run started");

        for (idx, model) in models.iter().cloned().enumerate() {
            let engine = self.clone();
            let semaphore = semaphore.clone();
            let abort = abort.clone();
            joins.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (idx, ModelReport::aborted(model)),
                };
                if abort.load(Ordering::SeqCst) {
                    return (idx, ModelReport::aborted(model));
                }
                let report = engine.reconcile_model(&model, mode, &abort).await;
                (idx, report)
            });
        }

        let mut slots: Vec<Option<ModelReport>> = vec![None; models.len()];
        while let Some(joined) = joins.join_next().await {
            match joined {
                Ok((idx, report)) => slots[idx] = Some(report),
                Err(e) => tracing::error!("reconciliation task failed: {}", e),
            }
        }

        let reports: Vec<ModelReport> = slots
            .into_iter()
            .zip(models.iter())
            .map(|(slot, model)| {
                slot.unwrap_or_else(|| {
                    let mut report = ModelReport::new(model.clone());
                    report.failure = Some(Failure::Remote("worker task panicked".to_string()));
                    report
                })
            })
            .collect();

        let report = RunReport {
            mode,
            dry_run: self.options.dry_run,
            models: reports,
        };
        tracing::info!(
            %mode,
            inserted = report.total_inserted(),
            failed = report.failed().count(),
            "run finished"
        );
        report
    }

    /// Processes one model; remote and store errors are folded into the
    /// report.
    async fn reconcile_model(
        &self,
        model: &TrackedModel,
        mode: Mode,
        abort: &AtomicBool,
    ) -> ModelReport {
        let mut report = ModelReport::new(model.clone());
        let result = match mode {
            Mode::Backfill => self.backfill_model(model, abort, &mut report).await,
            Mode::Incremental => self.incremental_model(model, abort, &mut report).await,
        };

        match result {
            Ok(()) => {
                tracing::info!(
                    model = %model,
                    inserted = report.inserted.len(),
                    skipped = report.skipped,
                    duplicates = report.duplicates,
                    "model reconciled"
                );
            }
            Err(ModelError::Remote(e)) => {
                tracing::warn!(model = %model, error = %e, "model skipped for this run");
                report.failure = Some(Failure::Remote(e.to_string()));
            }
            Err(ModelError::Store(e)) => {
                tracing::error!(model = %model, error = %e, "store failure, aborting run");
                abort.store(true, Ordering::SeqCst);
                report.failure = Some(Failure::Store(e.to_string()));
            }
            Err(ModelError::Aborted) => {
                report.failure = Some(Failure::Aborted);
            }
        }
        report
    }

    async fn backfill_model(
        &self,
        model: &TrackedModel,
        abort: &AtomicBool,
        report: &mut ModelReport,
    ) -> Result<(), ModelError> {
        let mut commits = self.history.list_commits(model, None).await?;
        // Oldest first, so each version is pinned to the commit that introduced it.
        commits.reverse();

        let mut previous = None;
        for commit in &commits {
            let extraction = self.extract_at(model, commit).await?;
            self.observe(model, commit, extraction, &mut previous, None, abort, report)
                .await?;
        }
        Ok(())
    }

    async fn incremental_model(
        &self,
        model: &TrackedModel,
        abort: &AtomicBool,
        report: &mut ModelReport,
    ) -> Result<(), ModelError> {
        let latest = self.store.latest_version(model).await?;
        let window = self
            .history
            .list_commits(model, Some(self.options.incremental_window.max(1)))
            .await?;

        let Some(newest) = window.first() else {
            return Ok(());
        };
        if self.store.commit_recorded(model, &newest.hash).await? {
            return Ok(());
        }
        let newest_extraction = self.extract_at(model, newest).await?;
        match newest_extraction.version() {
            None => {
                if let Extraction::Skipped { reason } = &newest_extraction {
                    self.note_skip(model, newest, reason, report);
                }
                return Ok(());
            }
            Some(v) if latest.as_deref() == Some(v) => {
                tracing::debug!(model = %model, version = %v, "already current");
                return Ok(());
            }
            Some(_) => {}
        }

        // Newest first until the commit carrying the stored latest version.
        let mut pending = vec![(newest.clone(), newest_extraction)];
        let mut reached_known = latest.is_none();
        if let Some(latest) = latest.as_deref() {
            for commit in &window[1..] {
                if self.store.commit_recorded(model, &commit.hash).await? {
                    reached_known = true;
                    break;
                }
                let extraction = self.extract_at(model, commit).await?;
                if extraction.version() == Some(latest) {
                    reached_known = true;
                    break;
                }
                pending.push((commit.clone(), extraction));
            }
        }
        if !reached_known {
            tracing::warn!(
                model = %model,
                window = window.len(),
                "stored latest version not found in the incremental window; run a backfill to fill older gaps"
            );
        }

        let mut previous = latest.clone();
        for (commit, extraction) in pending.into_iter().rev() {
            self.observe(
                model,
                &commit,
                extraction,
                &mut previous,
                latest.as_deref(),
                abort,
                report,
            )
            .await?;
        }
        Ok(())
    }

    /// Applies one commit, in chronological order, to the catalog.
    ///
    /// `previous` is the version seen at the last extractable commit; a
    /// commit repeating it is ignored. `announce_from` is the stored latest
    /// version that inserts are reported as updates from.
    #[allow(clippy::too_many_arguments)]
    async fn observe(
        &self,
        model: &TrackedModel,
        commit: &CommitDescriptor,
        extraction: Extraction,
        previous: &mut Option<String>,
        announce_from: Option<&str>,
        abort: &AtomicBool,
        report: &mut ModelReport,
    ) -> Result<(), ModelError> {
        let version = match extraction {
            Extraction::Parsed { version } => version,
            Extraction::Skipped { reason } => {
                self.note_skip(model, commit, &reason, report);
                return Ok(());
            }
        };

        if previous.as_deref() == Some(version.as_str()) {
            return Ok(());
        }
        *previous = Some(version.clone());

        if self.store.exists(model, &version).await? {
            report.duplicates += 1;
            return Ok(());
        }

        if self.options.dry_run {
            tracing::info!(model = %model, version = %version, commit = %commit.hash, "would insert");
            report.inserted.push(version);
            return Ok(());
        }

        if abort.load(Ordering::SeqCst) {
            return Err(ModelError::Aborted);
        }

        let record = VersionRecord {
            subject: model.subject.clone(),
            data_model: model.data_model.clone(),
            version: version.clone(),
            schema_url: self.layout.schema_url(model, &commit.hash),
            commit_date: commit.date.clone(),
            commit_hash: commit.hash.clone(),
        };

        match self.store.insert(&record).await? {
            InsertOutcome::Inserted => {
                match announce_from {
                    Some(old) => tracing::info!(
                        model = %model,
                        commit = %commit.hash,
                        "updated {} from version {} to {}",
                        model.data_model,
                        old,
                        version
                    ),
                    None => tracing::info!(
                        model = %model,
                        commit = %commit.hash,
                        date = %commit.date,
                        "inserted version {}",
                        version
                    ),
                }
                report.inserted.push(version);
            }
            InsertOutcome::AlreadyExists => report.duplicates += 1,
        }
        Ok(())
    }

    /// Fetches and parses the schema at `commit`. A file absent at that
    /// commit is a skip, not an error.
    async fn extract_at(
        &self,
        model: &TrackedModel,
        commit: &CommitDescriptor,
    ) -> Result<Extraction, RemoteError> {
        match self.history.fetch_content_at(model, &commit.hash).await {
            Ok(content) => Ok(extract_version(&content)),
            Err(RemoteError::NotFound(_)) => Ok(Extraction::Skipped {
                reason: SkipReason::FileAbsent,
            }),
            Err(e) => Err(e),
        }
    }

    fn note_skip(
        &self,
        model: &TrackedModel,
        commit: &CommitDescriptor,
        reason: &SkipReason,
        report: &mut ModelReport,
    ) {
        tracing::debug!(model = %model, commit = %commit.hash, %reason, "commit skipped");
        report.skipped += 1;
    }
}

/// Builds the production engine (GitHub + SQLite) from configuration.
pub async fn build_reconciler(config: &Config, dry_run: bool) -> Result<Reconciler> {
    let store = Arc::new(SqliteCatalog::open(&config.db).await?);
    let history = Arc::new(GithubClient::new(&config.github)?);

    Ok(
        Reconciler::new(history, store, config.github.layout()).with_options(ReconcileOptions {
            concurrency: config.sync.concurrency,
            incremental_window: config.sync.incremental_window,
            dry_run,
        }),
    )
}

/// Selects the configured models named in `only` (all when empty).
pub fn select_models(config: &Config, only: &[TrackedModel]) -> Result<Vec<TrackedModel>> {
    if only.is_empty() {
        return Ok(config.models.clone());
    }
    for wanted in only {
        if !config.models.contains(wanted) {
            anyhow::bail!("model {} is not configured", wanted);
        }
    }
    Ok(only.to_vec())
}

/// CLI entry point for `sdmv backfill`.
pub async fn run_backfill(config: &Config, only: &[TrackedModel], dry_run: bool) -> Result<()> {
    let models = select_models(config, only)?;
    let engine = build_reconciler(config, dry_run).await?;
    let report = engine.backfill(&models).await;
    finish(report)
}

/// CLI entry point for `sdmv update`.
pub async fn run_update(config: &Config) -> Result<()> {
    let engine = build_reconciler(config, false).await?;
    let report = engine.incremental(&config.models).await;
    finish(report)
}

fn finish(report: RunReport) -> Result<()> {
    report.print_summary();
    if let Some(msg) = report.store_failure() {
        anyhow::bail!("run aborted by store failure: {}", msg);
    }
    Ok(())
}
