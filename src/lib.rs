//! # SDM Versions
//!
//! A catalog of published schema versions for Smart Data Models.
//!
//! For every tracked (subject, data model) pair the catalog records each
//! published `$schemaVersion`, the commit that introduced it, the commit
//! date, and a commit-pinned link to the schema artifact.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ GitHub API   │──▶│ Reconciler   │──▶│  SQLite      │
//! │ commits+raw  │   │ backfill/upd │   │  versions    │
//! └──────────────┘   └──────┬───────┘   └──────┬───────┘
//!                           │                  │
//!                    ┌──────▼─────┐      ┌─────▼──────┐
//!                    │ extractor  │      │ query HTTP │
//!                    └────────────┘      └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! sdmv init                  # create database
//! sdmv backfill              # populate from full commit history
//! sdmv update                # periodic incremental check
//! sdmv serve                 # start the query service
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Remote and store error taxonomy |
//! | [`extract`] | Schema version extraction |
//! | [`remote`] | History source trait and retry policy |
//! | [`github`] | GitHub history client |
//! | [`store`] | Catalog store trait and in-memory store |
//! | [`sqlite_store`] | SQLite catalog store |
//! | [`reconcile`] | Backfill and incremental reconciliation |
//! | [`server`] | Read-only query HTTP service |
//! | [`stats`] | Catalog statistics |
//! | [`get`] | Command-line lookups |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod error;
pub mod extract;
pub mod get;
pub mod github;
pub mod migrate;
pub mod models;
pub mod reconcile;
pub mod remote;
pub mod server;
pub mod sqlite_store;
pub mod stats;
pub mod store;
