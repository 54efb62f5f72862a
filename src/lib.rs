//! gastro-backup - database backups for the GastroSaaS point-of-sale back office
//!
//! Takes consistent snapshots of the live SQLite database, restores them
//! behind a safety snapshot, applies the retention policy, installs the OS
//! trigger for unattended runs and exports the business tables as CSV.
//!
//! # Architecture
//!
//! - `config`: Paths and process settings
//! - `error`: Custom error types
//! - `logging`: `tracing` subscriber setup
//! - `models`: Backup configuration, ledger records and outcomes
//! - `storage`: SQLite handle and atomic file helpers
//! - `backup`: Ledger, snapshot, restore and retention engines
//! - `schedule`: cron and Task Scheduler adapters
//! - `services`: Operator-facing backup operations
//! - `export`: Multi-sheet business export
//! - `cli`, `display`: Command handlers and terminal formatting
//!
//! # Example
//!
//! ```rust,ignore
//! use gastro::backup::{BackupRequest, SnapshotEngine};
//! use gastro::config::{paths::GastroPaths, settings::Settings};
//! use gastro::storage::Database;
//!
//! let paths = GastroPaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! let engine = SnapshotEngine::new(paths.clone(), Database::new(settings.database_path(&paths)));
//! let record = engine.perform_backup(&BackupRequest::manual());
//! ```

pub mod backup;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod export;
pub mod logging;
pub mod models;
pub mod schedule;
pub mod services;
pub mod storage;

pub use error::{GastroError, GastroResult};
