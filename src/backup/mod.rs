//! Database backup system
//!
//! Creates full snapshots of the live SQLite database, restores them, and
//! enforces a retention policy. Every attempt is recorded in a ledger kept in
//! the live database itself.
//!
//! # Architecture
//!
//! - `SnapshotEngine`: online copy of the live database into an artifact
//! - `RestoreEngine`: safety snapshot, then pages copied back from an artifact
//! - `RetentionManager`: age-based and count-based eviction
//! - `Ledger`: configuration singleton plus one record per attempt
//!
//! # Artifact Format
//!
//! An artifact is a native SQLite file named
//! `backup_<YYYY-MM-DD_HHMMSS>.<ext>`, optionally gzip-compressed with a
//! trailing `.gz`.
//!
//! # Example
//!
//! ```rust,ignore
//! use gastro::backup::{BackupRequest, RetentionManager, SnapshotEngine};
//! use gastro::config::paths::GastroPaths;
//! use gastro::storage::Database;
//!
//! let paths = GastroPaths::new()?;
//! let database = Database::new(paths.database_file());
//!
//! let record = SnapshotEngine::new(paths.clone(), database.clone())
//!     .perform_backup(&BackupRequest::manual());
//! println!("{}", record);
//!
//! RetentionManager::new(database).cleanup_old_backups()?;
//! ```

mod compression;
mod ledger;
mod lock;
mod restore;
mod retention;
mod snapshot;

#[cfg(test)]
pub(crate) mod testing;

pub use compression::{gunzip_file, gzip_file};
pub use ledger::{Ledger, LedgerState, LedgerSummary, NewRecord};
pub use lock::OperationLock;
pub use restore::{RestoreEngine, RestoreRequest, RESTORE_CONFIRMATION};
pub use retention::{RetentionManager, RetentionReport};
pub use snapshot::{BackupRequest, SnapshotEngine};

pub(crate) use retention::evict;
