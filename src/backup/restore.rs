//! Backup restoration
//!
//! Replaces the live database with the contents of a successful backup
//! artifact. A safety snapshot of the current state is always taken first,
//! and the backup bookkeeping tables are carried over so the ledger still
//! reflects every backup made before the restore.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};
use tracing::{error, info, warn};

use crate::config::paths::GastroPaths;
use crate::error::{GastroError, GastroResult};
use crate::models::{BackupRecord, Outcome, RecordId};
use crate::storage::database::{open_connection, Database};
use crate::storage::file_io::remove_file_if_exists;

use super::compression::gunzip_file;
use super::ledger::Ledger;
use super::lock::OperationLock;
use super::snapshot::{copy_into, BackupRequest, SnapshotEngine};

/// Phrase an operator must type to confirm a restore
pub const RESTORE_CONFIRMATION: &str = "RESTORE";

/// A restore request carrying the operator's confirmation
#[derive(Debug, Clone)]
pub struct RestoreRequest {
    pub record_id: RecordId,
    pub confirmation: String,
}

impl RestoreRequest {
    pub fn new(record_id: RecordId, confirmation: impl Into<String>) -> Self {
        Self {
            record_id,
            confirmation: confirmation.into(),
        }
    }

    /// Check the confirmation phrase
    pub fn verify(&self) -> GastroResult<()> {
        if self.confirmation.trim() == RESTORE_CONFIRMATION {
            Ok(())
        } else {
            Err(GastroError::Validation(format!(
                "Restore not confirmed. Type {} to confirm.",
                RESTORE_CONFIRMATION
            )))
        }
    }
}

/// Private decompression target, removed when dropped
struct TempArtifact {
    path: PathBuf,
}

impl TempArtifact {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if let Err(e) = remove_file_if_exists(&self.path) {
            warn!(file = %self.path.display(), error = %e, "could not remove restore temp file");
        }
    }
}

/// Restores the live database from backup artifacts
#[derive(Debug, Clone)]
pub struct RestoreEngine {
    paths: GastroPaths,
    database: Database,
    snapshots: SnapshotEngine,
}

impl RestoreEngine {
    pub fn new(paths: GastroPaths, database: Database) -> Self {
        let snapshots = SnapshotEngine::new(paths.clone(), database.clone());
        Self {
            paths,
            database,
            snapshots,
        }
    }

    /// Verify the confirmation, then restore
    ///
    /// A wrong confirmation is an error and nothing is touched.
    pub fn restore(&self, request: &RestoreRequest) -> GastroResult<Outcome> {
        request.verify()?;
        Ok(self.restore_backup(request.record_id))
    }

    /// Restore the live database from the artifact of `record_id`
    pub fn restore_backup(&self, record_id: RecordId) -> Outcome {
        let _lock = match OperationLock::acquire(&self.paths.lock_file()) {
            Ok(lock) => lock,
            Err(e) => return Outcome::failed(e.to_string()),
        };

        let record = match self.validate(record_id) {
            Ok(record) => record,
            Err(outcome) => return outcome,
        };

        info!(record = %record.id, file = %record.file_path.display(), "restoring backup");

        let safety = self
            .snapshots
            .perform_backup_locked(&BackupRequest::manual());
        if !safety.is_success() {
            let reason = safety.error_message.unwrap_or_default();
            error!(error = %reason, "safety backup failed, restore aborted");
            return Outcome::failed(format!(
                "Could not create safety backup before restore: {}",
                reason
            ));
        }

        match self.apply(&record) {
            Ok(()) => {
                info!(record = %record.id, safety = %safety.filename, "database restored");
                Outcome::ok(format!(
                    "Database restored from {}. A safety backup was created first ({}).",
                    record.filename, safety.filename
                ))
            }
            Err(e) => {
                error!(record = %record.id, error = %e, "restore failed");
                Outcome::failed(format!("Restore failed: {}", e))
            }
        }
    }

    fn validate(&self, record_id: RecordId) -> Result<BackupRecord, Outcome> {
        let ledger = Ledger::open(&self.database).map_err(|e| Outcome::failed(e.to_string()))?;
        let record = match ledger.get(record_id) {
            Ok(Some(record)) if record.is_success() => record,
            Ok(_) => return Err(Outcome::failed("Backup not found or not successful.")),
            Err(e) => return Err(Outcome::failed(e.to_string())),
        };
        if !record.file_exists() {
            return Err(Outcome::failed("The backup file no longer exists on disk."));
        }
        Ok(record)
    }

    /// Decompress, carry the ledger over, and copy pages into the live database
    fn apply(&self, record: &BackupRecord) -> GastroResult<()> {
        let temp = TempArtifact::new(self.temp_restore_path());

        if record.is_compressed() {
            gunzip_file(&record.file_path, temp.path())?;
        } else {
            std::fs::copy(&record.file_path, temp.path()).map_err(|e| {
                GastroError::Io(format!(
                    "Failed to copy {}: {}",
                    record.file_path.display(),
                    e
                ))
            })?;
        }

        let state = Ledger::open(&self.database)?.capture_state()?;

        let source = Connection::open_with_flags(
            temp.path(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| GastroError::Database(format!("Failed to open backup artifact: {}", e)))?;
        let mut live = open_connection(self.database.path())?;
        copy_into(&source, &mut live)?;
        drop(source);

        Ledger::from_connection(live)?.replace_state(&state)?;
        Ok(())
    }

    /// `<live db dir>/_temp_restore_<pid>.<ext>`
    fn temp_restore_path(&self) -> PathBuf {
        let dir = self
            .database
            .path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        dir.join(format!(
            "_temp_restore_{}.{}",
            std::process::id(),
            self.database.extension()
        ))
    }
}
