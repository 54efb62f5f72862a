//! SQLite handle for the live database
//!
//! The backup bookkeeping tables live in the same database file as the
//! business data. They are created on open if missing.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;

use crate::error::{GastroError, GastroResult};

/// How long a connection waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Schema for the backup configuration singleton and the backup ledger
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS backup_configuration (
    id                INTEGER PRIMARY KEY CHECK (id = 1),
    enabled           INTEGER NOT NULL DEFAULT 0,
    frequency         TEXT    NOT NULL DEFAULT 'daily',
    scheduled_time    TEXT    NOT NULL DEFAULT '03:00:00',
    backup_directory  TEXT,
    retention_days    INTEGER NOT NULL DEFAULT 30 CHECK (retention_days > 0),
    max_backup_count  INTEGER NOT NULL DEFAULT 50 CHECK (max_backup_count > 0),
    compress          INTEGER NOT NULL DEFAULT 1,
    last_run_at       TEXT,
    last_run_status   TEXT,
    updated_at        TEXT,
    updated_by        TEXT
);

CREATE TABLE IF NOT EXISTS backup_records (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    filename          TEXT    NOT NULL,
    file_path         TEXT    NOT NULL,
    file_size         INTEGER NOT NULL DEFAULT 0,
    status            TEXT    NOT NULL DEFAULT 'in_progress',
    trigger_kind      TEXT    NOT NULL DEFAULT 'manual',
    error_message     TEXT,
    duration_seconds  REAL    NOT NULL DEFAULT 0,
    created_at        TEXT    NOT NULL,
    created_by        TEXT
);

CREATE INDEX IF NOT EXISTS idx_backup_records_status_created
    ON backup_records (status, created_at);
";

/// Location of the live database plus connection helpers
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    /// Point at a database file; nothing is opened yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the live database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Native file extension of the live database (e.g. `sqlite3`)
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .filter(|ext| !ext.is_empty())
            .unwrap_or_else(|| "sqlite3".to_string())
    }

    /// Open a connection and make sure the backup tables exist
    pub fn open(&self) -> GastroResult<Connection> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    GastroError::Io(format!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = open_connection(&self.path)?;
        ensure_schema(&conn)?;
        Ok(conn)
    }

    /// Open a raw connection without touching the schema
    pub fn open_raw(&self) -> GastroResult<Connection> {
        open_connection(&self.path)
    }
}

/// Open a connection with the crate's busy timeout applied
pub fn open_connection(path: &Path) -> GastroResult<Connection> {
    let conn = Connection::open(path).map_err(|e| {
        GastroError::Database(format!("Failed to open {}: {}", path.display(), e))
    })?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

/// Create the backup tables if they do not exist
pub fn ensure_schema(conn: &Connection) -> GastroResult<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Check whether a table exists in the connected database
pub fn table_exists(conn: &Connection, table: &str) -> GastroResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
