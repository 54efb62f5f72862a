//! Custom error types for gastro-backup
//!
//! This module defines the error hierarchy for the backup subsystem using
//! thiserror for ergonomic error definitions.

use thiserror::Error;

/// The main error type for backup, restore, scheduling and export operations
#[derive(Error, Debug)]
pub enum GastroError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors (disk full, permission denied, missing file)
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// SQLite errors, including the online-backup API
    #[error("Database error: {0}")]
    Database(String),

    /// Rejected input: bad artifact reference, bad confirmation token,
    /// invalid configuration values
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// OS scheduler errors (tool missing, timeout, nonzero exit)
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// Export errors
    #[error("Export error: {0}")]
    Export(String),

    /// Storage errors
    #[error("Storage error: {0}")]
    Storage(String),
}

impl GastroError {
    /// Create a "not found" error for ledger records
    pub fn record_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Backup record",
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<std::io::Error> for GastroError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for GastroError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<rusqlite::Error> for GastroError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<csv::Error> for GastroError {
    fn from(err: csv::Error) -> Self {
        Self::Export(err.to_string())
    }
}

/// Result type alias for gastro-backup operations
pub type GastroResult<T> = Result<T, GastroError>;
