//! Path management for gastro-backup
//!
//! Resolves the data directory holding the live database, the default backup
//! directory, the settings file and the operation lock.
//!
//! ## Path Resolution Order
//!
//! 1. `--data-dir` flag or `GASTRO_DATA_DIR` environment variable (if set)
//! 2. The platform data directory reported by `directories`
//!    (`~/.local/share/gastro` on Linux, `%APPDATA%\GastroSaaS\gastro\data` on Windows)

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::error::GastroError;

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "GASTRO_DATA_DIR";

/// Manages all paths used by gastro-backup
#[derive(Debug, Clone)]
pub struct GastroPaths {
    /// Base directory for the live database and backup bookkeeping
    base_dir: PathBuf,
}

impl GastroPaths {
    /// Create a new GastroPaths instance
    ///
    /// # Errors
    ///
    /// Returns an error if no platform data directory can be determined.
    pub fn new() -> Result<Self, GastroError> {
        let base_dir = if let Ok(custom) = std::env::var(DATA_DIR_ENV) {
            PathBuf::from(custom)
        } else {
            resolve_default_path()?
        };

        Ok(Self { base_dir })
    }

    /// Create GastroPaths with a custom base directory
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Default location of the live database
    pub fn database_file(&self) -> PathBuf {
        self.base_dir.join("db.sqlite3")
    }

    /// Default backup directory, used when the configuration has no override
    pub fn backup_dir(&self) -> PathBuf {
        self.base_dir.join("backups")
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Advisory lock serializing snapshot and restore runs
    pub fn lock_file(&self) -> PathBuf {
        self.base_dir.join("backup.lock")
    }

    /// Ensure the base and default backup directories exist
    pub fn ensure_directories(&self) -> Result<(), GastroError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| GastroError::Io(format!("Failed to create base directory: {}", e)))?;

        std::fs::create_dir_all(self.backup_dir())
            .map_err(|e| GastroError::Io(format!("Failed to create backup directory: {}", e)))?;

        Ok(())
    }
}

fn resolve_default_path() -> Result<PathBuf, GastroError> {
    ProjectDirs::from("com", "GastroSaaS", "gastro")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| GastroError::Config("Could not determine a data directory".into()))
}
