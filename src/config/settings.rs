//! Process-level settings for gastro-backup
//!
//! Backup policy itself lives in the database (see
//! [`BackupConfiguration`](crate::models::BackupConfiguration)); this file only
//! carries what the process needs before it can open that database.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::paths::GastroPaths;
use crate::error::GastroError;
use crate::storage::file_io::{read_json, write_json_atomic};

/// Settings stored in `config.json` under the data directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Live database location; defaults to `db.sqlite3` in the data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,

    /// `tracing` filter directive, overridden by `GASTRO_LOG`
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Upper bound for every OS scheduler invocation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduler_timeout_secs: Option<u64>,
}

fn default_schema_version() -> u32 {
    1
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            database_path: None,
            log_filter: default_log_filter(),
            scheduler_timeout_secs: None,
        }
    }
}

impl Settings {
    /// Load settings from disk, or fall back to defaults if the file doesn't exist
    pub fn load_or_create(paths: &GastroPaths) -> Result<Self, GastroError> {
        read_json(paths.settings_file())
            .map_err(|e| GastroError::Config(format!("Failed to load settings: {}", e)))
    }

    /// Save settings to disk
    pub fn save(&self, paths: &GastroPaths) -> Result<(), GastroError> {
        paths.ensure_directories()?;
        write_json_atomic(paths.settings_file(), self)
    }

    /// Resolve the live database path
    pub fn database_path(&self, paths: &GastroPaths) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| paths.database_file())
    }

    /// Timeout override for scheduler tools, if configured
    pub fn scheduler_timeout(&self) -> Option<Duration> {
        self.scheduler_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.schema_version, 1);
        assert_eq!(settings.log_filter, "info");
        assert!(settings.database_path.is_none());
        assert!(settings.scheduler_timeout().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let paths = GastroPaths::with_base_dir(temp_dir.path().to_path_buf());

        let mut settings = Settings::default();
        settings.database_path = Some(temp_dir.path().join("pos.sqlite3"));
        settings.scheduler_timeout_secs = Some(30);
        settings.save(&paths).unwrap();

        let loaded = Settings::load_or_create(&paths).unwrap();
        assert_eq!(
            loaded.database_path(&paths),
            temp_dir.path().join("pos.sqlite3")
        );
        assert_eq!(loaded.scheduler_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_database_path_defaults_to_data_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = GastroPaths::with_base_dir(temp_dir.path().to_path_buf());

        let settings = Settings::load_or_create(&paths).unwrap();
        assert_eq!(settings.database_path(&paths), paths.database_file());
    }
}
