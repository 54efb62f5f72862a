//! Backup policy model
//!
//! [`BackupConfiguration`] is a singleton: exactly one instance exists, stored
//! under a reserved identity and saved in place. There is no delete.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::paths::GastroPaths;
use crate::error::{GastroError, GastroResult};

/// How often the OS scheduler fires an unattended backup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    /// Once a day at the configured time
    #[default]
    Daily,
    /// Twice a day, twelve hours apart
    #[serde(rename = "every_12_hours")]
    Every12Hours,
    /// Four times a day, six hours apart
    #[serde(rename = "every_6_hours")]
    Every6Hours,
    /// Once a week on Sunday at the configured time
    Weekly,
}

impl Frequency {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Every12Hours => "every_12_hours",
            Self::Every6Hours => "every_6_hours",
            Self::Weekly => "weekly",
        }
    }

    /// Parse frequency from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "daily" => Some(Self::Daily),
            "every_12_hours" | "every_12h" | "12h" => Some(Self::Every12Hours),
            "every_6_hours" | "every_6h" | "6h" => Some(Self::Every6Hours),
            "weekly" => Some(Self::Weekly),
            _ => None,
        }
    }

    /// Hours between runs within a day, if the frequency repeats daily
    pub fn interval_hours(&self) -> Option<u32> {
        match self {
            Self::Every12Hours => Some(12),
            Self::Every6Hours => Some(6),
            Self::Daily | Self::Weekly => None,
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily => write!(f, "Daily"),
            Self::Every12Hours => write!(f, "Every 12 hours"),
            Self::Every6Hours => write!(f, "Every 6 hours"),
            Self::Weekly => write!(f, "Weekly"),
        }
    }
}

/// Outcome of the most recent snapshot attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    /// Parse the storage representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "Success"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Singleton backup policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupConfiguration {
    /// Whether the OS schedule should be installed
    pub enabled: bool,
    pub frequency: Frequency,
    /// Local time of day for the (first) scheduled run
    pub scheduled_time: NaiveTime,
    /// Override for the artifact directory
    pub backup_directory: Option<PathBuf>,
    pub retention_days: u32,
    pub max_backup_count: u32,
    pub compress: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_run_status: Option<RunStatus>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
}

/// Default time of day for scheduled backups
pub fn default_scheduled_time() -> NaiveTime {
    NaiveTime::from_hms_opt(3, 0, 0).unwrap_or(NaiveTime::MIN)
}

impl Default for BackupConfiguration {
    fn default() -> Self {
        Self {
            enabled: false,
            frequency: Frequency::default(),
            scheduled_time: default_scheduled_time(),
            backup_directory: None,
            retention_days: 30,
            max_backup_count: 50,
            compress: true,
            last_run_at: None,
            last_run_status: None,
            updated_at: None,
            updated_by: None,
        }
    }
}

impl BackupConfiguration {
    /// Resolve the effective artifact directory
    pub fn backup_dir(&self, paths: &GastroPaths) -> PathBuf {
        match &self.backup_directory {
            Some(dir) if !dir.as_os_str().is_empty() => dir.clone(),
            _ => paths.backup_dir(),
        }
    }

    /// Check that retention limits are positive
    pub fn validate(&self) -> GastroResult<()> {
        if self.retention_days == 0 {
            return Err(GastroError::Validation(
                "retention_days must be at least 1".into(),
            ));
        }
        if self.max_backup_count == 0 {
            return Err(GastroError::Validation(
                "max_backup_count must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Directory override as a borrowed path
    pub fn directory_override(&self) -> Option<&Path> {
        self.backup_directory.as_deref()
    }
}

impl fmt::Display for BackupConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Backup Config ({})", self.frequency)
    }
}
