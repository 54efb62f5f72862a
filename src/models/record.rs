//! Backup ledger entry model
//!
//! One [`BackupRecord`] exists per snapshot attempt. It is opened as
//! `in_progress` before any file work and finalized exactly once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Ledger row identifier (SQLite rowid)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(i64);

impl RecordId {
    /// Wrap a raw rowid
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw rowid
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().trim_start_matches('#').parse().map(Self)
    }
}

/// Lifecycle state of a snapshot attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackupStatus {
    /// Attempt started, not yet finalized
    #[default]
    InProgress,
    /// Artifact written and finalized
    Success,
    /// Attempt failed; see the record's error message
    Failed,
}

impl BackupStatus {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    /// Parse the storage representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(Self::InProgress),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// True once the record has left `in_progress`
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => write!(f, "In progress"),
            Self::Success => write!(f, "Success"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Origin of a backup invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackupTrigger {
    /// Operator-initiated (CLI, admin UI, safety snapshot)
    #[default]
    Manual,
    /// Fired by the OS scheduler
    Scheduled,
}

impl BackupTrigger {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
        }
    }

    /// Parse the storage representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(Self::Manual),
            "scheduled" => Some(Self::Scheduled),
            _ => None,
        }
    }
}

impl fmt::Display for BackupTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => write!(f, "Manual"),
            Self::Scheduled => write!(f, "Scheduled"),
        }
    }
}

/// A ledger entry describing one backup attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRecord {
    pub id: RecordId,
    pub filename: String,
    /// Absolute path of the artifact
    pub file_path: PathBuf,
    /// Size in bytes; 0 until success
    pub file_size: u64,
    pub status: BackupStatus,
    pub trigger: BackupTrigger,
    /// Present only when `status` is `Failed`
    pub error_message: Option<String>,
    pub duration_seconds: f64,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
}

impl BackupRecord {
    /// Whether the attempt produced a usable artifact
    pub fn is_success(&self) -> bool {
        self.status == BackupStatus::Success
    }

    /// Whether the artifact is gzip-compressed
    pub fn is_compressed(&self) -> bool {
        self.filename.ends_with(".gz")
    }

    /// Whether the artifact is still present on disk
    pub fn file_exists(&self) -> bool {
        self.file_path.exists()
    }

    /// Artifact path as a borrowed `Path`
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Human-readable artifact size
    pub fn file_size_display(&self) -> String {
        format_size(self.file_size)
    }
}

impl fmt::Display for BackupRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.filename, self.status)
    }
}

/// Format a byte count with one decimal, scaling through B/KB/MB/GB/TB
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} TB", size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(filename: &str) -> BackupRecord {
        BackupRecord {
            id: RecordId::new(1),
            filename: filename.to_string(),
            file_path: PathBuf::from("/nonexistent").join(filename),
            file_size: 2048,
            status: BackupStatus::Success,
            trigger: BackupTrigger::Manual,
            error_message: None,
            duration_seconds: 0.25,
            created_at: Utc::now(),
            created_by: None,
        }
    }

    #[test]
    fn test_status_round_trip_strings() {
        for status in [
            BackupStatus::InProgress,
            BackupStatus::Success,
            BackupStatus::Failed,
        ] {
            assert_eq!(BackupStatus::parse(status.as_str()), Some(status));
        }
        assert!(BackupStatus::parse("unknown").is_none());
        assert!(!BackupStatus::InProgress.is_final());
        assert!(BackupStatus::Failed.is_final());
    }

    #[test]
    fn test_trigger_parse() {
        assert_eq!(BackupTrigger::parse("scheduled"), Some(BackupTrigger::Scheduled));
        assert_eq!(BackupTrigger::parse("manual"), Some(BackupTrigger::Manual));
        assert!(BackupTrigger::parse("cron").is_none());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0.0 B");
        assert_eq!(format_size(1023), "1023.0 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024 * 1024), "3.0 TB");
    }

    #[test]
    fn test_record_helpers() {
        let record = sample_record("backup_2026-01-01_030000.sqlite3.gz");
        assert!(record.is_compressed());
        assert!(record.is_success());
        assert!(!record.file_exists());
        assert_eq!(record.file_size_display(), "2.0 KB");

        let plain = sample_record("backup_2026-01-01_030000.sqlite3");
        assert!(!plain.is_compressed());
    }

    #[test]
    fn test_record_id_parse() {
        assert_eq!("42".parse::<RecordId>().unwrap(), RecordId::new(42));
        assert_eq!("#7".parse::<RecordId>().unwrap(), RecordId::new(7));
        assert!("abc".parse::<RecordId>().is_err());
    }
}
