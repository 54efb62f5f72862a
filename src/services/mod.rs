//! Service layer for gastro-backup
//!
//! Sits between the CLI and the backup engines, applying configuration
//! changes to the OS scheduler and combining snapshot and retention runs.

pub mod backup;

pub use backup::{BackupRun, BackupService};
