//! Data models for the backup subsystem
//!
//! - [`BackupConfiguration`]: singleton backup policy
//! - [`BackupRecord`]: one ledger entry per snapshot attempt
//! - [`Outcome`]: structured `(success, message)` results
//! - [`Money`]: exported currency amounts

pub mod config;
pub mod money;
pub mod outcome;
pub mod record;

pub use config::{BackupConfiguration, Frequency, RunStatus};
pub use money::Money;
pub use outcome::Outcome;
pub use record::{format_size, BackupRecord, BackupStatus, BackupTrigger, RecordId};
