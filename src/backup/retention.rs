//! Retention policy enforcement
//!
//! Evicts successful backups older than `retention_days`, then trims the
//! oldest survivors until at most `max_backup_count` remain. Failed records
//! are an audit trail and are never evicted here.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::error::GastroResult;
use crate::models::BackupRecord;
use crate::storage::database::Database;
use crate::storage::file_io::remove_file_if_exists;

use super::ledger::Ledger;

/// What a retention sweep removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionReport {
    pub deleted_count: usize,
    /// Sum of the recorded sizes of evicted artifacts
    pub freed_bytes: u64,
}

impl RetentionReport {
    fn add(&mut self, record: &BackupRecord) {
        self.deleted_count += 1;
        self.freed_bytes += record.file_size;
    }
}

/// Applies the configured retention policy to the ledger
#[derive(Debug, Clone)]
pub struct RetentionManager {
    database: Database,
}

impl RetentionManager {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Run both eviction passes against the current time
    pub fn cleanup_old_backups(&self) -> GastroResult<RetentionReport> {
        self.cleanup_at(Utc::now())
    }

    /// Run both eviction passes as if it were `now`
    pub fn cleanup_at(&self, now: DateTime<Utc>) -> GastroResult<RetentionReport> {
        let ledger = Ledger::open(&self.database)?;
        let config = ledger.load_configuration()?;
        let mut report = RetentionReport::default();

        let cutoff = now - Duration::days(i64::from(config.retention_days));
        for record in ledger.success_older_than(cutoff)? {
            evict(&ledger, &record)?;
            report.add(&record);
        }

        let remaining = ledger.count_success()?;
        let max = u64::from(config.max_backup_count);
        if remaining > max {
            let excess = (remaining - max) as usize;
            for record in ledger.oldest_success(excess)? {
                evict(&ledger, &record)?;
                report.add(&record);
            }
        }

        if report.deleted_count > 0 {
            info!(
                deleted = report.deleted_count,
                freed = report.freed_bytes,
                "retention sweep removed old backups"
            );
        } else {
            debug!("retention sweep found nothing to remove");
        }
        Ok(report)
    }
}

/// Remove the artifact if present, then the ledger entry
pub(crate) fn evict(ledger: &Ledger, record: &BackupRecord) -> GastroResult<()> {
    match remove_file_if_exists(&record.file_path) {
        Ok(true) => debug!(file = %record.file_path.display(), "removed backup artifact"),
        Ok(false) => debug!(file = %record.file_path.display(), "backup artifact already gone"),
        Err(e) => warn!(file = %record.file_path.display(), error = %e, "could not remove backup artifact"),
    }
    ledger.delete(record.id)?;
    Ok(())
}
