//! Backup service
//!
//! Ties the backup configuration to the OS scheduler and exposes the
//! operator-facing backup operations on top of the engines.

use chrono::Utc;
use tracing::{info, warn};

use crate::backup::{
    evict, BackupRequest, Ledger, LedgerSummary, RetentionManager, RetentionReport,
    SnapshotEngine,
};
use crate::config::paths::GastroPaths;
use crate::error::{GastroError, GastroResult};
use crate::models::{BackupConfiguration, BackupRecord, Outcome, RecordId};
use crate::schedule::{Scheduler, SchedulerStatus};
use crate::storage::Database;

/// Result of a create-backup invocation
#[derive(Debug, Clone)]
pub struct BackupRun {
    pub record: BackupRecord,
    /// Present when a retention sweep ran and completed
    pub retention: Option<RetentionReport>,
}

/// Service for backup configuration and lifecycle
pub struct BackupService<'a> {
    paths: &'a GastroPaths,
    database: &'a Database,
    scheduler: &'a dyn Scheduler,
}

impl<'a> BackupService<'a> {
    /// Create a new backup service
    pub fn new(paths: &'a GastroPaths, database: &'a Database, scheduler: &'a dyn Scheduler) -> Self {
        Self {
            paths,
            database,
            scheduler,
        }
    }

    fn ledger(&self) -> GastroResult<Ledger> {
        Ledger::open(self.database)
    }

    /// Current backup configuration
    pub fn configuration(&self) -> GastroResult<BackupConfiguration> {
        self.ledger()?.load_configuration()
    }

    /// Save the configuration in place and bring the OS schedule in line
    ///
    /// Invalid configurations are rejected before anything is written. A
    /// scheduler failure does not undo the save; it is reported in the outcome.
    pub fn save_configuration(
        &self,
        config: &BackupConfiguration,
        actor: Option<&str>,
    ) -> GastroResult<Outcome> {
        config.validate()?;

        let ledger = self.ledger()?;
        let current = ledger.load_configuration()?;
        let updated = BackupConfiguration {
            last_run_at: current.last_run_at,
            last_run_status: current.last_run_status,
            updated_at: Some(Utc::now()),
            updated_by: actor.map(str::to_string),
            ..config.clone()
        };
        ledger.save_configuration(&updated)?;
        info!(enabled = updated.enabled, frequency = %updated.frequency, "backup configuration saved");

        if updated.enabled {
            let outcome = self
                .scheduler
                .setup_schedule(updated.frequency, updated.scheduled_time);
            if outcome.success {
                Ok(Outcome::ok(
                    "Configuration saved and scheduled backups enabled.",
                ))
            } else {
                Ok(Outcome::failed(format!(
                    "Configuration saved, but the schedule could not be installed: {}",
                    outcome.message
                )))
            }
        } else {
            self.scheduler.remove_schedule();
            Ok(Outcome::ok(
                "Configuration saved. Scheduled backups disabled.",
            ))
        }
    }

    /// Install the trigger from the saved configuration
    pub fn install_schedule(&self) -> GastroResult<Outcome> {
        let config = self.configuration()?;
        if !config.enabled {
            return Ok(Outcome::failed(
                "Scheduled backups are disabled. Enable them with `gastro backup config --enable`.",
            ));
        }
        Ok(self
            .scheduler
            .setup_schedule(config.frequency, config.scheduled_time))
    }

    /// Remove the trigger regardless of configuration
    pub fn remove_schedule(&self) {
        self.scheduler.remove_schedule();
    }

    /// Scheduler status as reported by the OS
    pub fn schedule_status(&self) -> SchedulerStatus {
        self.scheduler.status()
    }

    /// Correct drift between the configuration and the OS scheduler
    pub fn reconcile_schedule(&self) -> GastroResult<SchedulerStatus> {
        let config = self.configuration()?;
        let status = self.scheduler.status();

        if config.enabled && !status.is_scheduled {
            info!("backups enabled but not scheduled, installing trigger");
            let outcome = self
                .scheduler
                .setup_schedule(config.frequency, config.scheduled_time);
            if !outcome.success {
                warn!(message = %outcome.message, "could not install trigger");
            }
            Ok(self.scheduler.status())
        } else if !config.enabled && status.is_scheduled {
            info!("backups disabled but scheduled, removing trigger");
            self.scheduler.remove_schedule();
            Ok(self.scheduler.status())
        } else {
            Ok(status)
        }
    }

    /// Take a snapshot, then optionally run a retention sweep
    ///
    /// The sweep runs even when the snapshot failed.
    pub fn create_backup(&self, request: &BackupRequest, cleanup: bool) -> BackupRun {
        let record = SnapshotEngine::new(self.paths.clone(), self.database.clone())
            .perform_backup(request);

        let retention = if cleanup {
            match RetentionManager::new(self.database.clone()).cleanup_old_backups() {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!(error = %e, "retention sweep failed");
                    None
                }
            }
        } else {
            None
        };

        BackupRun { record, retention }
    }

    /// Run a retention sweep on its own
    pub fn cleanup(&self) -> GastroResult<RetentionReport> {
        RetentionManager::new(self.database.clone()).cleanup_old_backups()
    }

    /// Delete one record and its artifact
    pub fn delete_record(&self, id: RecordId) -> GastroResult<BackupRecord> {
        let ledger = self.ledger()?;
        let record = ledger.require(id)?;
        if !record.status.is_final() {
            return Err(GastroError::Validation(format!(
                "Backup {} is still in progress",
                id
            )));
        }
        evict(&ledger, &record)?;
        info!(record = %id, file = %record.filename, "backup deleted");
        Ok(record)
    }

    /// Records, newest first
    pub fn list_records(&self, limit: Option<usize>) -> GastroResult<Vec<BackupRecord>> {
        self.ledger()?.list(limit)
    }

    /// Count and total size of successful backups
    pub fn summary(&self) -> GastroResult<LedgerSummary> {
        self.ledger()?.summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use chrono::NaiveTime;

    use crate::backup::testing::TestEnv;
    use crate::models::{BackupStatus, Frequency};
    use crate::schedule::SchedulerKind;

    /// Scheduler that keeps its trigger in memory
    #[derive(Default)]
    struct FakeScheduler {
        installed: RefCell<Option<(Frequency, NaiveTime)>>,
        setups: RefCell<usize>,
        broken: bool,
    }

    impl Scheduler for FakeScheduler {
        fn kind(&self) -> SchedulerKind {
            SchedulerKind::Cron
        }

        fn setup_schedule(&self, frequency: Frequency, time: NaiveTime) -> Outcome {
            self.remove_schedule();
            *self.setups.borrow_mut() += 1;
            if self.broken {
                return Outcome::failed("crontab: permission denied");
            }
            *self.installed.borrow_mut() = Some((frequency, time));
            Outcome::ok("Cron job created.")
        }

        fn remove_schedule(&self) {
            *self.installed.borrow_mut() = None;
        }

        fn status(&self) -> SchedulerStatus {
            match *self.installed.borrow() {
                Some((frequency, _)) => SchedulerStatus::scheduled(frequency.as_str()),
                None => SchedulerStatus::not_scheduled(""),
            }
        }
    }

    fn enabled(frequency: Frequency) -> BackupConfiguration {
        BackupConfiguration {
            enabled: true,
            frequency,
            scheduled_time: NaiveTime::from_hms_opt(2, 30, 0).unwrap(),
            ..BackupConfiguration::default()
        }
    }

    #[test]
    fn test_save_enabled_installs_schedule() {
        let env = TestEnv::new();
        let scheduler = FakeScheduler::default();
        let service = BackupService::new(&env.paths, &env.database, &scheduler);

        let outcome = service
            .save_configuration(&enabled(Frequency::Every6Hours), Some("owner"))
            .unwrap();
        assert!(outcome.success, "{}", outcome.message);

        assert_eq!(
            *scheduler.installed.borrow(),
            Some((Frequency::Every6Hours, NaiveTime::from_hms_opt(2, 30, 0).unwrap()))
        );
        let saved = service.configuration().unwrap();
        assert!(saved.enabled);
        assert_eq!(saved.updated_by.as_deref(), Some("owner"));
        assert!(saved.updated_at.is_some());
    }

    #[test]
    fn test_save_disabled_removes_schedule() {
        let env = TestEnv::new();
        let scheduler = FakeScheduler::default();
        let service = BackupService::new(&env.paths, &env.database, &scheduler);

        service
            .save_configuration(&enabled(Frequency::Daily), None)
            .unwrap();
        let outcome = service
            .save_configuration(&BackupConfiguration::default(), None)
            .unwrap();

        assert!(outcome.success);
        assert!(!scheduler.status().is_scheduled);
    }

    #[test]
    fn test_save_reports_scheduler_failure_but_keeps_config() {
        let env = TestEnv::new();
        let scheduler = FakeScheduler {
            broken: true,
            ..FakeScheduler::default()
        };
        let service = BackupService::new(&env.paths, &env.database, &scheduler);

        let outcome = service
            .save_configuration(&enabled(Frequency::Daily), None)
            .unwrap();
        assert!(!outcome.success);
        assert!(outcome.message.contains("permission denied"));
        assert!(service.configuration().unwrap().enabled);
    }

    #[test]
    fn test_save_rejects_invalid_configuration() {
        let env = TestEnv::new();
        let scheduler = FakeScheduler::default();
        let service = BackupService::new(&env.paths, &env.database, &scheduler);

        let config = BackupConfiguration {
            retention_days: 0,
            ..enabled(Frequency::Daily)
        };
        assert!(service.save_configuration(&config, None).unwrap_err().is_validation());
        assert_eq!(*scheduler.setups.borrow(), 0);
        assert!(!service.configuration().unwrap().enabled);
    }

    #[test]
    fn test_reconcile_fixes_drift_both_ways() {
        let env = TestEnv::new();
        let scheduler = FakeScheduler::default();
        let service = BackupService::new(&env.paths, &env.database, &scheduler);

        env.ledger()
            .save_configuration(&enabled(Frequency::Weekly))
            .unwrap();
        let status = service.reconcile_schedule().unwrap();
        assert!(status.is_scheduled);
        assert_eq!(status.details, "weekly");

        env.ledger()
            .save_configuration(&BackupConfiguration::default())
            .unwrap();
        let status = service.reconcile_schedule().unwrap();
        assert!(!status.is_scheduled);

        let setups = *scheduler.setups.borrow();
        service.reconcile_schedule().unwrap();
        assert_eq!(*scheduler.setups.borrow(), setups);
    }

    #[test]
    fn test_install_schedule_refuses_when_disabled() {
        let env = TestEnv::new();
        let scheduler = FakeScheduler::default();
        let service = BackupService::new(&env.paths, &env.database, &scheduler);

        let outcome = service.install_schedule().unwrap();
        assert!(!outcome.success);
        assert!(scheduler.installed.borrow().is_none());
    }

    #[test]
    fn test_create_backup_with_cleanup() {
        let env = TestEnv::new();
        let scheduler = FakeScheduler::default();
        let service = BackupService::new(&env.paths, &env.database, &scheduler);
        env.add_aged_artifact("backup_ancient.sqlite3.gz", 90, 4096);

        let run = service.create_backup(&BackupRequest::scheduled(), true);

        assert_eq!(run.record.status, BackupStatus::Success);
        assert_eq!(
            run.retention,
            Some(RetentionReport {
                deleted_count: 1,
                freed_bytes: 4096
            })
        );
        assert_eq!(service.list_records(None).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_record_and_summary() {
        let env = TestEnv::new();
        let scheduler = FakeScheduler::default();
        let service = BackupService::new(&env.paths, &env.database, &scheduler);
        let keep = env.add_aged_artifact("keep.sqlite3", 1, 100);
        let gone = env.add_aged_artifact("drop.sqlite3", 1, 250);

        assert_eq!(
            service.summary().unwrap(),
            LedgerSummary {
                success_count: 2,
                total_bytes: 350
            }
        );

        let deleted = service.delete_record(gone.id).unwrap();
        assert_eq!(deleted.filename, "drop.sqlite3");
        assert!(!gone.file_path.exists());
        assert!(keep.file_path.exists());

        assert!(service.delete_record(gone.id).unwrap_err().is_not_found());
        assert_eq!(service.summary().unwrap().success_count, 1);
    }
}
