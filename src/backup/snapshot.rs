//! Snapshot engine
//!
//! Copies the live database into a new backup artifact using SQLite's online
//! backup API, optionally gzip-compressed. Every attempt is written to the
//! ledger as `in_progress` before any file work and finalized exactly once.
//! Failures never escape: callers read the returned record's status.

use std::os::raw::c_int;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{Local, Utc};
use rusqlite::backup::Backup;
use rusqlite::{Connection, OpenFlags};
use tracing::{error, info, warn};

use crate::config::paths::GastroPaths;
use crate::error::{GastroError, GastroResult};
use crate::models::{
    BackupConfiguration, BackupRecord, BackupStatus, BackupTrigger, RecordId, RunStatus,
};
use crate::storage::database::{open_connection, Database};
use crate::storage::file_io::{remove_file_if_exists, rename_into_place};

use super::compression::gzip_file;
use super::ledger::{Ledger, NewRecord};
use super::lock::OperationLock;

/// Pages copied per backup step
const PAGES_PER_STEP: c_int = 100;

/// Pause between backup steps when the source is busy
const STEP_PAUSE: Duration = Duration::from_millis(25);

/// Parameters for one snapshot attempt
#[derive(Debug, Clone, Default)]
pub struct BackupRequest {
    /// Destination directory; falls back to the configured one
    pub destination: Option<PathBuf>,
    /// Compression; falls back to the configured setting
    pub compress: Option<bool>,
    pub trigger: BackupTrigger,
    /// Who asked for the backup, if anyone
    pub actor: Option<String>,
}

impl BackupRequest {
    /// An operator-initiated backup using configured defaults
    pub fn manual() -> Self {
        Self::default()
    }

    /// A backup fired by the OS scheduler
    pub fn scheduled() -> Self {
        Self {
            trigger: BackupTrigger::Scheduled,
            ..Self::default()
        }
    }

    pub fn with_destination(mut self, dir: impl Into<PathBuf>) -> Self {
        self.destination = Some(dir.into());
        self
    }

    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = Some(compress);
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}

/// Where an attempt's files go
#[derive(Debug, Clone)]
struct ArtifactPlan {
    directory: PathBuf,
    filename: String,
    final_path: PathBuf,
    temp_path: PathBuf,
    partial_path: PathBuf,
    compress: bool,
}

/// Creates backup artifacts from the live database
#[derive(Debug, Clone)]
pub struct SnapshotEngine {
    paths: GastroPaths,
    database: Database,
}

impl SnapshotEngine {
    pub fn new(paths: GastroPaths, database: Database) -> Self {
        Self { paths, database }
    }

    /// Take a full snapshot of the live database
    ///
    /// Always returns a record whose status is `Success` or `Failed`.
    pub fn perform_backup(&self, request: &BackupRequest) -> BackupRecord {
        match OperationLock::acquire(&self.paths.lock_file()) {
            Ok(_guard) => self.snapshot(request, None),
            Err(e) => self.snapshot(request, Some(e)),
        }
    }

    /// Snapshot without taking the operation lock; the caller must hold it
    pub(crate) fn perform_backup_locked(&self, request: &BackupRequest) -> BackupRecord {
        self.snapshot(request, None)
    }

    fn snapshot(&self, request: &BackupRequest, blocked: Option<GastroError>) -> BackupRecord {
        let started = Instant::now();

        let ledger = match Ledger::open(&self.database) {
            Ok(ledger) => ledger,
            Err(e) => {
                error!(error = %e, "backup ledger unavailable");
                return detached_failure(request, None, &e, started);
            }
        };

        let config = ledger.load_configuration().unwrap_or_else(|e| {
            warn!(error = %e, "could not load backup configuration, using defaults");
            BackupConfiguration::default()
        });

        let plan = self.plan(request, &config);

        let record = match ledger.open_record(&NewRecord {
            filename: plan.filename.clone(),
            file_path: plan.final_path.clone(),
            trigger: request.trigger,
            created_by: request.actor.clone(),
            created_at: Utc::now(),
        }) {
            Ok(record) => record,
            Err(e) => {
                error!(error = %e, "could not open backup record");
                return detached_failure(request, Some(&plan), &e, started);
            }
        };

        info!(
            record = %record.id,
            file = %plan.final_path.display(),
            trigger = %request.trigger,
            "starting backup"
        );

        let result = match blocked {
            Some(e) => Err(e),
            None => self.write_artifact(&plan),
        };

        let elapsed = started.elapsed().as_secs_f64();
        let failure = match result {
            Ok(size) => match ledger.mark_success(record.id, size, elapsed) {
                Ok(done) => {
                    if let Err(e) = ledger.record_run(RunStatus::Success, Utc::now()) {
                        warn!(error = %e, "could not update last run on configuration");
                    }
                    info!(
                        record = %done.id,
                        size = done.file_size,
                        duration = done.duration_seconds,
                        "backup created: {}",
                        done.filename
                    );
                    return done;
                }
                Err(e) => {
                    error!(record = %record.id, error = %e, "could not finalize backup record");
                    e
                }
            },
            Err(e) => {
                discard(&plan);
                error!(record = %record.id, error = %e, "backup failed");
                e
            }
        };

        if let Err(run_err) = ledger.record_run(RunStatus::Failed, Utc::now()) {
            warn!(error = %run_err, "could not update last run on configuration");
        }
        ledger
            .mark_failed(record.id, &failure.to_string(), elapsed)
            .unwrap_or_else(|ledger_err| {
                error!(error = %ledger_err, "could not finalize backup record");
                detached_failure(request, Some(&plan), &failure, started)
            })
    }

    /// Resolve destination, compression and a collision-free filename
    fn plan(&self, request: &BackupRequest, config: &BackupConfiguration) -> ArtifactPlan {
        let directory = request
            .destination
            .clone()
            .unwrap_or_else(|| config.backup_dir(&self.paths));
        let compress = request.compress.unwrap_or(config.compress);
        let stamp = Local::now().format("%Y-%m-%d_%H%M%S").to_string();
        let extension = self.database.extension();

        let mut attempt = 1;
        loop {
            let base = artifact_base_name(&stamp, &extension, attempt);
            let filename = if compress {
                format!("{}.gz", base)
            } else {
                base.clone()
            };
            let final_path = directory.join(&filename);
            let temp_path = directory.join(format!("_temp_{}", base));
            let partial_path = directory.join(format!("{}.partial", filename));

            if !final_path.exists() && !temp_path.exists() && !partial_path.exists() {
                return ArtifactPlan {
                    directory,
                    filename,
                    final_path,
                    temp_path,
                    partial_path,
                    compress,
                };
            }
            attempt += 1;
        }
    }

    /// Native copy into a temp file, then compress or rename into place
    ///
    /// Returns the artifact size in bytes.
    fn write_artifact(&self, plan: &ArtifactPlan) -> GastroResult<u64> {
        std::fs::create_dir_all(&plan.directory).map_err(|e| {
            GastroError::Io(format!(
                "Failed to create backup directory {}: {}",
                plan.directory.display(),
                e
            ))
        })?;

        let source = Connection::open_with_flags(
            self.database.path(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            GastroError::Database(format!(
                "Failed to open live database {}: {}",
                self.database.path().display(),
                e
            ))
        })?;
        copy_database(&source, &plan.temp_path)?;
        drop(source);

        if plan.compress {
            gzip_file(&plan.temp_path, &plan.partial_path)?;
            rename_into_place(&plan.partial_path, &plan.final_path)?;
            remove_file_if_exists(&plan.temp_path)?;
        } else {
            rename_into_place(&plan.temp_path, &plan.final_path)?;
        }

        let size = std::fs::metadata(&plan.final_path)
            .map_err(|e| {
                GastroError::Io(format!(
                    "Failed to stat {}: {}",
                    plan.final_path.display(),
                    e
                ))
            })?
            .len();
        Ok(size)
    }
}

/// Copy every page of `source` into a fresh database file at `dest`
pub(crate) fn copy_database(source: &Connection, dest: &Path) -> GastroResult<()> {
    let mut target = open_connection(dest)?;
    copy_into(source, &mut target)
}

/// Copy every page of `source` into an already-open `target` connection
pub(crate) fn copy_into(source: &Connection, target: &mut Connection) -> GastroResult<()> {
    let backup = Backup::new(source, target)
        .map_err(|e| GastroError::Database(format!("Failed to initialize backup: {}", e)))?;
    backup
        .run_to_completion(PAGES_PER_STEP, STEP_PAUSE, None)
        .map_err(|e| GastroError::Database(format!("Backup failed: {}", e)))?;
    Ok(())
}

/// `backup_<stamp>.<ext>`, with `-N` before the extension for collisions
fn artifact_base_name(stamp: &str, extension: &str, attempt: u32) -> String {
    if attempt <= 1 {
        format!("backup_{}.{}", stamp, extension)
    } else {
        format!("backup_{}-{}.{}", stamp, attempt, extension)
    }
}

/// Remove leftovers of a failed attempt; never the final artifact
fn discard(plan: &ArtifactPlan) {
    for path in [&plan.temp_path, &plan.partial_path] {
        if let Err(e) = remove_file_if_exists(path) {
            warn!(file = %path.display(), error = %e, "could not remove temporary file");
        }
    }
}

/// A failed record that could not be written to the ledger
fn detached_failure(
    request: &BackupRequest,
    plan: Option<&ArtifactPlan>,
    err: &GastroError,
    started: Instant,
) -> BackupRecord {
    BackupRecord {
        id: RecordId::new(0),
        filename: plan.map(|p| p.filename.clone()).unwrap_or_default(),
        file_path: plan.map(|p| p.final_path.clone()).unwrap_or_default(),
        file_size: 0,
        status: BackupStatus::Failed,
        trigger: request.trigger,
        error_message: Some(err.to_string()),
        duration_seconds: started.elapsed().as_secs_f64(),
        created_at: Utc::now(),
        created_by: request.actor.clone(),
    }
}
