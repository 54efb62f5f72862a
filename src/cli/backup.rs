//! Backup CLI commands
//!
//! Implements the `gastro backup` subcommands on top of [`BackupService`].

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use chrono::NaiveTime;
use clap::{ArgAction, Subcommand};

use crate::backup::{BackupRequest, Ledger, RestoreEngine, RestoreRequest, RESTORE_CONFIRMATION};
use crate::config::paths::GastroPaths;
use crate::config::settings::Settings;
use crate::display::{
    format_configuration, format_elapsed, format_record_details, format_record_table,
    format_retention, format_schedule_status,
};
use crate::error::GastroResult;
use crate::models::{format_size, BackupConfiguration, BackupStatus, Frequency, RecordId};
use crate::schedule::{detect_scheduler, Scheduler, ScheduledCommand, Timeouts};
use crate::services::BackupService;
use crate::storage::Database;

/// Backup subcommands
#[derive(Subcommand, Debug)]
pub enum BackupCommands {
    /// Create a new backup now
    Create {
        /// Record the run as fired by the OS scheduler
        #[arg(long)]
        scheduled: bool,

        /// Write the native database file instead of gzip
        #[arg(long)]
        no_compress: bool,

        /// Apply the retention policy afterwards
        #[arg(long)]
        cleanup: bool,

        /// Write into this directory instead of the configured one
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Restore the live database from a backup
    Restore {
        /// Backup record ID
        id: RecordId,

        /// Confirmation phrase; prompted for when omitted
        #[arg(long, value_name = "TOKEN")]
        confirm: Option<String>,
    },

    /// Delete old backups according to the retention policy
    Cleanup,

    /// Install, remove or inspect the OS schedule
    Schedule {
        /// Remove the scheduled task
        #[arg(long, conflicts_with_all = ["status", "sync"])]
        remove: bool,

        /// Show whether the scheduled task is installed
        #[arg(long, conflicts_with = "sync")]
        status: bool,

        /// Install or remove the task so it matches the configuration
        #[arg(long)]
        sync: bool,
    },

    /// List backup records, newest first
    List {
        /// Number of records to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show one backup record
    Show {
        /// Backup record ID
        id: RecordId,
    },

    /// Delete a backup record and its file
    Delete {
        /// Backup record ID
        id: RecordId,
    },

    /// Show or change the backup configuration
    Config {
        /// Enable scheduled backups
        #[arg(long, conflicts_with = "disable")]
        enable: bool,

        /// Disable scheduled backups
        #[arg(long)]
        disable: bool,

        /// daily, every_12_hours, every_6_hours or weekly
        #[arg(long, value_parser = parse_frequency)]
        frequency: Option<Frequency>,

        /// Time of day for scheduled runs (HH:MM)
        #[arg(long, value_parser = parse_time)]
        time: Option<NaiveTime>,

        /// Backup directory
        #[arg(long, conflicts_with = "default_dir")]
        dir: Option<PathBuf>,

        /// Go back to the default backup directory
        #[arg(long)]
        default_dir: bool,

        /// Delete backups older than this many days
        #[arg(long)]
        retention_days: Option<u32>,

        /// Keep at most this many backups
        #[arg(long)]
        max_backups: Option<u32>,

        /// Compress new backups with gzip
        #[arg(long, action = ArgAction::Set, value_name = "BOOL")]
        compress: Option<bool>,
    },
}

fn parse_frequency(s: &str) -> Result<Frequency, String> {
    Frequency::parse(s).ok_or_else(|| {
        format!(
            "unknown frequency '{}' (expected daily, every_12_hours, every_6_hours or weekly)",
            s
        )
    })
}

fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s.trim(), "%H:%M:%S"))
        .map_err(|_| format!("invalid time '{}' (expected HH:MM)", s))
}

/// Name recorded as `created_by` / `updated_by` for CLI actions
fn current_actor() -> Option<String> {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|name| !name.trim().is_empty())
}

fn build_scheduler(paths: &GastroPaths, settings: &Settings) -> GastroResult<Box<dyn Scheduler>> {
    let command = ScheduledCommand::current(paths.base_dir())?;
    let timeouts = settings
        .scheduler_timeout()
        .map(Timeouts::uniform)
        .unwrap_or_default();
    Ok(detect_scheduler(command, timeouts))
}

/// Ask the operator to type the confirmation phrase
fn prompt_confirmation(id: RecordId) -> GastroResult<String> {
    println!("WARNING: This will replace ALL current data with backup #{}.", id);
    println!("A safety backup of the current data is taken first.");
    print!("Type {} to confirm: ", RESTORE_CONFIRMATION);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

/// Handle a backup command
///
/// Returns `Ok(false)` when the command ran but the operation itself
/// failed (a failed backup record or restore), so the caller can exit non-zero.
pub fn handle_backup_command(
    paths: &GastroPaths,
    settings: &Settings,
    cmd: BackupCommands,
) -> GastroResult<bool> {
    let database = Database::new(settings.database_path(paths));
    let scheduler = build_scheduler(paths, settings)?;
    let service = BackupService::new(paths, &database, scheduler.as_ref());

    match cmd {
        BackupCommands::Create {
            scheduled,
            no_compress,
            cleanup,
            dir,
        } => {
            let mut request = if scheduled {
                BackupRequest::scheduled()
            } else {
                BackupRequest::manual()
            };
            if no_compress {
                request = request.with_compress(false);
            }
            if let Some(dir) = dir {
                request = request.with_destination(dir);
            }
            if let Some(actor) = current_actor().filter(|_| !scheduled) {
                request = request.with_actor(actor);
            }

            let run = service.create_backup(&request, cleanup);
            let record = &run.record;
            let succeeded = record.status == BackupStatus::Success;
            if succeeded {
                println!("Backup created: {}", record.filename);
                println!("Location: {}", record.file_path.display());
                println!(
                    "Size: {} in {}",
                    record.file_size_display(),
                    format_elapsed(record.duration_seconds)
                );
            } else {
                eprintln!(
                    "Backup failed: {}",
                    record.error_message.as_deref().unwrap_or("unknown error")
                );
            }
            if let Some(report) = run.retention {
                println!("{}", format_retention(&report));
            }
            Ok(succeeded)
        }

        BackupCommands::Restore { id, confirm } => {
            let confirmation = match confirm {
                Some(token) => token,
                None => prompt_confirmation(id)?,
            };
            let request = RestoreRequest::new(id, confirmation);
            let engine = RestoreEngine::new(paths.clone(), database.clone());

            let outcome = engine.restore(&request)?;
            if outcome.success {
                println!("{}", outcome.message);
            } else {
                eprintln!("{}", outcome.message);
            }
            Ok(outcome.success)
        }

        BackupCommands::Cleanup => {
            let report = service.cleanup()?;
            println!("{}", format_retention(&report));
            Ok(true)
        }

        BackupCommands::Schedule {
            remove,
            status,
            sync,
        } => {
            if remove {
                service.remove_schedule();
                println!("Scheduled backups removed.");
                Ok(true)
            } else if status {
                println!("{}", format_schedule_status(&service.schedule_status()));
                Ok(true)
            } else if sync {
                let status = service.reconcile_schedule()?;
                println!("{}", format_schedule_status(&status));
                Ok(true)
            } else {
                let outcome = service.install_schedule()?;
                if outcome.success {
                    println!("{}", outcome.message);
                } else {
                    eprintln!("{}", outcome.message);
                }
                Ok(outcome.success)
            }
        }

        BackupCommands::List { limit } => {
            let records = service.list_records(limit)?;
            println!("{}", format_record_table(&records));
            if !records.is_empty() {
                let summary = service.summary()?;
                println!();
                println!(
                    "{} successful backup(s), {} total",
                    summary.success_count,
                    format_size(summary.total_bytes)
                );
            }
            Ok(true)
        }

        BackupCommands::Show { id } => {
            let record = Ledger::open(&database)?.require(id)?;
            print!("{}", format_record_details(&record));
            Ok(true)
        }

        BackupCommands::Delete { id } => {
            let record = service.delete_record(id)?;
            println!("Deleted backup #{} ({}).", record.id, record.filename);
            Ok(true)
        }

        BackupCommands::Config {
            enable,
            disable,
            frequency,
            time,
            dir,
            default_dir,
            retention_days,
            max_backups,
            compress,
        } => {
            let current = service.configuration()?;
            let changed = enable
                || disable
                || default_dir
                || frequency.is_some()
                || time.is_some()
                || dir.is_some()
                || retention_days.is_some()
                || max_backups.is_some()
                || compress.is_some();

            if !changed {
                print!(
                    "{}",
                    format_configuration(&current, &current.backup_dir(paths))
                );
                return Ok(true);
            }

            let updated = BackupConfiguration {
                enabled: if enable {
                    true
                } else if disable {
                    false
                } else {
                    current.enabled
                },
                frequency: frequency.unwrap_or(current.frequency),
                scheduled_time: time.unwrap_or(current.scheduled_time),
                backup_directory: if default_dir {
                    None
                } else {
                    dir.or_else(|| current.backup_directory.clone())
                },
                retention_days: retention_days.unwrap_or(current.retention_days),
                max_backup_count: max_backups.unwrap_or(current.max_backup_count),
                compress: compress.unwrap_or(current.compress),
                ..current
            };

            let outcome = service.save_configuration(&updated, current_actor().as_deref())?;
            if outcome.success {
                println!("{}", outcome.message);
            } else {
                eprintln!("{}", outcome.message);
            }
            let saved = service.configuration()?;
            print!("{}", format_configuration(&saved, &saved.backup_dir(paths)));
            Ok(outcome.success)
        }
    }
}
