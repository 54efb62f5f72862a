//! Backup display formatting

use chrono::{DateTime, Local, Utc};
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::backup::RetentionReport;
use crate::models::{format_size, BackupConfiguration, BackupRecord};
use crate::schedule::SchedulerStatus;

#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "File")]
    filename: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Trigger")]
    trigger: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Duration")]
    duration: String,
}

impl RecordRow {
    fn new(record: &BackupRecord) -> Self {
        Self {
            id: record.id.to_string(),
            filename: record.filename.clone(),
            created: local_time(record.created_at),
            trigger: record.trigger.to_string(),
            status: record.status.to_string(),
            size: if record.is_success() {
                record.file_size_display()
            } else {
                "-".to_string()
            },
            duration: format_elapsed(record.duration_seconds),
        }
    }
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Table of ledger records, newest first as given
pub fn format_record_table(records: &[BackupRecord]) -> String {
    if records.is_empty() {
        return "No backups found.".to_string();
    }
    let mut table = Table::new(records.iter().map(RecordRow::new));
    table.with(Style::sharp());
    table.to_string()
}

/// Multi-line view of a single record
pub fn format_record_details(record: &BackupRecord) -> String {
    let mut output = String::new();
    output.push_str(&format!("Backup #{}\n", record.id));
    output.push_str(&format!("  File:     {}\n", record.filename));
    output.push_str(&format!("  Path:     {}\n", record.file_path.display()));
    output.push_str(&format!("  Status:   {}\n", record.status));
    output.push_str(&format!("  Trigger:  {}\n", record.trigger));
    output.push_str(&format!("  Created:  {}\n", local_time(record.created_at)));
    if let Some(actor) = &record.created_by {
        output.push_str(&format!("  By:       {}\n", actor));
    }
    if record.is_success() {
        output.push_str(&format!("  Size:     {}\n", record.file_size_display()));
    }
    output.push_str(&format!("  Duration: {}\n", format_elapsed(record.duration_seconds)));
    if let Some(error) = &record.error_message {
        output.push_str(&format!("  Error:    {}\n", error));
    }
    output
}

/// Current configuration, with the resolved artifact directory
pub fn format_configuration(config: &BackupConfiguration, backup_dir: &std::path::Path) -> String {
    let mut output = String::new();
    output.push_str("Backup Configuration\n");
    output.push_str("====================\n");
    output.push_str(&format!(
        "Enabled:         {}\n",
        if config.enabled { "Yes" } else { "No" }
    ));
    output.push_str(&format!("Frequency:       {}\n", config.frequency));
    output.push_str(&format!(
        "Time:            {}\n",
        config.scheduled_time.format("%H:%M")
    ));
    output.push_str(&format!("Directory:       {}\n", backup_dir.display()));
    output.push_str(&format!("Retention:       {} days\n", config.retention_days));
    output.push_str(&format!("Max backups:     {}\n", config.max_backup_count));
    output.push_str(&format!(
        "Compress:        {}\n",
        if config.compress { "Yes" } else { "No" }
    ));
    match (config.last_run_at, config.last_run_status) {
        (Some(at), Some(status)) => {
            output.push_str(&format!("Last run:        {} ({})\n", local_time(at), status));
        }
        (Some(at), None) => {
            output.push_str(&format!("Last run:        {}\n", local_time(at)));
        }
        _ => output.push_str("Last run:        never\n"),
    }
    output
}

/// One-line summary of a retention sweep
pub fn format_retention(report: &RetentionReport) -> String {
    if report.deleted_count == 0 {
        return "Retention: nothing to remove.".to_string();
    }
    format!(
        "Retention: removed {} backup(s), freed {}.",
        report.deleted_count,
        format_size(report.freed_bytes)
    )
}

/// Scheduler status for the terminal
pub fn format_schedule_status(status: &SchedulerStatus) -> String {
    let head = if status.is_scheduled {
        "Scheduled backups: installed"
    } else {
        "Scheduled backups: not installed"
    };
    if status.details.trim().is_empty() {
        head.to_string()
    } else {
        format!("{}\n{}", head, status.details.trim_end())
    }
}

/// Run time in seconds, e.g. `0.4s`, `12.0s`, `3m 05s`
pub fn format_elapsed(seconds: f64) -> String {
    if seconds < 60.0 {
        return format!("{:.1}s", seconds.max(0.0));
    }
    let total = seconds.round() as u64;
    format!("{}m {:02}s", total / 60, total % 60)
}

/// Age in its largest whole unit
pub fn format_age(age: chrono::Duration) -> String {
    let total_seconds = age.num_seconds();

    if total_seconds < 60 {
        return format!("{}s", total_seconds.max(0));
    }

    let minutes = total_seconds / 60;
    if minutes < 60 {
        return format!("{}m", minutes);
    }

    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h", hours);
    }

    let days = hours / 24;
    if days < 30 {
        return format!("{}d", days);
    }

    format!("{}mo", days / 30)
}
