//! Backup ledger and configuration store
//!
//! Persists the [`BackupConfiguration`] singleton and every [`BackupRecord`]
//! in the live database. Records are opened `in_progress` and finalized
//! exactly once; the finalize statements refuse to touch a record that has
//! already left `in_progress`.

use std::path::PathBuf;

use chrono::{DateTime, NaiveTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{GastroError, GastroResult};
use crate::models::{
    BackupConfiguration, BackupRecord, BackupStatus, BackupTrigger, Frequency, RecordId,
    RunStatus,
};
use crate::storage::database::{ensure_schema, Database};

/// Identity of the configuration singleton row
const CONFIG_ID: i64 = 1;

const RECORD_COLUMNS: &str = "id, filename, file_path, file_size, status, trigger_kind, \
     error_message, duration_seconds, created_at, created_by";

const CONFIG_COLUMNS: &str = "enabled, frequency, scheduled_time, backup_directory, \
     retention_days, max_backup_count, compress, last_run_at, last_run_status, \
     updated_at, updated_by";

/// Data needed to open a ledger entry
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub filename: String,
    pub file_path: PathBuf,
    pub trigger: BackupTrigger,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Aggregate figures over successful backups
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerSummary {
    pub success_count: u64,
    pub total_bytes: u64,
}

/// Full copy of the bookkeeping tables, used to carry them across a restore
#[derive(Debug, Clone)]
pub struct LedgerState {
    pub configuration: BackupConfiguration,
    pub records: Vec<BackupRecord>,
}

/// Store for the configuration singleton and the backup records
pub struct Ledger {
    conn: Connection,
}

impl Ledger {
    /// Open the ledger in the given live database
    pub fn open(database: &Database) -> GastroResult<Self> {
        Ok(Self {
            conn: database.open()?,
        })
    }

    /// Wrap an existing connection, creating the schema if needed
    pub fn from_connection(conn: Connection) -> GastroResult<Self> {
        ensure_schema(&conn)?;
        Ok(Self { conn })
    }

    // ------------------------------------------------------------------
    // Configuration singleton
    // ------------------------------------------------------------------

    /// Load the configuration, creating the default row on first access
    pub fn load_configuration(&self) -> GastroResult<BackupConfiguration> {
        self.conn.execute(
            "INSERT OR IGNORE INTO backup_configuration (id) VALUES (?1)",
            [CONFIG_ID],
        )?;

        let sql = format!(
            "SELECT {} FROM backup_configuration WHERE id = ?1",
            CONFIG_COLUMNS
        );
        let config = self.conn.query_row(&sql, [CONFIG_ID], config_from_row)?;
        Ok(config)
    }

    /// Save the configuration in place under the reserved identity
    pub fn save_configuration(&self, config: &BackupConfiguration) -> GastroResult<()> {
        config.validate()?;

        self.conn.execute(
            "INSERT INTO backup_configuration (
                 id, enabled, frequency, scheduled_time, backup_directory,
                 retention_days, max_backup_count, compress, last_run_at,
                 last_run_status, updated_at, updated_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(id) DO UPDATE SET
                 enabled = excluded.enabled,
                 frequency = excluded.frequency,
                 scheduled_time = excluded.scheduled_time,
                 backup_directory = excluded.backup_directory,
                 retention_days = excluded.retention_days,
                 max_backup_count = excluded.max_backup_count,
                 compress = excluded.compress,
                 last_run_at = excluded.last_run_at,
                 last_run_status = excluded.last_run_status,
                 updated_at = excluded.updated_at,
                 updated_by = excluded.updated_by",
            params![
                CONFIG_ID,
                config.enabled,
                config.frequency.as_str(),
                encode_time(config.scheduled_time),
                config
                    .backup_directory
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned()),
                config.retention_days,
                config.max_backup_count,
                config.compress,
                config.last_run_at.map(encode_timestamp),
                config.last_run_status.map(|s| s.as_str()),
                config.updated_at.map(encode_timestamp),
                config.updated_by,
            ],
        )?;
        Ok(())
    }

    /// Record the result of a snapshot attempt on the configuration
    ///
    /// `last_run_at` only moves forward on success.
    pub fn record_run(&self, status: RunStatus, at: DateTime<Utc>) -> GastroResult<()> {
        self.load_configuration()?;
        match status {
            RunStatus::Success => self.conn.execute(
                "UPDATE backup_configuration SET last_run_at = ?1, last_run_status = ?2 WHERE id = ?3",
                params![encode_timestamp(at), status.as_str(), CONFIG_ID],
            )?,
            RunStatus::Failed => self.conn.execute(
                "UPDATE backup_configuration SET last_run_status = ?1 WHERE id = ?2",
                params![status.as_str(), CONFIG_ID],
            )?,
        };
        Ok(())
    }

    // ------------------------------------------------------------------
    // Records
    // ------------------------------------------------------------------

    /// Open a new `in_progress` record
    pub fn open_record(&self, new: &NewRecord) -> GastroResult<BackupRecord> {
        self.conn.execute(
            "INSERT INTO backup_records (filename, file_path, status, trigger_kind, created_at, created_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                new.filename,
                new.file_path.to_string_lossy().into_owned(),
                BackupStatus::InProgress.as_str(),
                new.trigger.as_str(),
                encode_timestamp(new.created_at),
                new.created_by,
            ],
        )?;
        let id = RecordId::new(self.conn.last_insert_rowid());
        self.require(id)
    }

    /// Finalize a record as `success`
    pub fn mark_success(
        &self,
        id: RecordId,
        file_size: u64,
        duration_seconds: f64,
    ) -> GastroResult<BackupRecord> {
        let changed = self.conn.execute(
            "UPDATE backup_records
             SET status = ?1, file_size = ?2, duration_seconds = ?3, error_message = NULL
             WHERE id = ?4 AND status = ?5",
            params![
                BackupStatus::Success.as_str(),
                file_size as i64,
                round_duration(duration_seconds),
                id.get(),
                BackupStatus::InProgress.as_str(),
            ],
        )?;
        self.finalized(id, changed)
    }

    /// Finalize a record as `failed`
    pub fn mark_failed(
        &self,
        id: RecordId,
        error_message: &str,
        duration_seconds: f64,
    ) -> GastroResult<BackupRecord> {
        let changed = self.conn.execute(
            "UPDATE backup_records
             SET status = ?1, error_message = ?2, duration_seconds = ?3
             WHERE id = ?4 AND status = ?5",
            params![
                BackupStatus::Failed.as_str(),
                error_message,
                round_duration(duration_seconds),
                id.get(),
                BackupStatus::InProgress.as_str(),
            ],
        )?;
        self.finalized(id, changed)
    }

    fn finalized(&self, id: RecordId, changed: usize) -> GastroResult<BackupRecord> {
        if changed == 0 {
            let record = self.require(id)?;
            return Err(GastroError::Validation(format!(
                "Backup record {} is already finalized ({})",
                id, record.status
            )));
        }
        self.require(id)
    }

    /// Get a record by id
    pub fn get(&self, id: RecordId) -> GastroResult<Option<BackupRecord>> {
        let sql = format!("SELECT {} FROM backup_records WHERE id = ?1", RECORD_COLUMNS);
        let record = self
            .conn
            .query_row(&sql, [id.get()], record_from_row)
            .optional()?;
        Ok(record)
    }

    /// Get a record by id, failing if it does not exist
    pub fn require(&self, id: RecordId) -> GastroResult<BackupRecord> {
        self.get(id)?
            .ok_or_else(|| GastroError::record_not_found(id.to_string()))
    }

    /// List records, newest first
    pub fn list(&self, limit: Option<usize>) -> GastroResult<Vec<BackupRecord>> {
        let sql = format!(
            "SELECT {} FROM backup_records ORDER BY created_at DESC, id DESC LIMIT ?1",
            RECORD_COLUMNS
        );
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        self.query_records(&sql, params![limit])
    }

    /// Successful records created strictly before `cutoff`
    pub fn success_older_than(&self, cutoff: DateTime<Utc>) -> GastroResult<Vec<BackupRecord>> {
        let sql = format!(
            "SELECT {} FROM backup_records WHERE status = ?1 AND created_at < ?2
             ORDER BY created_at ASC, id ASC",
            RECORD_COLUMNS
        );
        self.query_records(
            &sql,
            params![BackupStatus::Success.as_str(), encode_timestamp(cutoff)],
        )
    }

    /// The `count` oldest successful records
    pub fn oldest_success(&self, count: usize) -> GastroResult<Vec<BackupRecord>> {
        let sql = format!(
            "SELECT {} FROM backup_records WHERE status = ?1
             ORDER BY created_at ASC, id ASC LIMIT ?2",
            RECORD_COLUMNS
        );
        self.query_records(&sql, params![BackupStatus::Success.as_str(), count as i64])
    }

    /// Number of successful records
    pub fn count_success(&self) -> GastroResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM backup_records WHERE status = ?1",
            [BackupStatus::Success.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Count and total size of successful records
    pub fn summary(&self) -> GastroResult<LedgerSummary> {
        let (count, bytes): (i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(file_size), 0) FROM backup_records WHERE status = ?1",
            [BackupStatus::Success.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(LedgerSummary {
            success_count: count as u64,
            total_bytes: bytes as u64,
        })
    }

    /// Delete a record; returns whether a row was removed
    pub fn delete(&self, id: RecordId) -> GastroResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM backup_records WHERE id = ?1", [id.get()])?;
        Ok(changed > 0)
    }

    fn query_records(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> GastroResult<Vec<BackupRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, record_from_row)?;
        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    // ------------------------------------------------------------------
    // Carry-over across restore
    // ------------------------------------------------------------------

    /// Capture the configuration and every record
    pub fn capture_state(&self) -> GastroResult<LedgerState> {
        Ok(LedgerState {
            configuration: self.load_configuration()?,
            records: self.list(None)?,
        })
    }

    /// Replace the bookkeeping tables with a captured state
    ///
    /// Records and configuration are written in a single transaction.
    /// Record ids are preserved.
    pub fn replace_state(&self, state: &LedgerState) -> GastroResult<()> {
        ensure_schema(&self.conn)?;
        let tx = self.conn.unchecked_transaction()?;

        tx.execute("DELETE FROM backup_records", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO backup_records (id, filename, file_path, file_size, status,
                     trigger_kind, error_message, duration_seconds, created_at, created_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for record in &state.records {
                insert.execute(params![
                    record.id.get(),
                    record.filename,
                    record.file_path.to_string_lossy().into_owned(),
                    record.file_size as i64,
                    record.status.as_str(),
                    record.trigger.as_str(),
                    record.error_message,
                    record.duration_seconds,
                    encode_timestamp(record.created_at),
                    record.created_by,
                ])?;
            }
        }
        // same connection, so the configuration write joins the transaction
        self.save_configuration(&state.configuration)?;
        tx.commit()?;
        Ok(())
    }
}

// ----------------------------------------------------------------------
// Row mapping
// ----------------------------------------------------------------------

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<BackupRecord> {
    let status: String = row.get(4)?;
    let trigger: String = row.get(5)?;
    let created_at: String = row.get(8)?;
    let file_path: String = row.get(2)?;
    let file_size: i64 = row.get(3)?;

    Ok(BackupRecord {
        id: RecordId::new(row.get(0)?),
        filename: row.get(1)?,
        file_path: PathBuf::from(file_path),
        file_size: file_size.max(0) as u64,
        status: parse_column(4, &status, BackupStatus::parse)?,
        trigger: parse_column(5, &trigger, BackupTrigger::parse)?,
        error_message: row.get(6)?,
        duration_seconds: row.get(7)?,
        created_at: parse_column(8, &created_at, decode_timestamp)?,
        created_by: row.get(9)?,
    })
}

fn config_from_row(row: &Row<'_>) -> rusqlite::Result<BackupConfiguration> {
    let frequency: String = row.get(1)?;
    let scheduled_time: String = row.get(2)?;
    let backup_directory: Option<String> = row.get(3)?;
    let last_run_at: Option<String> = row.get(7)?;
    let last_run_status: Option<String> = row.get(8)?;
    let updated_at: Option<String> = row.get(9)?;

    Ok(BackupConfiguration {
        enabled: row.get(0)?,
        frequency: parse_column(1, &frequency, Frequency::parse)?,
        scheduled_time: parse_column(2, &scheduled_time, decode_time)?,
        backup_directory: backup_directory
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from),
        retention_days: row.get(4)?,
        max_backup_count: row.get(5)?,
        compress: row.get(6)?,
        last_run_at: last_run_at
            .map(|v| parse_column(7, &v, decode_timestamp))
            .transpose()?,
        last_run_status: last_run_status
            .filter(|s| !s.is_empty())
            .map(|v| parse_column(8, &v, RunStatus::parse))
            .transpose()?,
        updated_at: updated_at
            .map(|v| parse_column(9, &v, decode_timestamp))
            .transpose()?,
        updated_by: row.get(10)?,
    })
}

fn parse_column<T>(
    idx: usize,
    value: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    parse(value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unexpected value '{}'", value).into(),
        )
    })
}

/// Fixed-width UTC timestamps so that text comparison orders correctly
fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

fn encode_time(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

fn decode_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

fn round_duration(seconds: f64) -> f64 {
    (seconds * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn create_test_ledger() -> (Ledger, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(temp_dir.path().join("db.sqlite3"));
        (Ledger::open(&db).unwrap(), temp_dir)
    }

    fn new_record(name: &str, created_at: DateTime<Utc>) -> NewRecord {
        NewRecord {
            filename: name.to_string(),
            file_path: PathBuf::from("/backups").join(name),
            trigger: BackupTrigger::Manual,
            created_by: Some("owner".to_string()),
            created_at,
        }
    }

    #[test]
    fn test_load_configuration_creates_default() {
        let (ledger, _temp) = create_test_ledger();

        let config = ledger.load_configuration().unwrap();
        assert_eq!(config, BackupConfiguration::default());

        let rows: i64 = ledger
            .conn
            .query_row("SELECT COUNT(*) FROM backup_configuration", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_save_configuration_in_place() {
        let (ledger, _temp) = create_test_ledger();

        let mut config = ledger.load_configuration().unwrap();
        config.enabled = true;
        config.frequency = Frequency::Every6Hours;
        config.scheduled_time = NaiveTime::from_hms_opt(22, 30, 0).unwrap();
        config.backup_directory = Some(PathBuf::from("/srv/backups"));
        config.retention_days = 7;
        config.max_backup_count = 3;
        config.compress = false;
        config.updated_by = Some("admin".to_string());
        ledger.save_configuration(&config).unwrap();
        ledger.save_configuration(&config).unwrap();

        let loaded = ledger.load_configuration().unwrap();
        assert_eq!(loaded, config);

        let rows: i64 = ledger
            .conn
            .query_row("SELECT COUNT(*) FROM backup_configuration", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_save_configuration_rejects_invalid() {
        let (ledger, _temp) = create_test_ledger();

        let mut config = BackupConfiguration::default();
        config.max_backup_count = 0;
        assert!(ledger.save_configuration(&config).unwrap_err().is_validation());
    }

    #[test]
    fn test_record_run() {
        let (ledger, _temp) = create_test_ledger();
        let now = Utc::now();

        ledger.record_run(RunStatus::Success, now).unwrap();
        let config = ledger.load_configuration().unwrap();
        assert_eq!(config.last_run_status, Some(RunStatus::Success));
        assert!(config.last_run_at.is_some());

        ledger
            .record_run(RunStatus::Failed, now + Duration::hours(1))
            .unwrap();
        let config = ledger.load_configuration().unwrap();
        assert_eq!(config.last_run_status, Some(RunStatus::Failed));
        assert_eq!(
            encode_timestamp(config.last_run_at.unwrap()),
            encode_timestamp(now)
        );
    }

    #[test]
    fn test_record_lifecycle() {
        let (ledger, _temp) = create_test_ledger();

        let record = ledger.open_record(&new_record("a.sqlite3", Utc::now())).unwrap();
        assert_eq!(record.status, BackupStatus::InProgress);
        assert_eq!(record.file_size, 0);
        assert_eq!(record.created_by.as_deref(), Some("owner"));

        let done = ledger.mark_success(record.id, 4096, 1.23456).unwrap();
        assert_eq!(done.status, BackupStatus::Success);
        assert_eq!(done.file_size, 4096);
        assert_eq!(done.duration_seconds, 1.23);
        assert!(done.error_message.is_none());
    }

    #[test]
    fn test_record_cannot_be_reopened() {
        let (ledger, _temp) = create_test_ledger();

        let record = ledger.open_record(&new_record("a.sqlite3", Utc::now())).unwrap();
        ledger.mark_failed(record.id, "disk full", 0.5).unwrap();

        let err = ledger.mark_success(record.id, 10, 0.1).unwrap_err();
        assert!(err.is_validation());

        let stored = ledger.require(record.id).unwrap();
        assert_eq!(stored.status, BackupStatus::Failed);
        assert_eq!(stored.error_message.as_deref(), Some("disk full"));
    }

    #[test]
    fn test_age_and_count_queries() {
        let (ledger, _temp) = create_test_ledger();
        let now = Utc::now();

        for days in [40, 20, 10, 1] {
            let r = ledger
                .open_record(&new_record(&format!("{}.sqlite3", days), now - Duration::days(days)))
                .unwrap();
            ledger.mark_success(r.id, 100, 0.1).unwrap();
        }
        let failed = ledger.open_record(&new_record("f.sqlite3", now - Duration::days(50))).unwrap();
        ledger.mark_failed(failed.id, "boom", 0.1).unwrap();

        let old = ledger.success_older_than(now - Duration::days(30)).unwrap();
        assert_eq!(old.len(), 1);
        assert_eq!(old[0].filename, "40.sqlite3");

        let oldest = ledger.oldest_success(2).unwrap();
        assert_eq!(oldest[0].filename, "40.sqlite3");
        assert_eq!(oldest[1].filename, "20.sqlite3");

        assert_eq!(ledger.count_success().unwrap(), 4);
        assert_eq!(
            ledger.summary().unwrap(),
            LedgerSummary {
                success_count: 4,
                total_bytes: 400
            }
        );

        let listed = ledger.list(Some(2)).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].filename, "1.sqlite3");
    }

    #[test]
    fn test_delete() {
        let (ledger, _temp) = create_test_ledger();

        let record = ledger.open_record(&new_record("a.sqlite3", Utc::now())).unwrap();
        assert!(ledger.delete(record.id).unwrap());
        assert!(!ledger.delete(record.id).unwrap());
        assert!(ledger.get(record.id).unwrap().is_none());
    }

    #[test]
    fn test_capture_and_replace_state() {
        let (ledger, _temp) = create_test_ledger();

        let mut config = ledger.load_configuration().unwrap();
        config.retention_days = 9;
        ledger.save_configuration(&config).unwrap();
        let kept = ledger.open_record(&new_record("kept.sqlite3", Utc::now())).unwrap();
        ledger.mark_success(kept.id, 12, 0.1).unwrap();

        let state = ledger.capture_state().unwrap();

        ledger.delete(kept.id).unwrap();
        ledger.open_record(&new_record("stray.sqlite3", Utc::now())).unwrap();
        ledger
            .save_configuration(&BackupConfiguration::default())
            .unwrap();

        ledger.replace_state(&state).unwrap();

        let records = ledger.list(None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, kept.id);
        assert_eq!(records[0].status, BackupStatus::Success);
        assert_eq!(ledger.load_configuration().unwrap().retention_days, 9);
    }

    #[test]
    fn test_replace_state_is_all_or_nothing() {
        let (ledger, _temp) = create_test_ledger();

        let kept = ledger.open_record(&new_record("kept.sqlite3", Utc::now())).unwrap();
        ledger.mark_success(kept.id, 12, 0.1).unwrap();

        let mut state = ledger.capture_state().unwrap();
        state.records.clear();
        state.configuration.retention_days = 0;

        assert!(ledger.replace_state(&state).unwrap_err().is_validation());

        let records = ledger.list(None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, kept.id);
        assert_eq!(
            ledger.load_configuration().unwrap().retention_days,
            BackupConfiguration::default().retention_days
        );
    }
}
