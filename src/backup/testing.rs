//! Shared fixtures for backup tests

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use tempfile::TempDir;

use crate::config::paths::GastroPaths;
use crate::models::{BackupRecord, BackupTrigger};
use crate::storage::database::Database;

use super::ledger::{Ledger, NewRecord};
use super::restore::RestoreEngine;
use super::retention::RetentionManager;
use super::snapshot::SnapshotEngine;

/// A data directory with a live database inside a temp dir
pub struct TestEnv {
    pub temp: TempDir,
    pub paths: GastroPaths,
    pub database: Database,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let paths = GastroPaths::with_base_dir(temp.path().join("data"));
        paths.ensure_directories().unwrap();
        let database = Database::new(paths.database_file());
        database.open().unwrap();
        Self {
            temp,
            paths,
            database,
        }
    }

    pub fn ledger(&self) -> Ledger {
        Ledger::open(&self.database).unwrap()
    }

    pub fn snapshot(&self) -> SnapshotEngine {
        SnapshotEngine::new(self.paths.clone(), self.database.clone())
    }

    pub fn restore(&self) -> RestoreEngine {
        RestoreEngine::new(self.paths.clone(), self.database.clone())
    }

    pub fn retention(&self) -> RetentionManager {
        RetentionManager::new(self.database.clone())
    }

    pub fn live(&self) -> Connection {
        Connection::open(self.database.path()).unwrap()
    }

    /// Replace the contents of a small `products` table in the live database
    pub fn seed_products(&self, names: &[&str]) {
        let conn = self.live();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS products (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
             DELETE FROM products;",
        )
        .unwrap();
        for name in names {
            conn.execute("INSERT INTO products (name) VALUES (?1)", [name])
                .unwrap();
        }
    }

    /// Write an artifact of `size` bytes and a matching success record
    pub fn add_artifact(&self, name: &str, created_at: DateTime<Utc>, size: u64) -> BackupRecord {
        let dir = self.paths.backup_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, vec![0u8; size as usize]).unwrap();

        let ledger = self.ledger();
        let record = ledger
            .open_record(&NewRecord {
                filename: name.to_string(),
                file_path: path,
                trigger: BackupTrigger::Scheduled,
                created_by: None,
                created_at,
            })
            .unwrap();
        ledger.mark_success(record.id, size, 0.5).unwrap()
    }

    /// Same as [`TestEnv::add_artifact`] but dated `days` ago
    pub fn add_aged_artifact(&self, name: &str, days: i64, size: u64) -> BackupRecord {
        self.add_artifact(name, Utc::now() - Duration::days(days), size)
    }
}

/// Product names in the given database, sorted
pub fn read_products(conn: &Connection) -> Vec<String> {
    let mut stmt = conn
        .prepare("SELECT name FROM products ORDER BY name")
        .unwrap();
    let rows = stmt.query_map([], |row| row.get(0)).unwrap();
    rows.collect::<Result<Vec<String>, _>>().unwrap()
}
