//! Storage layer for gastro-backup
//!
//! Provides the live-database handle (with the backup bookkeeping schema) and
//! atomic file helpers shared by settings and backup artifacts.

pub mod database;
pub mod file_io;

pub use database::{ensure_schema, open_connection, table_exists, Database};
pub use file_io::{read_json, remove_file_if_exists, rename_into_place, write_json_atomic};
