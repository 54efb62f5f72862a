use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use rusqlite::Connection;
use tempfile::TempDir;

fn gastro(data_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("gastro").unwrap();
    cmd.arg("--data-dir").arg(data_dir).env("GASTRO_LOG", "off");
    cmd
}

fn seed(data_dir: &Path) {
    std::fs::create_dir_all(data_dir).unwrap();
    let conn = Connection::open(data_dir.join("db.sqlite3")).unwrap();
    conn.execute_batch(
        "CREATE TABLE products_category (id INTEGER PRIMARY KEY, name TEXT, sort_order INTEGER);
         CREATE TABLE products_product (
            id INTEGER PRIMARY KEY, name TEXT, category_id INTEGER, base_price REAL,
            has_variants INTEGER, requires_preparation INTEGER, is_active INTEGER, is_featured INTEGER
         );
         INSERT INTO products_category VALUES (1, 'Pizzas', 1);
         INSERT INTO products_product VALUES (1, 'Margherita', 1, 9.5, 0, 1, 1, 0);",
    )
    .unwrap();
}

fn product_names(data_dir: &Path) -> Vec<String> {
    let conn = Connection::open(data_dir.join("db.sqlite3")).unwrap();
    let mut stmt = conn.prepare("SELECT name FROM products_product ORDER BY id").unwrap();
    let names = stmt
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<String>, _>>()
        .unwrap();
    names
}

#[test]
fn config_shows_paths() {
    let temp = TempDir::new().unwrap();
    gastro(temp.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Data directory:"))
        .stdout(predicate::str::contains("backups"));
}

#[test]
fn create_then_list() {
    let temp = TempDir::new().unwrap();
    seed(temp.path());

    gastro(temp.path())
        .args(["backup", "create", "--no-compress"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Backup created: backup_"))
        .stdout(predicate::str::contains(".sqlite3"));

    let artifacts: Vec<_> = std::fs::read_dir(temp.path().join("backups"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(artifacts.len(), 1);
    assert!(artifacts[0].starts_with("backup_"));
    assert!(artifacts[0].ends_with(".sqlite3"));

    gastro(temp.path())
        .args(["backup", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains(artifacts[0].as_str()))
        .stdout(predicate::str::contains("1 successful backup(s)"));
}

#[test]
fn failed_backup_exits_non_zero() {
    let temp = TempDir::new().unwrap();
    seed(temp.path());
    let blocked = temp.path().join("blocked");
    std::fs::write(&blocked, b"not a directory").unwrap();

    gastro(temp.path())
        .args(["backup", "create", "--dir"])
        .arg(&blocked)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Backup failed"));
}

#[test]
fn restore_requires_confirmation() {
    let temp = TempDir::new().unwrap();
    seed(temp.path());

    gastro(temp.path())
        .args(["backup", "create"])
        .assert()
        .success();

    gastro(temp.path())
        .args(["backup", "restore", "1", "--confirm", "yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Restore not confirmed"));

    gastro(temp.path())
        .args(["backup", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 successful backup(s)"));
}

#[test]
fn restore_round_trip() {
    let temp = TempDir::new().unwrap();
    seed(temp.path());

    gastro(temp.path())
        .args(["backup", "create"])
        .assert()
        .success();

    let conn = Connection::open(temp.path().join("db.sqlite3")).unwrap();
    conn.execute("INSERT INTO products_product (name) VALUES ('Calzone')", [])
        .unwrap();
    drop(conn);
    assert_eq!(product_names(temp.path()), vec!["Margherita", "Calzone"]);

    gastro(temp.path())
        .args(["backup", "restore", "1", "--confirm", "RESTORE"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Database restored from"))
        .stdout(predicate::str::contains("safety backup"));

    assert_eq!(product_names(temp.path()), vec!["Margherita"]);

    // the original backup and the safety snapshot are both still listed
    gastro(temp.path())
        .args(["backup", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 successful backup(s)"));
}

#[test]
fn restore_prompt_reads_stdin() {
    let temp = TempDir::new().unwrap();
    seed(temp.path());

    gastro(temp.path())
        .args(["backup", "create"])
        .assert()
        .success();

    gastro(temp.path())
        .args(["backup", "restore", "1"])
        .write_stdin("RESTORE\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Type RESTORE to confirm"));
}

#[test]
fn unknown_record() {
    let temp = TempDir::new().unwrap();
    seed(temp.path());

    gastro(temp.path())
        .args(["backup", "show", "42"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Backup record not found: 42"));

    gastro(temp.path())
        .args(["backup", "restore", "42", "--confirm", "RESTORE"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Backup not found or not successful."));
}

#[test]
fn delete_removes_record_and_file() {
    let temp = TempDir::new().unwrap();
    seed(temp.path());

    gastro(temp.path())
        .args(["backup", "create"])
        .assert()
        .success();

    gastro(temp.path())
        .args(["backup", "delete", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted backup #1"));

    assert_eq!(std::fs::read_dir(temp.path().join("backups")).unwrap().count(), 0);
    gastro(temp.path())
        .args(["backup", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No backups found."));
}

#[test]
fn cleanup_with_nothing_to_do() {
    let temp = TempDir::new().unwrap();
    seed(temp.path());

    gastro(temp.path())
        .args(["backup", "cleanup"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to remove"));
}

#[test]
fn config_rejects_zero_retention() {
    let temp = TempDir::new().unwrap();
    seed(temp.path());

    gastro(temp.path())
        .args(["backup", "config", "--retention-days", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("retention_days must be at least 1"));

    gastro(temp.path())
        .args(["backup", "config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Retention:       30 days"));
}

#[test]
fn export_writes_one_csv_per_sheet() {
    let temp = TempDir::new().unwrap();
    seed(temp.path());
    let out = temp.path().join("out");

    gastro(temp.path())
        .args(["export", "--days", "7", "--output"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 10 sheet(s)"));

    let products = std::fs::read_to_string(out.join("products.csv")).unwrap();
    let mut lines = products.lines();
    assert_eq!(
        lines.next(),
        Some("Name,Category,Price,Has Variants,Requires Preparation,Active,Featured")
    );
    assert_eq!(lines.next(), Some("Margherita,Pizzas,9.50,No,Yes,Yes,No"));

    let sales = std::fs::read_to_string(out.join("sales.csv")).unwrap();
    assert_eq!(sales.lines().count(), 1);
}

#[test]
fn export_without_database_fails() {
    let temp = TempDir::new().unwrap();

    gastro(temp.path())
        .arg("export")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Database not found"));
}
