//! Business data export
//!
//! Reads the point-of-sale tables of the live database into a [`Workbook`]
//! of typed sheets and writes it as one CSV file per sheet.
//!
//! ```rust,ignore
//! let conn = database.open_raw()?;
//! let workbook = export_workbook(&conn, Some(30))?;
//! write_workbook_csv(&workbook, &default_export_dir(&backup_dir, Local::now().date_naive()))?;
//! ```

pub mod csv;
mod sources;
pub mod workbook;

use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate, Utc};
use rusqlite::Connection;
use tracing::info;

use crate::error::GastroResult;

pub use self::csv::{write_sheet_csv, write_workbook_csv};
pub use sources::decode_variant_ids;
pub use workbook::{Cell, Sheet, Workbook};

/// Build every sheet, limiting dated sheets to the last `since_days` days
pub fn export_workbook(conn: &Connection, since_days: Option<u32>) -> GastroResult<Workbook> {
    let generated_at = Utc::now();
    let since = since_days.map(|days| generated_at - Duration::days(i64::from(days)));
    let lookups = sources::Lookups::load(conn)?;

    let sheets = sources::sheet_sources()
        .iter()
        .map(|source| source.materialize(conn, &lookups, since))
        .collect::<GastroResult<Vec<_>>>()?;

    let workbook = Workbook {
        sheets,
        generated_at,
        since,
    };
    info!(
        sheets = workbook.sheets.len(),
        rows = workbook.total_rows(),
        ?since_days,
        "workbook exported"
    );
    Ok(workbook)
}

/// Default output directory: `<backup dir>/export_<YYYY-MM-DD>`
pub fn default_export_dir(backup_dir: &Path, date: NaiveDate) -> PathBuf {
    backup_dir.join(format!("export_{}", date.format("%Y-%m-%d")))
}
