//! CSV output for a [`Workbook`]
//!
//! One file per sheet, named after the sheet, header row first.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{GastroError, GastroResult};

use super::workbook::{Sheet, Workbook};

/// Write a single sheet to any writer
pub fn write_sheet_csv<W: Write>(sheet: &Sheet, writer: W) -> GastroResult<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(&sheet.headers)?;
    for row in &sheet.rows {
        csv.write_record(row.iter().map(|cell| cell.to_string()))?;
    }
    csv.flush()
        .map_err(|e| GastroError::Export(format!("Sheet {}: {}", sheet.name, e)))?;
    Ok(())
}

/// Write every sheet as `<dir>/<sheet>.csv`, creating `dir` if needed
///
/// Returns the written paths in sheet order.
pub fn write_workbook_csv(workbook: &Workbook, dir: &Path) -> GastroResult<Vec<PathBuf>> {
    fs::create_dir_all(dir).map_err(|e| {
        GastroError::Export(format!("Failed to create {}: {}", dir.display(), e))
    })?;

    let mut written = Vec::with_capacity(workbook.sheets.len());
    for sheet in &workbook.sheets {
        let path = dir.join(format!("{}.csv", sheet.file_stem()));
        let file = fs::File::create(&path).map_err(|e| {
            GastroError::Export(format!("Failed to create {}: {}", path.display(), e))
        })?;
        write_sheet_csv(sheet, file)?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::workbook::Cell;
    use crate::models::Money;
    use chrono::Utc;
    use tempfile::TempDir;

    fn sample_sheet() -> Sheet {
        let mut sheet = Sheet::new("Sale Items", &["Product", "Variants", "Line Total"]);
        sheet.push_row(vec![
            Cell::text("Pizza, large"),
            Cell::text("Extra cheese"),
            Cell::Money(Money::from_cents(1599)),
        ]);
        sheet.push_row(vec![Cell::text("Water"), Cell::Empty, Cell::Money(Money::from_cents(250))]);
        sheet
    }

    #[test]
    fn test_write_sheet_quotes_and_formats() {
        let mut out = Vec::new();
        write_sheet_csv(&sample_sheet(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "Product,Variants,Line Total");
        assert_eq!(lines[1], "\"Pizza, large\",Extra cheese,15.99");
        assert_eq!(lines[2], "Water,,2.50");
    }

    #[test]
    fn test_write_workbook_one_file_per_sheet() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("export_2026-01-01");
        let workbook = Workbook {
            sheets: vec![sample_sheet(), Sheet::new("Employees", &["First Name"])],
            generated_at: Utc::now(),
            since: None,
        };

        let written = write_workbook_csv(&workbook, &dir).unwrap();
        assert_eq!(written, vec![dir.join("sale_items.csv"), dir.join("employees.csv")]);

        let employees = fs::read_to_string(dir.join("employees.csv")).unwrap();
        assert_eq!(employees.trim_end(), "First Name");
    }
}
