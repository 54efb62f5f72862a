//! CLI command for the business data export

use std::path::PathBuf;

use chrono::Local;
use clap::Args;

use crate::backup::Ledger;
use crate::config::paths::GastroPaths;
use crate::config::settings::Settings;
use crate::error::{GastroError, GastroResult};
use crate::export::{default_export_dir, export_workbook, write_workbook_csv};
use crate::storage::Database;

/// Arguments for `gastro export`
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Only include dated records from the last N days
    #[arg(short, long)]
    pub days: Option<u32>,

    /// Output directory (default: <backup dir>/export_<date>)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Handle the export command
pub fn handle_export_command(
    paths: &GastroPaths,
    settings: &Settings,
    args: ExportArgs,
) -> GastroResult<()> {
    let database = Database::new(settings.database_path(paths));
    if !database.path().exists() {
        return Err(GastroError::Export(format!(
            "Database not found: {}",
            database.path().display()
        )));
    }

    let output = match args.output {
        Some(dir) => dir,
        None => {
            let backup_dir = Ledger::open(&database)?
                .load_configuration()?
                .backup_dir(paths);
            default_export_dir(&backup_dir, Local::now().date_naive())
        }
    };

    let conn = database.open_raw()?;
    let workbook = export_workbook(&conn, args.days)?;
    let written = write_workbook_csv(&workbook, &output)?;

    println!("Exported {} sheet(s) to {}", written.len(), output.display());
    for sheet in &workbook.sheets {
        println!("  {:<16} {:>6} row(s)", sheet.name, sheet.len());
    }
    if let Some(days) = args.days {
        println!("Dated sheets limited to the last {} day(s).", days);
    }
    Ok(())
}
