use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use gastro::cli::{handle_backup_command, handle_export_command, BackupCommands, ExportArgs};
use gastro::config::paths::{GastroPaths, DATA_DIR_ENV};
use gastro::config::settings::Settings;
use gastro::logging::init_logging;

#[derive(Parser)]
#[command(
    name = "gastro",
    author = "GastroSaaS",
    version,
    about = "Database backup, restore and export for the GastroSaaS back office",
    long_about = "gastro takes consistent snapshots of the point-of-sale database, \
                  restores them with a safety copy taken first, enforces the retention \
                  policy and installs the OS schedule that runs unattended backups."
)]
struct Cli {
    /// Data directory holding the database and backup bookkeeping
    #[arg(long, global = true, env = DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Backup management commands
    #[command(subcommand)]
    Backup(BackupCommands),

    /// Export business data as CSV sheets
    Export(ExportArgs),

    /// Show current configuration and paths
    Config,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let paths = match cli.data_dir {
        Some(dir) => GastroPaths::with_base_dir(dir),
        None => GastroPaths::new()?,
    };
    let settings = Settings::load_or_create(&paths)?;
    init_logging(if cli.verbose {
        "debug"
    } else {
        settings.log_filter.as_str()
    });

    match cli.command {
        Some(Commands::Backup(cmd)) => {
            if !handle_backup_command(&paths, &settings, cmd)? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Some(Commands::Export(args)) => {
            handle_export_command(&paths, &settings, args)?;
        }
        Some(Commands::Config) => {
            println!("gastro Configuration");
            println!("====================");
            println!("Data directory:   {}", paths.base_dir().display());
            println!("Database:         {}", settings.database_path(&paths).display());
            println!("Backup directory: {}", paths.backup_dir().display());
            println!("Settings file:    {}", paths.settings_file().display());
            println!();
            println!("Settings:");
            println!("  Log filter:        {}", settings.log_filter);
            match settings.scheduler_timeout() {
                Some(timeout) => println!("  Scheduler timeout: {}s", timeout.as_secs()),
                None => println!("  Scheduler timeout: default"),
            }
        }
        None => {
            println!("gastro - database backups for the GastroSaaS back office");
            println!();
            println!("Run 'gastro --help' for usage information.");
            println!("Run 'gastro backup create' to take a backup now.");
        }
    }

    Ok(ExitCode::SUCCESS)
}
