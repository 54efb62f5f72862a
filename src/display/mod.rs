//! Display formatting for terminal output
//!
//! Renders ledger records, configuration and run results for the CLI.

pub mod backup;

pub use backup::{
    format_age, format_configuration, format_elapsed, format_record_details,
    format_record_table, format_retention, format_schedule_status,
};
