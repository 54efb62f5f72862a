//! Configuration module for gastro-backup
//!
//! This module provides:
//! - Data directory and path resolution
//! - Process-level settings persistence

pub mod paths;
pub mod settings;

pub use paths::GastroPaths;
pub use settings::Settings;
