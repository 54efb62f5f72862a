//! Logging setup
//!
//! Events go to stderr so stdout stays clean for command output.

use tracing_subscriber::EnvFilter;

/// Environment variable overriding the configured filter
pub const LOG_ENV: &str = "GASTRO_LOG";

/// Resolve the filter: `GASTRO_LOG` when set, otherwise `fallback`
pub fn build_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global fmt subscriber
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(fallback: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(fallback))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
