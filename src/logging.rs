//! Structured Logging Setup
//!
//! Installs the global `tracing` subscriber. Logs go to stderr so the
//! console's stdout stays reserved for the operator.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` wins, `level` is the default directive
pub fn build_filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

/// Install the global subscriber in the given format (json, pretty, compact)
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(level: Level, format: &str) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(build_filter(level))
        .with_writer(std::io::stderr);

    let result = match format.to_lowercase().as_str() {
        "json" => builder.json().try_init(),
        "pretty" => builder.pretty().try_init(),
        _ => builder.compact().try_init(),
    };

    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}
