use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;

/// Installs the global fmt subscriber. `RUST_LOG` takes precedence over
/// the configured filter.
pub fn init_logging(settings: &LoggingSettings) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&settings.filter))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_target(true)
        .try_init()
        .map_err(|err| anyhow!("Failed to install log subscriber: {err}"))
}
