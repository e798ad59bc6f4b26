use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;

use super::{RegistryError, RegistryResult};

/// JSON-lines events to the run log plus a human-readable stream on stderr.
///
/// `RUST_LOG` overrides the level; otherwise `verbose` selects debug over info.
pub fn init_run_logging(path: &Path, verbose: bool) -> RegistryResult<()> {
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(RegistryError::io(path))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    let run_log = tracing_subscriber::fmt::layer()
        .json()
        .with_timer(UtcTime::rfc_3339())
        .with_writer(Arc::new(log_file));

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(run_log)
        .with(console)
        .try_init()
        .map_err(|err| RegistryError::Logging(err.to_string()))
}
