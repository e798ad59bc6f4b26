//! Per-run artifact directory: `config.json`, `logs.ndjson`, `report.json`.

mod logging;
mod run;

use std::path::PathBuf;

pub use logging::init_run_logging;
pub use run::{RunContext, RunOptions, RunPaths, start_run, write_report, write_schema};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("cannot write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot encode {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("cannot install run logging: {0}")]
    Logging(String),
}

impl RegistryError {
    fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| RegistryError::Io { path, source }
    }
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
