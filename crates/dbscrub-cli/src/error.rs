use dbscrub_cascade::CascadeError;
use dbscrub_core::{Error as CoreError, SqlError};
use dbscrub_scramble::ScrambleError;
use thiserror::Error;

use crate::registry::RegistryError;
use crate::settings::SettingsError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("cascade error: {0}")]
    Cascade(#[from] CascadeError),
    #[error("scramble error: {0}")]
    Scramble(#[from] ScrambleError),
    #[error("sql error: {0}")]
    Sql(#[from] SqlError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unsupported engine: {0}")]
    UnsupportedEngine(String),
}

pub type CliResult<T> = Result<T, CliError>;
