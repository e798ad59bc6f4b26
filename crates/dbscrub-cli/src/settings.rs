use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use dbscrub_core::CleanOptions;

pub const DEFAULT_SETTINGS_FILE: &str = "dbscrub.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("io error reading {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("toml decode error in {path}: {source}")]
    TomlDecode {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Contents of `dbscrub.toml`; every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_url: Option<String>,
    pub table_prefix: String,
    /// Cache key for the merged schema of this run.
    pub schema_version: String,
    /// Schema descriptor documents merged after introspection.
    pub schema_files: Vec<PathBuf>,
    /// Read tables from the live database catalog.
    pub introspect: bool,
    pub namespace: String,
    pub max_depth: usize,
    pub dry_run: bool,
    pub verbose: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let clean = CleanOptions::default();
        Self {
            database_url: None,
            table_prefix: clean.table_prefix,
            schema_version: "live".to_string(),
            schema_files: Vec::new(),
            introspect: true,
            namespace: "public".to_string(),
            max_depth: clean.max_depth,
            dry_run: clean.dry_run,
            verbose: clean.verbose,
        }
    }
}

impl Settings {
    pub fn clean_options(&self) -> CleanOptions {
        CleanOptions {
            dry_run: self.dry_run,
            verbose: self.verbose,
            max_depth: self.max_depth,
            table_prefix: self.table_prefix.clone(),
        }
    }
}

/// Load settings from `path`; a missing default file yields the defaults.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, SettingsError> {
    let (path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_SETTINGS_FILE), false),
    };

    if !required && !path.exists() {
        return Ok(Settings::default());
    }

    let content = std::fs::read_to_string(&path).map_err(|source| SettingsError::Io {
        path: path.clone(),
        source,
    })?;
    parse_settings(&content).map_err(|source| SettingsError::TomlDecode { path, source })
}

pub fn parse_settings(content: &str) -> Result<Settings, toml::de::Error> {
    toml::from_str(content)
}
