use std::fs::{File, OpenOptions, create_dir_all};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use chrono::{DateTime, Utc};
use serde::Serialize;

use dbscrub_core::CleanOptions;

use super::{RegistryError, RegistryResult};

/// What a run was asked to do, recorded in `config.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunOptions {
    pub command: String,
    pub clean: CleanOptions,
    pub schema_version: String,
    pub schema_sources: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub run_dir: PathBuf,
    pub options: RunOptions,
    /// Connection string, already redacted.
    pub connection: Option<String>,
}

#[derive(Debug, Serialize)]
struct RunConfig<'a> {
    run_id: &'a str,
    started_at: String,
    options: &'a RunOptions,
    connection: Option<&'a str>,
    git: GitInfo,
}

#[derive(Debug, Serialize)]
struct GitInfo {
    commit: Option<String>,
    dirty: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct RunPaths {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub logs_path: PathBuf,
    pub report_path: PathBuf,
    pub schema_path: PathBuf,
}

impl RunPaths {
    fn under(root: PathBuf) -> Self {
        Self {
            config_path: root.join("config.json"),
            logs_path: root.join("logs.ndjson"),
            report_path: root.join("report.json"),
            schema_path: root.join("schema.json"),
            root,
        }
    }
}

/// Create `<run_dir>/<timestamp>__<command>_<run_id>/` with its config and an empty log.
pub fn start_run(ctx: &RunContext) -> RegistryResult<RunPaths> {
    let stamp = ctx.started_at.format("%Y-%m-%dT%H-%M-%SZ");
    let paths = RunPaths::under(ctx.run_dir.join(format!(
        "{stamp}__{}_{}",
        ctx.options.command, ctx.run_id
    )));
    create_dir_all(&paths.root).map_err(RegistryError::io(&paths.root))?;

    let config = RunConfig {
        run_id: &ctx.run_id,
        started_at: ctx.started_at.to_rfc3339(),
        options: &ctx.options,
        connection: ctx.connection.as_deref(),
        git: git_info(),
    };
    write_json(&paths.config_path, &config)?;

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.logs_path)
        .map_err(RegistryError::io(&paths.logs_path))?;

    Ok(paths)
}

pub fn write_report<T: Serialize>(paths: &RunPaths, report: &T) -> RegistryResult<()> {
    write_json(&paths.report_path, report)
}

/// Write the merged schema into the run directory and, optionally, to `out`.
pub fn write_schema<T: Serialize>(paths: &RunPaths, schema: &T, out: Option<&Path>) -> RegistryResult<()> {
    write_json(&paths.schema_path, schema)?;
    let Some(out) = out else {
        return Ok(());
    };
    if let Some(parent) = out.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        create_dir_all(parent).map_err(RegistryError::io(parent))?;
    }
    write_json(out, schema)
}

fn git_info() -> GitInfo {
    let commit = git(&["rev-parse", "HEAD"])
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .filter(|commit| !commit.is_empty());
    let dirty = git(&["status", "--porcelain"]).map(|output| !output.stdout.is_empty());
    GitInfo { commit, dirty }
}

fn git(args: &[&str]) -> Option<Output> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> RegistryResult<()> {
    let file = File::create(path).map_err(RegistryError::io(path))?;
    serde_json::to_writer_pretty(file, value).map_err(|source| RegistryError::Encode {
        path: path.to_path_buf(),
        source,
    })
}
