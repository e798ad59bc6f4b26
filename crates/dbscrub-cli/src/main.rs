mod error;
mod registry;
mod settings;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use dbscrub_cascade::{CascadeReport, with_cascade_deletes_until};
use dbscrub_core::{SchemaLoader, SqlExecutor, redact_connection_string};
use dbscrub_introspect::{
    IntrospectOptions, JsonFileSchemaSource, PgExecutor, PostgresSchemaSource,
    schema_document_json_schema,
};
use dbscrub_scramble::{ScrambleRequest, Scrambler};
use error::{CliError, CliResult};
use registry::{RunContext, RunOptions, RunPaths, init_run_logging, start_run, write_report, write_schema};
use serde::Serialize;
use settings::{Settings, load_settings};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(
    name = "dbscrub",
    version,
    about = "Cascade-delete wiring and field scrambling for database clones"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Settings file (defaults to ./dbscrub.toml when present).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Database connection string; overrides the settings file and DATABASE_URL.
    #[arg(long, global = true, value_name = "CONNECTION_STRING")]
    conn: Option<String>,
    /// Output directory for runs.
    #[arg(long, global = true, default_value = "runs")]
    run_dir: PathBuf,
    /// Prefix of physical table names (e.g. `mdl_`).
    #[arg(long, global = true)]
    table_prefix: Option<String>,
    /// Schema descriptor file merged after introspection (repeatable).
    #[arg(long = "schema-file", global = true, value_name = "PATH")]
    schema_files: Vec<PathBuf>,
    /// Do not read tables from the database catalog.
    #[arg(long, global = true, default_value_t = false)]
    no_introspect: bool,
    /// Report what would change without mutating anything.
    #[arg(long, global = true, default_value_t = false)]
    dry_run: bool,
    /// Debug-level logs and unrelated-table listings.
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load and merge the schema, then write it to the run directory.
    Schema(SchemaArgs),
    /// Wire cascade deletes from root tables, optionally delete, then revert.
    Cascade(CascadeArgs),
    /// Scramble correlated fields of one table.
    Scramble(ScrambleArgs),
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Schema(_) => "schema",
            Command::Cascade(_) => "cascade",
            Command::Scramble(_) => "scramble",
        }
    }
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Optional output path for the merged schema document.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Print the JSON Schema of descriptor documents and exit.
    #[arg(long, default_value_t = false)]
    json_schema: bool,
}

#[derive(Args, Debug)]
struct CascadeArgs {
    /// Root table to grow the cascade graph from (repeatable).
    #[arg(long = "root", required = true, value_name = "TABLE")]
    roots: Vec<String>,
    /// Maximum recursion depth of the graph walk.
    #[arg(long)]
    max_depth: Option<usize>,
    /// Delete root rows matching this SQL predicate while cascades are in place.
    #[arg(long, value_name = "PREDICATE")]
    delete_where: Option<String>,
}

#[derive(Args, Debug)]
struct ScrambleArgs {
    #[arg(long)]
    table: String,
    /// Comma-separated fields scrambled together.
    #[arg(long, value_delimiter = ',', required = true)]
    fields: Vec<String>,
    /// Only read and rewrite rows with these ids.
    #[arg(long, value_delimiter = ',', value_name = "IDS")]
    only_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
struct CascadeRunReport {
    #[serde(flatten)]
    cascade: CascadeReport,
    /// Rows deleted (or matching, in dry-run) per root.
    deleted: BTreeMap<String, u64>,
    undo_executed: usize,
    undo_failures: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    if let Command::Schema(SchemaArgs {
        json_schema: true, ..
    }) = &cli.command
    {
        println!(
            "{}",
            serde_json::to_string_pretty(&schema_document_json_schema())?
        );
        return Ok(());
    }

    let mut settings = load_settings(cli.global.config.as_deref())?;
    apply_overrides(&mut settings, &cli.global);
    if let Command::Cascade(CascadeArgs {
        max_depth: Some(depth),
        ..
    }) = &cli.command
    {
        settings.max_depth = *depth;
    }

    let conn = connection_string(&cli.global, &settings);
    let run_id = Uuid::new_v4().to_string();
    let run_ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        run_dir: cli.global.run_dir.clone(),
        options: RunOptions {
            command: cli.command.name().to_string(),
            clean: settings.clean_options(),
            schema_version: settings.schema_version.clone(),
            schema_sources: source_names(&settings),
        },
        connection: conn.as_deref().map(redact_connection_string),
    };

    let run_paths = start_run(&run_ctx)?;
    init_run_logging(&run_paths.logs_path, settings.verbose)?;

    tracing::info!(
        event = "run_started",
        run_id = %run_id,
        command = cli.command.name(),
        dry_run = settings.dry_run
    );
    if let Some(connection) = &run_ctx.connection {
        tracing::info!(event = "connection_configured", connection = %connection);
    }

    let timer = Instant::now();
    let result = run(cli.command, &settings, conn.as_deref(), &run_paths).await;
    let duration_ms = timer.elapsed().as_millis() as u64;

    match &result {
        Ok(()) => tracing::info!(event = "run_finished", status = "success", duration_ms = duration_ms),
        Err(err) => tracing::error!(
            event = "run_finished",
            status = "failure",
            duration_ms = duration_ms,
            error = %err
        ),
    }
    result
}

async fn run(
    command: Command,
    settings: &Settings,
    conn: Option<&str>,
    paths: &RunPaths,
) -> CliResult<()> {
    let pool = match conn {
        Some(conn) => Some(connect(conn).await?),
        None => None,
    };
    let loader = build_loader(settings, pool.as_ref())?;

    match command {
        Command::Schema(args) => run_schema(args, &loader, paths).await,
        Command::Cascade(args) => {
            let pool = require_pool(pool)?;
            run_cascade(args, settings, pool, &loader, paths).await
        }
        Command::Scramble(args) => {
            let pool = require_pool(pool)?;
            run_scramble(args, settings, pool, &loader, paths).await
        }
    }
}

async fn run_schema(args: SchemaArgs, loader: &SchemaLoader, paths: &RunPaths) -> CliResult<()> {
    let schema = loader.load_schema().await?;
    let document = schema.to_document();
    write_schema(paths, &document, args.out.as_deref())?;
    tracing::info!(
        event = "schema_written",
        tables = schema.len(),
        path = %paths.schema_path.display()
    );
    Ok(())
}

async fn run_cascade(
    args: CascadeArgs,
    settings: &Settings,
    pool: PgPool,
    loader: &SchemaLoader,
    paths: &RunPaths,
) -> CliResult<()> {
    let executor = PgExecutor::new(pool);
    let options = settings.clean_options();
    let roots: Vec<&str> = args.roots.iter().map(String::as_str).collect();

    let body_options = options.clone();
    let targets = args.roots.clone();
    let predicate = args.delete_where;

    let outcome = with_cascade_deletes_until(
        &executor,
        loader,
        options,
        &roots,
        shutdown_signal(),
        |db| async move {
            let mut deleted = BTreeMap::new();
            let Some(predicate) = predicate else {
                return Ok(deleted);
            };
            for root in targets {
                let table = body_options.table_ident(&root);
                let rows = if body_options.dry_run {
                    let sql = format!("SELECT COUNT(*) FROM {table} WHERE {predicate}");
                    let rows = db.count(&sql, &[]).await?;
                    tracing::info!(event = "would_delete", table = %root, rows = rows);
                    rows
                } else {
                    let sql = format!("DELETE FROM {table} WHERE {predicate}");
                    let rows = db.execute(&sql, &[]).await?;
                    tracing::info!(event = "rows_deleted", table = %root, rows = rows);
                    rows
                };
                deleted.insert(root, rows);
            }
            Ok::<_, CliError>(deleted)
        },
    )
    .await;

    if !outcome.revert.is_clean() {
        tracing::warn!(
            event = "revert_failures",
            count = outcome.revert.failures.len(),
            "some schema changes could not be reverted; see undo_failures in report.json"
        );
    }

    let (deleted, error) = match outcome.result {
        Ok(deleted) => (deleted, None),
        Err(err) => (BTreeMap::new(), Some(err)),
    };
    let report = CascadeRunReport {
        cascade: outcome.report,
        deleted,
        undo_executed: outcome.revert.executed,
        undo_failures: outcome
            .revert
            .failures
            .iter()
            .map(ToString::to_string)
            .collect(),
        error: error.as_ref().map(ToString::to_string),
    };
    write_report(paths, &report)?;
    tracing::info!(event = "report_written", path = %paths.report_path.display());

    match error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn run_scramble(
    args: ScrambleArgs,
    settings: &Settings,
    pool: PgPool,
    loader: &SchemaLoader,
    paths: &RunPaths,
) -> CliResult<()> {
    let mut request = ScrambleRequest::new(args.table, args.fields);
    if !args.only_ids.is_empty() {
        request = request.change_only(args.only_ids);
    }

    if has_schema_sources(settings) {
        let schema = loader.load_schema().await?;
        request.check_schema(&schema)?;
    }

    let executor = PgExecutor::new(pool);
    let report = Scrambler::new(&executor, settings.clean_options())
        .execute_until(&request, shutdown_signal())
        .await?;

    write_report(paths, &report)?;
    tracing::info!(event = "report_written", path = %paths.report_path.display());
    Ok(())
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(event = "signal_handler_failed", error = %err);
        std::future::pending::<()>().await;
    }
    tracing::warn!(event = "interrupt_received");
}

fn apply_overrides(settings: &mut Settings, global: &GlobalArgs) {
    if let Some(prefix) = &global.table_prefix {
        settings.table_prefix = prefix.clone();
    }
    settings.schema_files.extend(global.schema_files.iter().cloned());
    settings.introspect &= !global.no_introspect;
    settings.dry_run |= global.dry_run;
    settings.verbose |= global.verbose;
}

fn connection_string(global: &GlobalArgs, settings: &Settings) -> Option<String> {
    global
        .conn
        .clone()
        .or_else(|| settings.database_url.clone())
        .or_else(|| std::env::var("DATABASE_URL").ok())
}

fn has_schema_sources(settings: &Settings) -> bool {
    settings.introspect || !settings.schema_files.is_empty()
}

fn source_names(settings: &Settings) -> Vec<String> {
    let mut names = Vec::new();
    if settings.introspect {
        names.push(format!("postgres:{}", settings.namespace));
    }
    names.extend(
        settings
            .schema_files
            .iter()
            .map(|path| format!("file:{}", path.display())),
    );
    names
}

fn build_loader(settings: &Settings, pool: Option<&PgPool>) -> CliResult<SchemaLoader> {
    let mut loader = SchemaLoader::new(settings.schema_version.clone());

    if settings.introspect {
        let pool = pool.ok_or_else(|| {
            CliError::InvalidConfig(
                "introspection needs a connection string (or pass --no-introspect)".to_string(),
            )
        })?;
        loader = loader.with_source(PostgresSchemaSource::new(
            pool.clone(),
            IntrospectOptions {
                namespace: settings.namespace.clone(),
                table_prefix: settings.table_prefix.clone(),
                ..IntrospectOptions::default()
            },
        ));
    }

    for path in &settings.schema_files {
        loader = loader.with_source(JsonFileSchemaSource::new(path.clone()));
    }

    Ok(loader)
}

fn require_pool(pool: Option<PgPool>) -> CliResult<PgPool> {
    pool.ok_or_else(|| CliError::InvalidConfig("connection string is required".to_string()))
}

async fn connect(conn: &str) -> CliResult<PgPool> {
    let engine = detect_engine(conn)?;
    tracing::info!(event = "engine_detected", engine = %engine);

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect(conn)
        .await?;
    Ok(pool)
}

fn detect_engine(conn: &str) -> CliResult<&'static str> {
    if conn.starts_with("postgres://") || conn.starts_with("postgresql://") {
        Ok("postgres")
    } else {
        Err(CliError::UnsupportedEngine(redact_connection_string(conn)))
    }
}
