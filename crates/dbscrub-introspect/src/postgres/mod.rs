use async_trait::async_trait;
use sqlx::PgPool;

use dbscrub_core::{Result, SchemaSource, Table};

use crate::options::IntrospectOptions;

mod mapper;
mod queries;

/// Schema source reading tables, fields and indexes from the Postgres catalog.
#[derive(Debug, Clone)]
pub struct PostgresSchemaSource {
    pool: PgPool,
    options: IntrospectOptions,
    name: String,
}

impl PostgresSchemaSource {
    /// Create a new source using a pre-configured pool.
    pub fn new(pool: PgPool, options: IntrospectOptions) -> Self {
        let name = format!("postgres:{}", options.namespace);
        Self {
            pool,
            options,
            name,
        }
    }
}

#[async_trait]
impl SchemaSource for PostgresSchemaSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self) -> Result<Vec<Table>> {
        introspect(&self.pool, &self.options).await
    }
}

/// Introspect a Postgres namespace according to the provided options.
pub async fn introspect(pool: &PgPool, opts: &IntrospectOptions) -> Result<Vec<Table>> {
    let raw_tables = queries::list_tables(pool, &opts.namespace).await?;
    let mut tables = Vec::new();

    for raw in mapper::filter_tables(raw_tables, opts) {
        let raw_columns = queries::list_columns(pool, &opts.namespace, &raw.physical_name).await?;
        let raw_indexes = queries::list_indexes(pool, &opts.namespace, &raw.physical_name).await?;

        tables.push(Table {
            name: raw.logical_name,
            fields: mapper::map_fields(raw_columns),
            indexes: mapper::map_indexes(raw_indexes),
        });
    }

    tables.sort_by(|left, right| left.name.cmp(&right.name));
    tracing::debug!(
        event = "catalog_introspected",
        namespace = %opts.namespace,
        tables = tables.len()
    );
    Ok(tables)
}
