use sqlx::PgPool;

use dbscrub_core::{Error, Result, SqlError};

fn db_error(err: sqlx::Error) -> Error {
    Error::Db(SqlError::other(err.to_string()))
}

pub struct RawTable {
    pub name: String,
    pub relkind: String,
}

pub async fn list_tables(pool: &PgPool, namespace: &str) -> Result<Vec<RawTable>> {
    let rows = sqlx::query_as::<_, (String, String)>(
        r#"
        select
          c.relname::text,
          c.relkind::text
        from pg_class c
        join pg_namespace n on n.oid = c.relnamespace
        where n.nspname = $1
          and c.relkind in ('r', 'p')
          and not c.relispartition
        order by c.relname
        "#,
    )
    .bind(namespace)
    .fetch_all(pool)
    .await
    .map_err(db_error)?;

    Ok(rows
        .into_iter()
        .map(|(name, relkind)| RawTable { name, relkind })
        .collect())
}

pub struct RawColumn {
    pub name: String,
    pub data_type: String,
}

pub async fn list_columns(pool: &PgPool, namespace: &str, table: &str) -> Result<Vec<RawColumn>> {
    let rows = sqlx::query_as::<_, (String, String)>(
        r#"
        select
          a.attname::text,
          pg_catalog.format_type(a.atttypid, a.atttypmod)
        from pg_attribute a
        join pg_class c on c.oid = a.attrelid
        join pg_namespace n on n.oid = c.relnamespace
        where n.nspname = $1
          and c.relname = $2
          and a.attnum > 0
          and not a.attisdropped
        order by a.attnum
        "#,
    )
    .bind(namespace)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(db_error)?;

    Ok(rows
        .into_iter()
        .map(|(name, data_type)| RawColumn { name, data_type })
        .collect())
}

pub struct RawIndex {
    pub name: String,
    pub is_unique: bool,
    pub columns: Vec<String>,
    pub has_expression: bool,
}

pub async fn list_indexes(pool: &PgPool, namespace: &str, table: &str) -> Result<Vec<RawIndex>> {
    let rows = sqlx::query_as::<_, (String, bool, Vec<String>, bool)>(
        r#"
        select
          idx.relname::text,
          i.indisunique,
          array(
            select att.attname::text
            from unnest(i.indkey::int2[]) with ordinality as k(attnum, ord)
            join pg_attribute att on att.attrelid = tbl.oid and att.attnum = k.attnum
            order by k.ord
          ),
          (0 = any(i.indkey::int2[]))
        from pg_index i
        join pg_class tbl on tbl.oid = i.indrelid
        join pg_namespace nsp on nsp.oid = tbl.relnamespace
        join pg_class idx on idx.oid = i.indexrelid
        where nsp.nspname = $1
          and tbl.relname = $2
        order by idx.relname
        "#,
    )
    .bind(namespace)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(db_error)?;

    Ok(rows
        .into_iter()
        .map(|(name, is_unique, columns, has_expression)| RawIndex {
            name,
            is_unique,
            columns,
            has_expression,
        })
        .collect())
}
