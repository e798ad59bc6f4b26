use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column, PgPool, Postgres, Row, TypeInfo, ValueRef};

use dbscrub_core::{SqlError, SqlErrorKind, SqlExecutor, SqlResult, SqlRow, SqlValue};

/// [`SqlExecutor`] backed by a Postgres connection pool.
///
/// Statements run in autocommit mode; a failed DDL statement does not poison
/// later ones.
#[derive(Debug, Clone)]
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    /// Create a new executor using a pre-configured pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SqlExecutor for PgExecutor {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> SqlResult<u64> {
        let result = bind_params(sqlx::query(sql), params)
            .execute(&self.pool)
            .await
            .map_err(classify_error)?;
        Ok(result.rows_affected())
    }

    async fn query_scalar(&self, sql: &str, params: &[SqlValue]) -> SqlResult<SqlValue> {
        let row = bind_params(sqlx::query(sql), params)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify_error)?;

        match row {
            Some(row) if !row.is_empty() => decode_value(&row, 0),
            _ => Ok(SqlValue::Null),
        }
    }

    async fn query_rows(&self, sql: &str, params: &[SqlValue]) -> SqlResult<Vec<SqlRow>> {
        let rows = bind_params(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await
            .map_err(classify_error)?;

        rows.iter()
            .map(|row| (0..row.len()).map(|idx| decode_value(row, idx)).collect())
            .collect()
    }
}

fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &[SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<i64>),
            SqlValue::Bool(value) => query.bind(*value),
            SqlValue::Int(value) => query.bind(*value),
            SqlValue::Float(value) => query.bind(*value),
            SqlValue::Text(value) => query.bind(value.clone()),
            SqlValue::IntList(values) => query.bind(values.clone()),
        };
    }
    query
}

/// Decode one column into a [`SqlValue`].
///
/// Integer, boolean, floating point and textual columns are supported; cast
/// anything else to `text` in the query.
fn decode_value(row: &PgRow, idx: usize) -> SqlResult<SqlValue> {
    let is_null = row.try_get_raw(idx).map_err(classify_error)?.is_null();
    if is_null {
        return Ok(SqlValue::Null);
    }

    let type_name = row.column(idx).type_info().name().to_string();
    let value = match type_name.as_str() {
        "INT2" => row.try_get::<i16, _>(idx).map(|v| SqlValue::Int(v.into())),
        "INT4" => row.try_get::<i32, _>(idx).map(|v| SqlValue::Int(v.into())),
        "INT8" => row.try_get::<i64, _>(idx).map(SqlValue::Int),
        "BOOL" => row.try_get::<bool, _>(idx).map(SqlValue::Bool),
        "FLOAT4" => row.try_get::<f32, _>(idx).map(|v| SqlValue::Float(v.into())),
        "FLOAT8" => row.try_get::<f64, _>(idx).map(SqlValue::Float),
        "INT8[]" => row.try_get::<Vec<i64>, _>(idx).map(SqlValue::IntList),
        _ => row.try_get::<String, _>(idx).map(SqlValue::Text),
    };
    value.map_err(classify_error)
}

fn classify_error(err: sqlx::Error) -> SqlError {
    let kind = match &err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .map(|code| classify_sqlstate(&code))
            .unwrap_or(SqlErrorKind::Other),
        _ => SqlErrorKind::Other,
    };
    SqlError::new(kind, err.to_string())
}

/// Map a Postgres SQLSTATE code onto an error kind.
pub fn classify_sqlstate(code: &str) -> SqlErrorKind {
    match code {
        // duplicate_table, duplicate_object, duplicate_schema
        "42P07" | "42710" | "42P06" => SqlErrorKind::AlreadyExists,
        // datatype_mismatch, undefined_function (no operator for the pair), invalid_text_representation
        "42804" | "42883" | "22P02" => SqlErrorKind::TypeMismatch,
        // undefined_table, undefined_column
        "42P01" | "42703" => SqlErrorKind::MissingRelation,
        _ => SqlErrorKind::Other,
    }
}
