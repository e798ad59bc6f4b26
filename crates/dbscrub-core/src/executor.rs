use async_trait::async_trait;

use crate::error::{SqlError, SqlResult};

/// Dynamically typed value passed to or returned from a SQL executor.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Bound as an array parameter (e.g. `id = ANY($1)`).
    IntList(Vec<i64>),
}

impl SqlValue {
    /// Interpret the value as an integer when it has an integral form.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(value) => Some(*value),
            SqlValue::Bool(value) => Some(i64::from(*value)),
            SqlValue::Text(value) => value.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<Vec<i64>> for SqlValue {
    fn from(value: Vec<i64>) -> Self {
        SqlValue::IntList(value)
    }
}

/// A result row, columns in select-list order.
pub type SqlRow = Vec<SqlValue>;

/// Collaborator contract for running SQL against the target database.
///
/// Implementations must classify failures into [`crate::SqlErrorKind`]s; the
/// cascade builder's control flow depends on telling them apart.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Run a statement and return the number of affected rows.
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> SqlResult<u64>;

    /// Run a query and return the first column of the first row.
    ///
    /// Returns [`SqlValue::Null`] when the query yields no rows.
    async fn query_scalar(&self, sql: &str, params: &[SqlValue]) -> SqlResult<SqlValue>;

    /// Run a query and return every row.
    async fn query_rows(&self, sql: &str, params: &[SqlValue]) -> SqlResult<Vec<SqlRow>>;

    /// Run a `COUNT(*)`-style query and return a non-negative count.
    async fn count(&self, sql: &str, params: &[SqlValue]) -> SqlResult<u64> {
        let value = self.query_scalar(sql, params).await?;
        value
            .as_i64()
            .and_then(|count| u64::try_from(count).ok())
            .ok_or_else(|| SqlError::other(format!("expected a row count, got {value:?}")))
    }
}
