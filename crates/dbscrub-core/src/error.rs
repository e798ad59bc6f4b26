use std::fmt;

use thiserror::Error;

/// Core error type shared across dbscrub crates.
#[derive(Debug, Error)]
pub enum Error {
    /// A schema source is missing or malformed. Fatal for a cascade run.
    #[error("schema load error: {0}")]
    SchemaLoad(String),
    /// The schema violates internal invariants.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// Database error surfaced by a SQL executor.
    #[error("database error: {0}")]
    Db(#[from] SqlError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// Catch-all error for unexpected failures.
    #[error("other error: {0}")]
    Other(String),
}

/// Convenience alias for results returned by dbscrub crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Category of a database failure.
///
/// Executors classify driver errors into these kinds so callers can branch on
/// the kind instead of inspecting message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlErrorKind {
    /// The object being created (index, constraint, table) already exists.
    AlreadyExists,
    /// Column types are incompatible for the requested operation.
    TypeMismatch,
    /// A referenced table or column does not exist.
    MissingRelation,
    Other,
}

impl fmt::Display for SqlErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SqlErrorKind::AlreadyExists => "already exists",
            SqlErrorKind::TypeMismatch => "type mismatch",
            SqlErrorKind::MissingRelation => "missing relation",
            SqlErrorKind::Other => "sql error",
        };
        f.write_str(label)
    }
}

/// Classified error returned by [`crate::SqlExecutor`] implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct SqlError {
    pub kind: SqlErrorKind,
    pub message: String,
}

impl SqlError {
    pub fn new(kind: SqlErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(SqlErrorKind::AlreadyExists, message)
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(SqlErrorKind::TypeMismatch, message)
    }

    pub fn missing_relation(message: impl Into<String>) -> Self {
        Self::new(SqlErrorKind::MissingRelation, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(SqlErrorKind::Other, message)
    }
}

/// Result alias for executor calls.
pub type SqlResult<T> = std::result::Result<T, SqlError>;
