use thiserror::Error;

use dbscrub_core::{SqlError, SqlErrorKind};

/// Errors that abort a cascade run.
#[derive(Debug, Error)]
pub enum CascadeError {
    /// The schema could not be loaded; no graph can be built without it.
    #[error(transparent)]
    Schema(#[from] dbscrub_core::Error),
    /// The run was interrupted before the caller's work completed.
    #[error("cascade run interrupted")]
    Interrupted,
}

/// Why a candidate relationship did not become a constraint.
///
/// Rejections are logged and counted; they never abort the graph walk.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EdgeRejection {
    /// The constraint already exists; nothing was added, nothing to undo.
    #[error("constraint already exists: {0}")]
    Conflict(String),
    #[error("column types are incompatible: {0}")]
    TypeMismatch(String),
    /// The child table or column is absent (schema drift or pending upgrade).
    #[error("relation is missing: {0}")]
    MissingRelation(String),
    /// Too many orphaned rows to treat the field as a foreign key.
    #[error("{mismatches} of {total} rows have no parent; not a real foreign key")]
    Integrity { mismatches: u64, total: u64 },
    #[error("database error: {0}")]
    Db(String),
}

impl From<SqlError> for EdgeRejection {
    fn from(err: SqlError) -> Self {
        match err.kind {
            SqlErrorKind::AlreadyExists => EdgeRejection::Conflict(err.message),
            SqlErrorKind::TypeMismatch => EdgeRejection::TypeMismatch(err.message),
            SqlErrorKind::MissingRelation => EdgeRejection::MissingRelation(err.message),
            SqlErrorKind::Other => EdgeRejection::Db(err.message),
        }
    }
}
