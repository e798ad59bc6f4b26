//! Core contracts and helpers for dbscrub.
//!
//! This crate defines the schema model, the collaborator contracts the
//! cleaners consume (SQL execution and schema sources), runtime options and
//! the error taxonomy shared across the workspace.

pub mod error;
pub mod executor;
pub mod loader;
pub mod options;
pub mod progress;
pub mod redaction;
pub mod schema;
pub mod sql;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod validation;

pub use error::{Error, Result, SqlError, SqlErrorKind, SqlResult};
pub use executor::{SqlExecutor, SqlRow, SqlValue};
pub use loader::{SchemaCache, SchemaLoader, SchemaSource};
pub use options::CleanOptions;
pub use progress::Progress;
pub use redaction::redact_connection_string;
pub use schema::{Field, Index, Schema, SchemaDocument, Table};
pub use sql::{quote_ident, truncate_identifier};
pub use validation::validate_tables;

/// Current contract version for schema descriptor documents.
pub const SCHEMA_DOCUMENT_VERSION: &str = "0.1";
