//! Schema sources and the Postgres SQL executor.

pub mod executor;
pub mod json;
pub mod options;
pub mod postgres;

pub use executor::{PgExecutor, classify_sqlstate};
pub use json::{JsonFileSchemaSource, schema_document_json_schema};
pub use options::IntrospectOptions;
pub use postgres::PostgresSchemaSource;

pub use dbscrub_core::{Schema, SchemaSource};
