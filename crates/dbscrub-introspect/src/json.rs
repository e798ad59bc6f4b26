use std::path::{Path, PathBuf};

use async_trait::async_trait;
use jsonschema::JSONSchema;
use schemars::schema_for;
use serde_json::Value;

use dbscrub_core::{Error, Result, SchemaDocument, SchemaSource, Table};

/// Emit the JSON Schema describing schema descriptor documents.
pub fn schema_document_json_schema() -> Value {
    serde_json::to_value(schema_for!(SchemaDocument)).unwrap_or(Value::Null)
}

/// Schema source reading a JSON schema descriptor document from disk.
#[derive(Debug, Clone)]
pub struct JsonFileSchemaSource {
    path: PathBuf,
    name: String,
}

impl JsonFileSchemaSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = format!("file:{}", path.display());
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SchemaSource for JsonFileSchemaSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self) -> Result<Vec<Table>> {
        let contents = std::fs::read_to_string(&self.path)?;
        let document = parse_document(&contents)?;
        Ok(document.tables)
    }
}

/// Parse and structurally validate a schema descriptor document.
pub fn parse_document(contents: &str) -> Result<SchemaDocument> {
    let value: Value = serde_json::from_str(contents)?;
    let schema = schema_document_json_schema();

    let compiled =
        JSONSchema::compile(&schema).map_err(|err| Error::Other(err.to_string()))?;

    if let Err(errors) = compiled.validate(&value) {
        let issues: Vec<String> = errors
            .map(|error| format!("{}: {error}", pointer_or_root(&error.instance_path.to_string())))
            .collect();
        return Err(Error::InvalidSchema(issues.join("; ")));
    }

    Ok(serde_json::from_value(value)?)
}

fn pointer_or_root(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "dbscrub-json-source-{}-{label}.json",
            std::process::id()
        ))
    }

    #[test]
    fn parses_valid_document() {
        let document = parse_document(
            r#"{
              "tables": [
                {
                  "name": "log",
                  "fields": [
                    {"name": "id", "type": "bigint"},
                    {"name": "userid", "type": "bigint"}
                  ],
                  "indexes": [{"name": "log_use_ix", "fields": ["userid"]}]
                }
              ]
            }"#,
        )
        .expect("valid document");

        assert_eq!(document.tables[0].name, "log");
        assert_eq!(document.tables[0].indexes[0].fields, vec!["userid"]);
    }

    #[test]
    fn rejects_structurally_invalid_document() {
        let err = parse_document(r#"{"tables": [{"name": "log"}]}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidSchema(_)));
        assert!(err.to_string().contains("/tables/0"));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(parse_document("{"), Err(Error::Json(_))));
    }

    #[tokio::test]
    async fn loads_tables_from_file() {
        let path = temp_path("load");
        std::fs::write(
            &path,
            r#"{"tables": [{"name": "user", "fields": [{"name": "id", "type": "bigint"}]}]}"#,
        )
        .unwrap();

        let source = JsonFileSchemaSource::new(&path);
        let tables = source.load().await.unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "user");
        assert!(source.name().starts_with("file:"));
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let source = JsonFileSchemaSource::new(temp_path("missing"));
        assert!(matches!(source.load().await, Err(Error::Io(_))));
    }
}
