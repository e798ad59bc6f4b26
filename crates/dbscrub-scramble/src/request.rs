use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use dbscrub_core::Schema;

use crate::error::ScrambleError;

/// Columns of one table to scramble together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrambleRequest {
    pub table: String,
    pub fields: Vec<String>,
    /// When set, only rows with these ids are read or written.
    #[serde(default)]
    pub change_only: Option<Vec<i64>>,
}

impl ScrambleRequest {
    pub fn new<I, S>(table: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table: table.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            change_only: None,
        }
    }

    pub fn change_only(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.change_only = Some(ids.into_iter().collect());
        self
    }

    pub fn validate(&self) -> Result<(), ScrambleError> {
        if self.table.trim().is_empty() {
            return Err(ScrambleError::InvalidRequest(
                "table name is empty".to_string(),
            ));
        }
        if self.fields.is_empty() {
            return Err(ScrambleError::InvalidRequest(format!(
                "no fields to scramble in `{}`",
                self.table
            )));
        }
        let mut seen = BTreeSet::new();
        for field in &self.fields {
            if field.trim().is_empty() {
                return Err(ScrambleError::InvalidRequest(format!(
                    "empty field name for `{}`",
                    self.table
                )));
            }
            if field == "id" {
                return Err(ScrambleError::InvalidRequest(format!(
                    "`{}.id` identifies rows and cannot be scrambled",
                    self.table
                )));
            }
            if !seen.insert(field.as_str()) {
                return Err(ScrambleError::InvalidRequest(format!(
                    "field `{}.{field}` listed twice",
                    self.table
                )));
            }
        }
        Ok(())
    }

    /// Check that the table and every field exist in `schema`.
    pub fn check_schema(&self, schema: &Schema) -> Result<(), ScrambleError> {
        let table = schema.table(&self.table).ok_or_else(|| {
            ScrambleError::InvalidRequest(format!("table `{}` not in schema", self.table))
        })?;
        if let Some(missing) = self.fields.iter().find(|field| table.field(field).is_none()) {
            return Err(ScrambleError::InvalidRequest(format!(
                "field `{}.{missing}` not in schema",
                self.table
            )));
        }
        Ok(())
    }
}

/// Outcome of a scramble operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScrambleReport {
    pub table: String,
    pub dry_run: bool,
    /// Rows in scope (after the `change_only` filter).
    pub rows: u64,
    /// Prime assigned to each field, in field order.
    pub factors: Vec<u64>,
    /// Distinct values staged for each field, in field order.
    pub distinct_per_field: Vec<u64>,
    pub updated: u64,
}
