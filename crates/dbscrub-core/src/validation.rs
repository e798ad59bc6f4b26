use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::schema::Table;

/// Validate the tables produced by a single schema source.
///
/// This checks:
/// - empty or duplicate table names
/// - empty or duplicate field names within a table
/// - index columns that are not fields of their table
pub fn validate_tables(tables: &[Table]) -> Result<()> {
    let mut table_names = BTreeSet::new();

    for table in tables {
        if table.name.trim().is_empty() {
            return Err(Error::InvalidSchema("table with empty name".to_string()));
        }
        if !table_names.insert(table.name.as_str()) {
            return Err(Error::InvalidSchema(format!(
                "duplicate table name: {}",
                table.name
            )));
        }

        let mut fields = BTreeSet::new();
        for field in &table.fields {
            if field.name.trim().is_empty() {
                return Err(Error::InvalidSchema(format!(
                    "field with empty name in table {}",
                    table.name
                )));
            }
            if !fields.insert(field.name.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate field name: {}.{}",
                    table.name, field.name
                )));
            }
        }

        for index in &table.indexes {
            if index.fields.is_empty() {
                return Err(Error::InvalidSchema(format!(
                    "index {} on {} covers no fields",
                    index.name, table.name
                )));
            }
            for column in &index.fields {
                if !fields.contains(column.as_str()) {
                    return Err(Error::InvalidSchema(format!(
                        "index column not found: {}.{} ({})",
                        table.name, column, index.name
                    )));
                }
            }
        }
    }

    Ok(())
}
