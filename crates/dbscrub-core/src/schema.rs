use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// On-disk schema descriptor: the unit a schema source produces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SchemaDocument {
    pub tables: Vec<Table>,
}

/// A table with its fields (in declaration order) and indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Table {
    pub name: String,
    pub fields: Vec<Field>,
    #[serde(default)]
    pub indexes: Vec<Index>,
}

/// A column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
}

/// Index covering an ordered list of fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Index {
    pub name: String,
    pub fields: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Builder-style helper used by sources and tests.
    pub fn with_field(mut self, name: impl Into<String>, field_type: impl Into<String>) -> Self {
        self.fields.push(Field {
            name: name.into(),
            field_type: field_type.into(),
        });
        self
    }

    pub fn with_index(mut self, name: impl Into<String>, fields: &[&str]) -> Self {
        self.indexes.push(Index {
            name: name.into(),
            fields: fields.iter().map(|field| field.to_string()).collect(),
            unique: false,
        });
        self
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Index covering exactly the given field and nothing else.
    pub fn single_field_index(&self, field: &str) -> Option<&Index> {
        self.indexes
            .iter()
            .find(|index| index.fields.len() == 1 && index.fields[0] == field)
    }
}

/// Merged, immutable view of every table known for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    version: String,
    tables: BTreeMap<String, Table>,
}

impl Schema {
    /// Build a schema; a later table with a duplicate name replaces the earlier one.
    pub fn new(version: impl Into<String>, tables: impl IntoIterator<Item = Table>) -> Self {
        let mut by_name = BTreeMap::new();
        for table in tables {
            by_name.insert(table.name.clone(), table);
        }
        Self {
            version: version.into(),
            tables: by_name,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Tables ordered by name.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Fields of a table; empty when the table is unknown.
    pub fn fields_of<'a>(&'a self, table: &str) -> impl Iterator<Item = &'a Field> {
        self.tables
            .get(table)
            .into_iter()
            .flat_map(|table| table.fields.iter())
    }

    /// Indexes of a table; empty when the table is unknown.
    pub fn indexes_of<'a>(&'a self, table: &str) -> impl Iterator<Item = &'a Index> {
        self.tables
            .get(table)
            .into_iter()
            .flat_map(|table| table.indexes.iter())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Serializable snapshot of the merged schema.
    pub fn to_document(&self) -> SchemaDocument {
        SchemaDocument {
            tables: self.tables.values().cloned().collect(),
        }
    }
}
