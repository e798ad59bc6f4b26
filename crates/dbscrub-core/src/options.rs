use serde::{Deserialize, Serialize};

use crate::sql::quote_ident;

/// Runtime options consulted by the cleaners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanOptions {
    /// Report what would happen without issuing any mutating statement.
    pub dry_run: bool,
    /// Emit extra reporting (e.g. tables left unrelated after a cascade run).
    pub verbose: bool,
    /// Maximum recursion depth of the cascade graph walk.
    pub max_depth: usize,
    /// Prefix prepended to logical table names to form physical names.
    pub table_prefix: String,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            verbose: false,
            max_depth: 32,
            table_prefix: String::new(),
        }
    }
}

impl CleanOptions {
    /// Physical (prefixed, unquoted) name of a logical table.
    pub fn physical_name(&self, table: &str) -> String {
        format!("{}{table}", self.table_prefix)
    }

    /// Quoted physical name of a logical table, ready to splice into SQL.
    pub fn table_ident(&self, table: &str) -> String {
        quote_ident(&self.physical_name(table))
    }
}
