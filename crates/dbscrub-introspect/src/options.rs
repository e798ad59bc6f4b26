/// Options that control how catalog introspection behaves.
#[derive(Debug, Clone)]
pub struct IntrospectOptions {
    /// Postgres namespace holding the application tables.
    pub namespace: String,
    /// Physical table prefix; only prefixed tables are loaded and the prefix is stripped.
    pub table_prefix: String,
    /// Include partitioned parent tables alongside plain tables.
    pub include_partitioned: bool,
}

impl Default for IntrospectOptions {
    fn default() -> Self {
        Self {
            namespace: "public".to_string(),
            table_prefix: String::new(),
            include_partitioned: true,
        }
    }
}
