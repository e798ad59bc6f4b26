use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::schema::{Schema, Table};
use crate::validation::validate_tables;

/// Collaborator contract for anything that can describe tables.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Human-readable identifier used in error messages and logs.
    fn name(&self) -> &str;

    /// Produce the tables this source describes.
    async fn load(&self) -> Result<Vec<Table>>;
}

/// Cache of merged schemas keyed by version tag.
///
/// Share one instance (behind an `Arc`) between loaders to avoid parsing the
/// same sources twice within a process.
#[derive(Debug, Default)]
pub struct SchemaCache {
    entries: Mutex<HashMap<String, Arc<Schema>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, version: &str) -> Option<Arc<Schema>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(version)
            .cloned()
    }

    pub fn insert(&self, schema: Arc<Schema>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(schema.version().to_string(), schema);
    }

    pub fn invalidate(&self, version: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(version);
    }
}

/// Loads and merges schema sources, caching the result per version tag.
pub struct SchemaLoader {
    version: String,
    sources: Vec<Box<dyn SchemaSource>>,
    cache: Arc<SchemaCache>,
}

impl SchemaLoader {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            sources: Vec::new(),
            cache: Arc::new(SchemaCache::new()),
        }
    }

    /// Use a shared cache instead of a private one.
    pub fn with_cache(mut self, cache: Arc<SchemaCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Append a source; later sources win on duplicate table names.
    pub fn with_source(mut self, source: impl SchemaSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Return the merged schema, loading every source on a cache miss.
    ///
    /// Any source failure is reported as [`Error::SchemaLoad`]; no partial
    /// schema is ever cached.
    pub async fn load_schema(&self) -> Result<Arc<Schema>> {
        if let Some(schema) = self.cache.get(&self.version) {
            tracing::debug!(event = "schema_cache_hit", version = %self.version);
            return Ok(schema);
        }

        if self.sources.is_empty() {
            return Err(Error::SchemaLoad(
                "no schema sources configured".to_string(),
            ));
        }

        let mut tables = Vec::new();
        for source in &self.sources {
            let loaded = source
                .load()
                .await
                .map_err(|err| Error::SchemaLoad(format!("{}: {err}", source.name())))?;
            validate_tables(&loaded)
                .map_err(|err| Error::SchemaLoad(format!("{}: {err}", source.name())))?;
            tracing::debug!(
                event = "schema_source_loaded",
                source = %source.name(),
                tables = loaded.len()
            );
            tables.extend(loaded);
        }

        let schema = Arc::new(Schema::new(self.version.clone(), tables));
        tracing::info!(
            event = "schema_loaded",
            version = %self.version,
            tables = schema.len()
        );
        self.cache.insert(Arc::clone(&schema));
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct StaticSource {
        name: String,
        tables: Vec<Table>,
        loads: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SchemaSource for StaticSource {
        fn name(&self) -> &str {
            &self.name
        }

        async fn load(&self) -> Result<Vec<Table>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.tables.clone())
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl SchemaSource for BrokenSource {
        fn name(&self) -> &str {
            "broken"
        }

        async fn load(&self) -> Result<Vec<Table>> {
            Err(Error::Other("unreadable".to_string()))
        }
    }

    fn source(name: &str, tables: Vec<Table>, loads: &Arc<AtomicUsize>) -> StaticSource {
        StaticSource {
            name: name.to_string(),
            tables,
            loads: Arc::clone(loads),
        }
    }

    #[tokio::test]
    async fn merges_sources_last_writer_wins() {
        let loads = Arc::new(AtomicUsize::new(0));
        let loader = SchemaLoader::new("v1")
            .with_source(source(
                "core",
                vec![
                    Table::new("user").with_field("id", "bigint"),
                    Table::new("course").with_field("id", "bigint"),
                ],
                &loads,
            ))
            .with_source(source(
                "plugin",
                vec![
                    Table::new("user")
                        .with_field("id", "bigint")
                        .with_field("email", "text"),
                ],
                &loads,
            ));

        let schema = loader.load_schema().await.unwrap();
        assert_eq!(schema.len(), 2);
        assert!(schema.table("user").unwrap().field("email").is_some());
    }

    #[tokio::test]
    async fn caches_by_version_tag() {
        let loads = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(SchemaCache::new());
        let tables = vec![Table::new("user").with_field("id", "bigint")];

        let first = SchemaLoader::new("v1")
            .with_cache(Arc::clone(&cache))
            .with_source(source("core", tables.clone(), &loads));
        first.load_schema().await.unwrap();
        first.load_schema().await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        let same_version = SchemaLoader::new("v1")
            .with_cache(Arc::clone(&cache))
            .with_source(source("core", tables.clone(), &loads));
        same_version.load_schema().await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        let next_version = SchemaLoader::new("v2")
            .with_cache(Arc::clone(&cache))
            .with_source(source("core", tables, &loads));
        next_version.load_schema().await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn source_failures_are_schema_load_errors() {
        let loader = SchemaLoader::new("v1").with_source(BrokenSource);
        let err = loader.load_schema().await.unwrap_err();
        assert!(matches!(err, Error::SchemaLoad(ref msg) if msg.starts_with("broken:")));
    }

    #[tokio::test]
    async fn invalid_tables_are_schema_load_errors() {
        let loads = Arc::new(AtomicUsize::new(0));
        let loader = SchemaLoader::new("v1").with_source(source(
            "core",
            vec![
                Table::new("user")
                    .with_field("id", "bigint")
                    .with_field("id", "bigint"),
            ],
            &loads,
        ));
        assert!(matches!(
            loader.load_schema().await,
            Err(Error::SchemaLoad(_))
        ));
    }

    #[tokio::test]
    async fn requires_at_least_one_source() {
        let loader = SchemaLoader::new("v1");
        assert!(matches!(
            loader.load_schema().await,
            Err(Error::SchemaLoad(_))
        ));
    }
}
