//! Cached schema provider.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use nlq_core::{Cache, Result, SchemaInfo, SchemaLoader};

use crate::cache::TtlCache;
use crate::introspect::SchemaIntrospector;

/// Schema provider for one configured data source.
///
/// Cache hits bypass the live connection entirely; keys combine the
/// data source id with the table filter so distinct filters get
/// distinct snapshots.
pub struct SchemaProvider<I> {
    introspector: I,
    cache: TtlCache<String, Arc<SchemaInfo>>,
    source_id: String,
    sample_cap: usize,
}

impl<I: SchemaIntrospector> SchemaProvider<I> {
    pub fn new(introspector: I, source_id: &str, ttl: Duration, sample_cap: usize) -> Self {
        Self {
            introspector,
            cache: TtlCache::new(ttl),
            source_id: source_id.to_string(),
            sample_cap,
        }
    }

    fn cache_key(&self, table_filter: Option<&[String]>) -> String {
        match table_filter {
            Some(filter) => {
                let mut parts: Vec<String> =
                    filter.iter().map(|t| t.to_lowercase()).collect();
                parts.sort();
                format!("{}:{}", self.source_id, parts.join(","))
            }
            None => format!("{}:*", self.source_id),
        }
    }

    /// Drop the cached snapshot for the given filter, forcing the next
    /// load to hit the database.
    pub async fn invalidate(&self, table_filter: Option<&[String]>) {
        let key = self.cache_key(table_filter);
        self.cache.invalidate(&key).await;
        debug!("Invalidated schema cache entry {}", key);
    }
}

#[async_trait]
impl<I: SchemaIntrospector> SchemaLoader for SchemaProvider<I> {
    async fn load_schema(&self, table_filter: Option<&[String]>) -> Result<Arc<SchemaInfo>> {
        let key = self.cache_key(table_filter);

        if let Some(snapshot) = self.cache.get(&key).await {
            debug!("Schema cache hit for {}", key);
            return Ok(snapshot);
        }

        let mut schema = self.introspector.introspect(table_filter).await?;
        schema.prune_dangling_foreign_keys();
        schema.truncate_samples(self.sample_cap);

        let snapshot = Arc::new(schema);
        self.cache.put(key.clone(), Arc::clone(&snapshot)).await;

        info!(
            "Loaded schema for {}: {} tables",
            key,
            snapshot.tables.len()
        );
        Ok(snapshot)
    }
}
