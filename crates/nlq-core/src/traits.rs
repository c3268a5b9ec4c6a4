//! Core traits defining the interfaces between components.
//!
//! Every seam the orchestrator crosses is a trait, so each stage can be
//! substituted in tests and capability loss (a missing embedder, an
//! unreachable vector index) is an explicit branch rather than a
//! runtime type check.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::types::{CollectionTag, ResultSet, RetrievalResult, SchemaInfo};

/// Text embedding model.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text into a fixed-dimension vector.
    /// Deterministic for identical input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embedding dimension.
    fn dimension(&self) -> usize;

    /// Whether the model loaded and can serve requests. When false,
    /// callers skip the vector leg entirely.
    fn available(&self) -> bool {
        true
    }
}

/// Text completion service (the LLM). Prompt in, raw text out.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// TTL cache over an arbitrary key/value pair.
///
/// Backed in-process by default; an external store is a different
/// implementation of the same trait, not a different call site.
#[async_trait]
pub trait Cache<K, V>: Send + Sync
where
    K: Send + Sync,
    V: Send + Sync,
{
    /// Get a live (non-expired) entry.
    async fn get(&self, key: &K) -> Option<V>;

    /// Insert or replace an entry, resetting its TTL.
    async fn put(&self, key: K, value: V);

    /// Drop an entry regardless of TTL.
    async fn invalidate(&self, key: &K);
}

/// Schema metadata source for one configured data source.
#[async_trait]
pub trait SchemaLoader: Send + Sync {
    /// Load (or serve from cache) the schema snapshot, optionally
    /// restricted to the given tables.
    async fn load_schema(&self, table_filter: Option<&[String]>) -> Result<Arc<SchemaInfo>>;
}

/// Knowledge retrieval over one collection.
#[async_trait]
pub trait KnowledgeRetriever: Send + Sync {
    async fn retrieve(
        &self,
        collection: CollectionTag,
        query: &str,
        k: usize,
    ) -> Result<RetrievalResult>;
}

/// Query execution against the target database.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute validated SQL with bound parameters, a hard timeout and
    /// a hard row cap (truncating, not failing).
    async fn execute(
        &self,
        sql: &str,
        params: &[serde_json::Value],
        timeout: Duration,
        row_limit: usize,
    ) -> Result<ResultSet>;
}
