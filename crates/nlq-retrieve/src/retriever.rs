//! Hybrid retriever over a document store.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use nlq_core::{
    CollectionTag, Embedder, KnowledgeRetriever, Result, RetrievalConfig, RetrievalResult,
};
use nlq_index::DocumentStore;

use crate::fusion::fuse_min_max;

/// Hybrid keyword + vector retriever.
///
/// The vector leg is best-effort: an unavailable embedder or a failed
/// embed call drops it and keyword scores take full weight. Only the
/// store itself could make retrieval fail, and it never does.
pub struct HybridRetriever {
    store: Arc<DocumentStore>,
    embedder: Arc<dyn Embedder + Send + Sync>,
    config: RetrievalConfig,
}

impl HybridRetriever {
    pub fn new(
        store: Arc<DocumentStore>,
        embedder: Arc<dyn Embedder + Send + Sync>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    async fn query_vector(&self, query: &str) -> Option<Vec<f32>> {
        if !self.embedder.available() {
            return None;
        }
        match self.embedder.embed(query).await {
            Ok(vector) => Some(vector),
            Err(e) => {
                warn!("Query embedding failed, using keyword-only scoring: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl KnowledgeRetriever for HybridRetriever {
    async fn retrieve(&self, tag: CollectionTag, query: &str, k: usize) -> Result<RetrievalResult> {
        // Over-fetch per leg so fusion has candidates beyond the cut.
        let fetch_k = (k * 2).max(20);

        let hits = match self.query_vector(query).await {
            Some(vector) => {
                let (vector_hits, keyword_hits) = tokio::join!(
                    self.store.vector_search(tag, &vector, fetch_k),
                    self.store.lexical_search(tag, query, fetch_k)
                );
                debug!(
                    "Hybrid retrieval on {}: {} vector, {} keyword hits",
                    tag,
                    vector_hits.len(),
                    keyword_hits.len()
                );
                if vector_hits.is_empty() {
                    // Unbuilt or empty vector index, e.g. docs synced
                    // while the embedder was down. Keyword scores take
                    // full weight instead of being scaled down.
                    fuse_min_max(Vec::new(), keyword_hits, 0.0, 1.0, k)
                } else {
                    fuse_min_max(
                        vector_hits,
                        keyword_hits,
                        self.config.vector_weight,
                        self.config.keyword_weight,
                        k,
                    )
                }
            }
            None => {
                let keyword_hits = self.store.lexical_search(tag, query, fetch_k).await;
                debug!(
                    "Keyword-only retrieval on {}: {} hits",
                    tag,
                    keyword_hits.len()
                );
                fuse_min_max(Vec::new(), keyword_hits, 0.0, 1.0, k)
            }
        };

        Ok(RetrievalResult {
            collection: tag,
            hits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nlq_core::Document;
    use nlq_embed::MockEmbedder;

    async fn seeded_store(embedder: &Arc<dyn Embedder + Send + Sync>) -> Arc<DocumentStore> {
        let store = Arc::new(DocumentStore::new());
        let docs = vec![
            Document::new(CollectionTag::SqlExample, "SELECT sum(total) FROM orders GROUP BY month"),
            Document::new(CollectionTag::SqlExample, "SELECT count(*) FROM customers"),
            Document::new(CollectionTag::SqlExample, "SELECT avg(price) FROM products"),
        ];
        store.replace(CollectionTag::SqlExample, docs, embedder).await;
        store
    }

    fn config() -> RetrievalConfig {
        RetrievalConfig {
            top_k: 10,
            vector_weight: 0.7,
            keyword_weight: 0.3,
            context_cap: 20,
        }
    }

    #[tokio::test]
    async fn test_hybrid_retrieval_returns_fused_hits() {
        let embedder: Arc<dyn Embedder + Send + Sync> = Arc::new(MockEmbedder::new());
        let store = seeded_store(&embedder).await;
        let retriever = HybridRetriever::new(store, embedder, config());

        let result = retriever
            .retrieve(CollectionTag::SqlExample, "orders by month", 10)
            .await
            .unwrap();

        assert_eq!(result.collection, CollectionTag::SqlExample);
        assert!(!result.hits.is_empty());
        // The keyword match should be in the fused output.
        assert!(result
            .hits
            .iter()
            .any(|h| h.document.content.contains("orders")));
    }

    #[tokio::test]
    async fn test_unavailable_embedder_degrades_to_keyword_only() {
        // Index with embeddings, then query with a dead embedder.
        let live: Arc<dyn Embedder + Send + Sync> = Arc::new(MockEmbedder::new());
        let store = seeded_store(&live).await;

        let dead: Arc<dyn Embedder + Send + Sync> = Arc::new(MockEmbedder::unavailable());
        let retriever = HybridRetriever::new(store, dead, config());

        let result = retriever
            .retrieve(CollectionTag::SqlExample, "customers count", 10)
            .await
            .unwrap();

        // Degraded, not failed. Keyword scores carry full weight.
        assert!(!result.hits.is_empty());
        assert!(result.hits[0].document.content.contains("customers"));
        assert!(result.hits[0].score <= 1.0);
    }

    #[tokio::test]
    async fn test_unbuilt_vector_index_gives_keyword_full_weight() {
        // Docs indexed while the embedder was down, then queried with a
        // live embedder: the vector leg is empty and must not scale the
        // keyword scores by its weight.
        let dead: Arc<dyn Embedder + Send + Sync> = Arc::new(MockEmbedder::unavailable());
        let store = seeded_store(&dead).await;

        let live: Arc<dyn Embedder + Send + Sync> = Arc::new(MockEmbedder::new());
        let retriever = HybridRetriever::new(store, live, config());

        let result = retriever
            .retrieve(CollectionTag::SqlExample, "customers", 10)
            .await
            .unwrap();

        assert!(!result.hits.is_empty());
        assert!(result.hits[0].document.content.contains("customers"));
        // Top keyword hit normalizes to 1.0 and keeps full weight.
        assert!((result.hits[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_empty_collection_yields_empty_result() {
        let embedder: Arc<dyn Embedder + Send + Sync> = Arc::new(MockEmbedder::new());
        let store = Arc::new(DocumentStore::new());
        let retriever = HybridRetriever::new(store, embedder, config());

        let result = retriever
            .retrieve(CollectionTag::Terminology, "anything", 10)
            .await
            .unwrap();
        assert!(result.hits.is_empty());
    }

    #[tokio::test]
    async fn test_k_bounds_output() {
        let embedder: Arc<dyn Embedder + Send + Sync> = Arc::new(MockEmbedder::new());
        let store = seeded_store(&embedder).await;
        let retriever = HybridRetriever::new(store, embedder, config());

        let result = retriever
            .retrieve(CollectionTag::SqlExample, "SELECT FROM", 2)
            .await
            .unwrap();
        assert!(result.hits.len() <= 2);
    }
}
