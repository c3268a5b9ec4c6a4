//! Per-collection document store backing both indexes.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use nlq_core::{CollectionTag, Document, Embedder, ScoredDocument};

use crate::lexical::LexicalIndex;
use crate::vector::VectorIndex;

struct Collection {
    lexical: LexicalIndex,
    vector: VectorIndex,
}

impl Collection {
    fn empty() -> Self {
        Self {
            lexical: LexicalIndex::empty(),
            vector: VectorIndex::empty(),
        }
    }
}

/// Holds the three knowledge collections and their indexes.
///
/// Replacement is wholesale per collection: sync hands over the full
/// document set and both indexes are rebuilt. Reads never block on a
/// sync of a different collection.
pub struct DocumentStore {
    collections: HashMap<CollectionTag, RwLock<Collection>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        let mut collections = HashMap::new();
        for tag in CollectionTag::ALL {
            collections.insert(tag, RwLock::new(Collection::empty()));
        }
        Self { collections }
    }

    fn collection(&self, tag: CollectionTag) -> &RwLock<Collection> {
        // The map is populated for every tag at construction.
        &self.collections[&tag]
    }

    /// Replace a collection's documents and rebuild both indexes.
    ///
    /// Documents are embedded here when the embedder is available; if
    /// it is not, the vector index stays empty and retrieval over this
    /// collection degrades to keyword-only.
    pub async fn replace(
        &self,
        tag: CollectionTag,
        mut documents: Vec<Document>,
        embedder: &Arc<dyn Embedder + Send + Sync>,
    ) {
        let mut embedded = 0usize;
        if embedder.available() {
            for doc in &mut documents {
                match embedder.embed(&doc.content).await {
                    Ok(vector) => {
                        doc.embedding = Some(vector);
                        embedded += 1;
                    }
                    Err(e) => {
                        warn!("Failed to embed document {}: {}", doc.id, e);
                    }
                }
            }
        }

        let vector = if embedded > 0 {
            VectorIndex::build(documents.clone(), embedder.dimension())
        } else {
            VectorIndex::empty()
        };
        let lexical = LexicalIndex::build(documents);

        let mut collection = self.collection(tag).write().await;
        info!(
            "Rebuilt collection {}: {} documents, {} embedded",
            tag,
            lexical.len(),
            embedded
        );
        *collection = Collection { lexical, vector };
    }

    pub async fn lexical_search(
        &self,
        tag: CollectionTag,
        query: &str,
        k: usize,
    ) -> Vec<ScoredDocument> {
        self.collection(tag).read().await.lexical.search(query, k)
    }

    pub async fn vector_search(
        &self,
        tag: CollectionTag,
        query: &[f32],
        k: usize,
    ) -> Vec<ScoredDocument> {
        self.collection(tag).read().await.vector.search(query, k)
    }

    pub async fn len(&self, tag: CollectionTag) -> usize {
        self.collection(tag).read().await.lexical.len()
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}
