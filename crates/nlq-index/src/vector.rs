//! Exact-scan cosine similarity index.

use tracing::warn;
use ulid::Ulid;

use nlq_core::{Document, ScoredDocument};

/// In-memory vector index over one document collection.
///
/// Exact scan, no ANN structure; collection sizes here are small
/// enough that a linear pass beats the complexity of anything fancier.
/// Documents without an embedding are skipped at build time.
pub struct VectorIndex {
    entries: Vec<(Document, Vec<f32>)>,
    dimension: usize,
}

impl VectorIndex {
    /// An empty index; searches return no hits until `build` replaces it.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            dimension: 0,
        }
    }

    /// Build from documents that carry embeddings. Documents missing
    /// an embedding or with a mismatched dimension are dropped.
    pub fn build(documents: Vec<Document>, dimension: usize) -> Self {
        let mut entries = Vec::with_capacity(documents.len());
        for doc in documents {
            match doc.embedding.clone() {
                Some(embedding) if embedding.len() == dimension => {
                    entries.push((doc, embedding));
                }
                Some(embedding) => {
                    warn!(
                        "Dropping document {}: embedding dim {} != index dim {}",
                        doc.id,
                        embedding.len(),
                        dimension
                    );
                }
                None => {}
            }
        }
        Self { entries, dimension }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn document(&self, id: &Ulid) -> Option<&Document> {
        self.entries.iter().find(|(d, _)| &d.id == id).map(|(d, _)| d)
    }

    /// Top-k by cosine similarity against the query vector.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredDocument> {
        if self.entries.is_empty() || k == 0 || query.len() != self.dimension {
            return Vec::new();
        }

        let mut hits: Vec<ScoredDocument> = self
            .entries
            .iter()
            .map(|(doc, embedding)| ScoredDocument {
                document: doc.clone(),
                score: cosine_similarity(query, embedding),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        hits
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nlq_core::CollectionTag;

    fn doc_with_embedding(content: &str, embedding: Vec<f32>) -> Document {
        let mut doc = Document::new(CollectionTag::Knowledge, content);
        doc.embedding = Some(embedding);
        doc
    }

    #[test]
    fn test_empty_index_returns_no_hits() {
        let index = VectorIndex::empty();
        assert!(index.search(&[1.0, 0.0], 10).is_empty());
    }

    #[test]
    fn test_nearest_vector_ranks_first() {
        let index = VectorIndex::build(
            vec![
                doc_with_embedding("aligned", vec![1.0, 0.0]),
                doc_with_embedding("orthogonal", vec![0.0, 1.0]),
                doc_with_embedding("opposite", vec![-1.0, 0.0]),
            ],
            2,
        );

        let hits = index.search(&[1.0, 0.0], 3);
        assert_eq!(hits[0].document.content, "aligned");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert_eq!(hits[2].document.content, "opposite");
    }

    #[test]
    fn test_dimension_mismatch_returns_empty() {
        let index = VectorIndex::build(vec![doc_with_embedding("a", vec![1.0, 0.0])], 2);
        assert!(index.search(&[1.0, 0.0, 0.0], 10).is_empty());
    }

    #[test]
    fn test_documents_without_embeddings_are_dropped() {
        let plain = Document::new(CollectionTag::Knowledge, "no embedding");
        let index = VectorIndex::build(
            vec![plain, doc_with_embedding("embedded", vec![1.0, 0.0])],
            2,
        );
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_mismatched_embedding_dim_is_dropped() {
        let index = VectorIndex::build(
            vec![
                doc_with_embedding("wrong", vec![1.0, 0.0, 0.0]),
                doc_with_embedding("right", vec![1.0, 0.0]),
            ],
            2,
        );
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_k_truncation() {
        let docs = (0..5)
            .map(|i| doc_with_embedding(&format!("d{}", i), vec![1.0, i as f32 * 0.1]))
            .collect();
        let index = VectorIndex::build(docs, 2);
        assert_eq!(index.search(&[1.0, 0.0], 2).len(), 2);
    }

    #[test]
    fn test_zero_query_scores_zero() {
        let index = VectorIndex::build(vec![doc_with_embedding("a", vec![1.0, 0.0])], 2);
        let hits = index.search(&[0.0, 0.0], 1);
        assert_eq!(hits[0].score, 0.0);
    }
}
