//! Merging retrieval output into one bounded prompt context.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use nlq_core::{RetrievalResult, SchemaInfo, ScoredDocument};

use crate::conversation::{ConversationState, Turn};

/// Everything the prompt builder needs, already deduplicated and
/// capped. Schema and history ride outside the document cap.
pub struct BoundedContext {
    pub schema: Arc<SchemaInfo>,
    pub documents: Vec<ScoredDocument>,
    pub history: Vec<Turn>,
}

/// Merges the per-collection retrieval results into a bounded context.
///
/// Duplicate content across collections collapses to the copy with the
/// highest fused score, then a global cap keeps the best of what
/// remains.
pub struct ContextMerger {
    cap: usize,
}

impl ContextMerger {
    pub fn new(cap: usize) -> Self {
        Self { cap }
    }

    pub fn merge(
        &self,
        schema: Arc<SchemaInfo>,
        results: Vec<RetrievalResult>,
        conversation: &ConversationState,
    ) -> BoundedContext {
        let mut by_hash: HashMap<[u8; 32], ScoredDocument> = HashMap::new();

        for result in results {
            for hit in result.hits {
                let hash = hit.document.dedup_hash();
                match by_hash.get(&hash) {
                    Some(existing) if existing.score >= hit.score => {}
                    _ => {
                        by_hash.insert(hash, hit);
                    }
                }
            }
        }

        let mut documents: Vec<ScoredDocument> = by_hash.into_values().collect();
        documents.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.document.id.cmp(&b.document.id))
        });
        documents.truncate(self.cap);

        debug!("Merged context: {} documents after dedup and cap", documents.len());

        BoundedContext {
            schema,
            documents,
            history: conversation.turns().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nlq_core::{CollectionTag, Document};

    fn result(tag: CollectionTag, hits: Vec<(&str, f32)>) -> RetrievalResult {
        RetrievalResult {
            collection: tag,
            hits: hits
                .into_iter()
                .map(|(content, score)| ScoredDocument {
                    document: Document::new(tag, content),
                    score,
                })
                .collect(),
        }
    }

    fn empty_schema() -> Arc<SchemaInfo> {
        Arc::new(SchemaInfo { tables: vec![] })
    }

    #[test]
    fn test_duplicate_content_keeps_highest_score() {
        let merger = ContextMerger::new(20);
        let results = vec![
            result(CollectionTag::Terminology, vec![("revenue is gross sales", 0.4)]),
            result(CollectionTag::Knowledge, vec![("revenue is gross sales", 0.9)]),
        ];

        let context = merger.merge(empty_schema(), results, &ConversationState::new(5));
        assert_eq!(context.documents.len(), 1);
        assert_eq!(context.documents[0].score, 0.9);
    }

    #[test]
    fn test_cap_keeps_best_by_score() {
        let merger = ContextMerger::new(2);
        let results = vec![result(
            CollectionTag::Knowledge,
            vec![("a", 0.1), ("b", 0.9), ("c", 0.5)],
        )];

        let context = merger.merge(empty_schema(), results, &ConversationState::new(5));
        assert_eq!(context.documents.len(), 2);
        assert_eq!(context.documents[0].document.content, "b");
        assert_eq!(context.documents[1].document.content, "c");
    }

    #[test]
    fn test_history_rides_outside_the_cap() {
        let merger = ContextMerger::new(1);
        let mut conversation = ConversationState::new(5);
        conversation.push(Turn {
            question: "q1".to_string(),
            sql: "SELECT 1".to_string(),
            result_summary: "1 row".to_string(),
        });
        conversation.push(Turn {
            question: "q2".to_string(),
            sql: "SELECT 2".to_string(),
            result_summary: "1 row".to_string(),
        });

        let results = vec![result(CollectionTag::Knowledge, vec![("a", 0.1), ("b", 0.2)])];
        let context = merger.merge(empty_schema(), results, &conversation);

        assert_eq!(context.documents.len(), 1);
        assert_eq!(context.history.len(), 2);
    }

    #[test]
    fn test_empty_results_yield_empty_context() {
        let merger = ContextMerger::new(20);
        let results = vec![
            RetrievalResult::empty(CollectionTag::Terminology),
            RetrievalResult::empty(CollectionTag::SqlExample),
            RetrievalResult::empty(CollectionTag::Knowledge),
        ];
        let context = merger.merge(empty_schema(), results, &ConversationState::new(5));
        assert!(context.documents.is_empty());
    }
}
