//! BM25 keyword index.

use std::collections::HashMap;

use ulid::Ulid;

use nlq_core::{Document, ScoredDocument};

const K1: f32 = 1.2;
const B: f32 = 0.75;

/// In-memory BM25 index over one document collection.
///
/// Term frequencies saturate via k1 and long documents are penalized
/// against the average document length via b. IDF is floored at zero
/// so terms present in most documents never score negatively.
pub struct LexicalIndex {
    documents: Vec<Document>,
    /// term -> (doc position, term frequency)
    postings: HashMap<String, Vec<(usize, u32)>>,
    doc_lengths: Vec<u32>,
    avg_doc_length: f32,
}

impl LexicalIndex {
    /// An empty index; searches return no hits until `build` replaces it.
    pub fn empty() -> Self {
        Self {
            documents: Vec::new(),
            postings: HashMap::new(),
            doc_lengths: Vec::new(),
            avg_doc_length: 0.0,
        }
    }

    /// Build the index from scratch over the given documents.
    pub fn build(documents: Vec<Document>) -> Self {
        let mut postings: HashMap<String, Vec<(usize, u32)>> = HashMap::new();
        let mut doc_lengths = Vec::with_capacity(documents.len());

        for (pos, doc) in documents.iter().enumerate() {
            let terms = tokenize(&doc.content);
            doc_lengths.push(terms.len() as u32);

            let mut counts: HashMap<String, u32> = HashMap::new();
            for term in terms {
                *counts.entry(term).or_insert(0) += 1;
            }
            for (term, tf) in counts {
                postings.entry(term).or_default().push((pos, tf));
            }
        }

        let avg_doc_length = if doc_lengths.is_empty() {
            0.0
        } else {
            doc_lengths.iter().sum::<u32>() as f32 / doc_lengths.len() as f32
        };

        Self {
            documents,
            postings,
            doc_lengths,
            avg_doc_length,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn document(&self, id: &Ulid) -> Option<&Document> {
        self.documents.iter().find(|d| &d.id == id)
    }

    /// Top-k BM25 scoring. Documents sharing no terms with the query
    /// are never returned.
    pub fn search(&self, query: &str, k: usize) -> Vec<ScoredDocument> {
        if self.documents.is_empty() || k == 0 {
            return Vec::new();
        }

        let n = self.documents.len() as f32;
        let mut scores: HashMap<usize, f32> = HashMap::new();

        for term in tokenize(query) {
            let Some(posting) = self.postings.get(&term) else {
                continue;
            };
            let df = posting.len() as f32;
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln().max(0.0);

            for &(pos, tf) in posting {
                let tf = tf as f32;
                let len_norm = 1.0 - B + B * self.doc_lengths[pos] as f32 / self.avg_doc_length;
                let term_score = idf * (tf * (K1 + 1.0)) / (tf + K1 * len_norm);
                *scores.entry(pos).or_insert(0.0) += term_score;
            }
        }

        let mut hits: Vec<(usize, f32)> = scores.into_iter().filter(|(_, s)| *s > 0.0).collect();
        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);

        hits.into_iter()
            .map(|(pos, score)| ScoredDocument {
                document: self.documents[pos].clone(),
                score,
            })
            .collect()
    }
}

/// Lowercase alphanumeric tokenization. Underscores survive so column
/// names like `cust_name` stay one term.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nlq_core::CollectionTag;

    fn doc(content: &str) -> Document {
        Document::new(CollectionTag::Knowledge, content)
    }

    #[test]
    fn test_empty_index_returns_no_hits() {
        let index = LexicalIndex::empty();
        assert!(index.search("total sales", 10).is_empty());
    }

    #[test]
    fn test_exact_term_match_ranks_first() {
        let index = LexicalIndex::build(vec![
            doc("monthly sales totals grouped by month"),
            doc("customer churn rate over time"),
            doc("inventory levels per warehouse"),
        ]);

        let hits = index.search("sales by month", 10);
        assert!(!hits.is_empty());
        assert!(hits[0].document.content.contains("sales"));
    }

    #[test]
    fn test_no_shared_terms_means_no_hits() {
        let index = LexicalIndex::build(vec![doc("customer churn rate")]);
        assert!(index.search("warehouse inventory", 10).is_empty());
    }

    #[test]
    fn test_rare_terms_outweigh_common_terms() {
        // "orders" appears everywhere, "refund" only once.
        let index = LexicalIndex::build(vec![
            doc("orders shipped this week"),
            doc("orders pending approval"),
            doc("orders with a refund issued"),
        ]);

        let hits = index.search("orders refund", 10);
        assert_eq!(hits[0].document.content, "orders with a refund issued");
    }

    #[test]
    fn test_length_normalization_penalizes_long_documents() {
        let long = "sales ".to_string() + &"filler words padding content extra ".repeat(20);
        let index = LexicalIndex::build(vec![doc(&long), doc("sales summary")]);

        let hits = index.search("sales", 10);
        assert_eq!(hits[0].document.content, "sales summary");
    }

    #[test]
    fn test_underscored_identifiers_are_single_terms() {
        let index = LexicalIndex::build(vec![
            doc("cust_name holds the customer display name"),
            doc("custom names for reports"),
        ]);

        let hits = index.search("cust_name", 10);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].document.content.starts_with("cust_name"));
    }

    #[test]
    fn test_k_truncation() {
        let docs = (0..10).map(|i| doc(&format!("sales report {}", i))).collect();
        let index = LexicalIndex::build(docs);
        assert_eq!(index.search("sales", 3).len(), 3);
    }

    #[test]
    fn test_scores_descend() {
        let index = LexicalIndex::build(vec![
            doc("sales sales sales"),
            doc("sales and marketing"),
            doc("sales"),
        ]);
        let hits = index.search("sales", 10);
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }
}
