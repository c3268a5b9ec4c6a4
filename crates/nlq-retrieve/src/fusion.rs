//! Score fusion for hybrid retrieval.

use std::collections::HashMap;

use ulid::Ulid;

use nlq_core::ScoredDocument;

/// Rescale scores into [0, 1] per result list.
///
/// A constant or single-element list maps every score to 1.0 so one
/// degenerate leg cannot zero out its contribution.
pub fn min_max_normalize(hits: &mut [ScoredDocument]) {
    if hits.is_empty() {
        return;
    }

    let min = hits.iter().map(|h| h.score).fold(f32::INFINITY, f32::min);
    let max = hits
        .iter()
        .map(|h| h.score)
        .fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;

    for hit in hits {
        hit.score = if range > 0.0 {
            (hit.score - min) / range
        } else {
            1.0
        };
    }
}

/// Fuse two normalized result lists with fixed weights.
///
/// A document present in only one list contributes zero for the other
/// component. Output is deduplicated by id, sorted by fused score
/// descending, and truncated to k. Ties keep the order in which the
/// candidates first appeared, vector leg before keyword leg.
pub fn fuse_min_max(
    mut vector_hits: Vec<ScoredDocument>,
    mut keyword_hits: Vec<ScoredDocument>,
    vector_weight: f32,
    keyword_weight: f32,
    k: usize,
) -> Vec<ScoredDocument> {
    min_max_normalize(&mut vector_hits);
    min_max_normalize(&mut keyword_hits);

    let mut positions: HashMap<Ulid, usize> = HashMap::new();
    let mut fused: Vec<ScoredDocument> = Vec::new();

    for hit in vector_hits {
        let score = vector_weight * hit.score;
        match positions.get(&hit.document.id) {
            Some(&pos) => fused[pos].score = score,
            None => {
                positions.insert(hit.document.id, fused.len());
                fused.push(ScoredDocument {
                    score,
                    document: hit.document,
                });
            }
        }
    }

    for hit in keyword_hits {
        let contribution = keyword_weight * hit.score;
        match positions.get(&hit.document.id) {
            Some(&pos) => fused[pos].score += contribution,
            None => {
                positions.insert(hit.document.id, fused.len());
                fused.push(ScoredDocument {
                    score: contribution,
                    document: hit.document,
                });
            }
        }
    }

    // Stable sort keeps first-seen order among equal scores.
    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    fused.truncate(k);
    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use nlq_core::{CollectionTag, Document};

    fn hit(doc: &Document, score: f32) -> ScoredDocument {
        ScoredDocument {
            document: doc.clone(),
            score,
        }
    }

    fn docs(n: usize) -> Vec<Document> {
        (0..n)
            .map(|i| Document::new(CollectionTag::Knowledge, &format!("doc {}", i)))
            .collect()
    }

    #[test]
    fn test_normalize_maps_to_unit_interval() {
        let d = docs(3);
        let mut hits = vec![hit(&d[0], 5.0), hit(&d[1], 15.0), hit(&d[2], 10.0)];
        min_max_normalize(&mut hits);
        assert_eq!(hits[0].score, 0.0);
        assert_eq!(hits[1].score, 1.0);
        assert_eq!(hits[2].score, 0.5);
    }

    #[test]
    fn test_normalize_constant_list_maps_to_one() {
        let d = docs(2);
        let mut hits = vec![hit(&d[0], 7.0), hit(&d[1], 7.0)];
        min_max_normalize(&mut hits);
        assert!(hits.iter().all(|h| h.score == 1.0));
    }

    #[test]
    fn test_normalize_single_element_maps_to_one() {
        let d = docs(1);
        let mut hits = vec![hit(&d[0], 42.0)];
        min_max_normalize(&mut hits);
        assert_eq!(hits[0].score, 1.0);
    }

    #[test]
    fn test_fused_scores_stay_in_unit_interval() {
        let d = docs(3);
        let vector = vec![hit(&d[0], 0.9), hit(&d[1], 0.3)];
        let keyword = vec![hit(&d[0], 12.0), hit(&d[2], 4.0)];

        let fused = fuse_min_max(vector, keyword, 0.7, 0.3, 10);
        for f in &fused {
            assert!(f.score >= 0.0 && f.score <= 1.0);
        }
    }

    #[test]
    fn test_document_in_both_lists_ranks_highest() {
        let d = docs(3);
        let vector = vec![hit(&d[0], 1.0), hit(&d[1], 0.5)];
        let keyword = vec![hit(&d[0], 8.0), hit(&d[2], 3.0)];

        let fused = fuse_min_max(vector, keyword, 0.7, 0.3, 10);
        assert_eq!(fused[0].document.id, d[0].id);
        assert_eq!(fused[0].score, 1.0);
    }

    #[test]
    fn test_missing_component_contributes_zero() {
        let d = docs(2);
        let vector = vec![hit(&d[0], 1.0)];
        let keyword = vec![hit(&d[1], 5.0)];

        let fused = fuse_min_max(vector, keyword, 0.7, 0.3, 10);
        let vector_only = fused.iter().find(|f| f.document.id == d[0].id).unwrap();
        let keyword_only = fused.iter().find(|f| f.document.id == d[1].id).unwrap();
        assert!((vector_only.score - 0.7).abs() < 1e-6);
        assert!((keyword_only.score - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_output_deduplicated_and_truncated() {
        let d = docs(5);
        let vector: Vec<_> = d.iter().enumerate().map(|(i, x)| hit(x, i as f32)).collect();
        let keyword: Vec<_> = d.iter().map(|x| hit(x, 1.0)).collect();

        let fused = fuse_min_max(vector, keyword, 0.7, 0.3, 3);
        assert_eq!(fused.len(), 3);
        let mut ids: Vec<_> = fused.iter().map(|f| f.document.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let d = docs(2);
        // The later-created document comes first in the hit list; the
        // tie must follow list position, not id order.
        let keyword = vec![hit(&d[1], 5.0), hit(&d[0], 5.0)];
        let fused = fuse_min_max(Vec::new(), keyword, 0.0, 1.0, 10);
        assert_eq!(fused[0].document.id, d[1].id);
        assert_eq!(fused[1].document.id, d[0].id);
    }

    #[test]
    fn test_empty_legs() {
        let d = docs(1);
        let fused = fuse_min_max(Vec::new(), vec![hit(&d[0], 2.0)], 0.7, 0.3, 10);
        assert_eq!(fused.len(), 1);
        assert!((fused[0].score - 0.3).abs() < 1e-6);

        assert!(fuse_min_max(Vec::new(), Vec::new(), 0.7, 0.3, 10).is_empty());
    }
}
