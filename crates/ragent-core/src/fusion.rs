//! Rank fusion for hybrid retrieval.
//!
//! Merges ranked passage lists from heterogeneous strategies. Dense
//! similarities and BM25 scores live on different scales, so only rank
//! positions are used:
//!
//! ```text
//! RRF(p) = Σ 1 / (k + rank_i(p))      rank zero-based, k default 60
//! ```
//!
//! Passages are keyed by [`Passage::identity`]. Fusion never drops a
//! passage; truncation is up to the caller.

use std::collections::HashMap;

use crate::types::{dedup_by_content, Passage};

/// Default RRF constant.
pub const DEFAULT_RRF_K: f32 = 60.0;

/// A fused passage with its accumulated RRF score.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedPassage {
    pub passage: Passage,
    pub score: f32,
}

/// Reciprocal Rank Fusion, keeping the accumulated scores.
///
/// Output is sorted by score descending. Ties keep first-seen order, walking
/// the lists in the order given. A passage repeated inside one list
/// contributes once per occurrence. The first occurrence's metadata is kept.
pub fn reciprocal_rank_fusion_scored(lists: &[Vec<Passage>], k: f32) -> Vec<FusedPassage> {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut fused: Vec<FusedPassage> = Vec::new();

    for list in lists {
        for (rank, passage) in list.iter().enumerate() {
            let contribution = 1.0 / (k + rank as f32);
            match slots.get(passage.identity()) {
                Some(&slot) => fused[slot].score += contribution,
                None => {
                    slots.insert(passage.identity(), fused.len());
                    fused.push(FusedPassage {
                        passage: passage.clone(),
                        score: contribution,
                    });
                }
            }
        }
    }

    // sort_by is stable, so equal scores stay in first-seen order
    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    fused
}

/// Reciprocal Rank Fusion over any number of ranked lists.
pub fn reciprocal_rank_fusion(lists: &[Vec<Passage>], k: f32) -> Vec<Passage> {
    reciprocal_rank_fusion_scored(lists, k)
        .into_iter()
        .map(|f| f.passage)
        .collect()
}

/// Order-preserving concatenation with deduplication.
///
/// Used when RRF is disabled. Earlier lists win duplicates, so the dense
/// list goes first.
pub fn concat_dedup(lists: Vec<Vec<Passage>>) -> Vec<Passage> {
    dedup_by_content(lists.into_iter().flatten())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn list(items: &[&str]) -> Vec<Passage> {
        items.iter().map(|c| Passage::new(*c)).collect()
    }

    fn contents(passages: &[Passage]) -> Vec<&str> {
        passages.iter().map(|p| p.content.as_str()).collect()
    }

    #[test]
    fn test_rrf_scores_use_zero_based_ranks() {
        let fused = reciprocal_rank_fusion_scored(&[list(&["a", "b"])], 60.0);
        assert!((fused[0].score - 1.0 / 60.0).abs() < 1e-7);
        assert!((fused[1].score - 1.0 / 61.0).abs() < 1e-7);
    }

    #[test]
    fn test_rrf_passage_in_both_lists_wins() {
        let dense = list(&["a", "b", "c"]);
        let sparse = list(&["c", "d", "b"]);
        let fused = reciprocal_rank_fusion(&[dense, sparse], 60.0);

        // b: 1/61 + 1/62, c: 1/62 + 1/60, a: 1/60, d: 1/61
        assert_eq!(contents(&fused), vec!["c", "b", "a", "d"]);
    }

    #[test]
    fn test_rrf_output_is_union_without_duplicates() {
        let lists = vec![list(&["a", "b", "c"]), list(&["d", "a"]), list(&["e", "c", "f"])];
        let fused = reciprocal_rank_fusion_scored(&lists, 60.0);

        let unique: HashSet<&str> = fused.iter().map(|f| f.passage.content.as_str()).collect();
        assert_eq!(unique.len(), fused.len());
        assert_eq!(unique, ["a", "b", "c", "d", "e", "f"].into_iter().collect());

        for pair in fused.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_rrf_ties_keep_first_seen_order() {
        let fused = reciprocal_rank_fusion(&[list(&["x"]), list(&["y"])], 60.0);
        assert_eq!(contents(&fused), vec!["x", "y"]);

        let swapped = reciprocal_rank_fusion(&[list(&["y"]), list(&["x"])], 60.0);
        assert_eq!(contents(&swapped), vec!["y", "x"]);
    }

    #[test]
    fn test_rrf_symmetric_for_shared_rank() {
        let a = list(&["shared", "only-a"]);
        let b = list(&["shared", "only-b"]);

        let ab = reciprocal_rank_fusion_scored(&[a.clone(), b.clone()], 60.0);
        let ba = reciprocal_rank_fusion_scored(&[b, a], 60.0);

        assert_eq!(ab[0].passage.content, "shared");
        assert_eq!(ba[0].passage.content, "shared");
        assert!((ab[0].score - ba[0].score).abs() < 1e-7);
    }

    #[test]
    fn test_rrf_identity_ignores_metadata() {
        let dense = vec![Passage::new("same").with_meta("source", "dense")];
        let sparse = vec![Passage::new("same").with_meta("source", "sparse")];
        let fused = reciprocal_rank_fusion(&[dense, sparse], 60.0);

        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].metadata["source"].as_str(), Some("dense"));
    }

    #[test]
    fn test_rrf_empty_inputs() {
        assert!(reciprocal_rank_fusion(&[], 60.0).is_empty());
        assert!(reciprocal_rank_fusion(&[vec![], vec![]], 60.0).is_empty());
    }

    #[test]
    fn test_concat_dedup_dense_wins() {
        let dense = vec![
            Passage::new("a").with_meta("from", "dense"),
            Passage::new("b"),
        ];
        let sparse = vec![Passage::new("c"), Passage::new("a").with_meta("from", "sparse")];
        let merged = concat_dedup(vec![dense, sparse]);

        assert_eq!(contents(&merged), vec!["a", "b", "c"]);
        assert_eq!(merged[0].metadata["from"].as_str(), Some("dense"));
    }
}
