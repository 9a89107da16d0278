//! Rank fusion for hybrid search
//!
//! Reciprocal Rank Fusion merges ranked lists without comparing their raw
//! scores, which differ in scale between the vector and lexical legs.

use std::collections::HashMap;

/// Combine ranked `(id, score)` lists with Reciprocal Rank Fusion
///
/// `RRF(d) = sum over lists containing d of 1 / (k + rank(d))`, ranks
/// starting at 1. The damping constant `k` keeps a single top-1 hit from
/// dominating documents ranked well in several lists. Ties break on id so
/// fusion order is reproducible.
pub fn reciprocal_rank_fusion(
    ranked_lists: &[Vec<(String, f32)>],
    k: f32,
) -> Vec<(String, f32)> {
    let mut scores: HashMap<String, f32> = HashMap::new();

    for list in ranked_lists {
        for (rank, (id, _)) in list.iter().enumerate() {
            *scores.entry(id.clone()).or_insert(0.0) += 1.0 / (k + (rank + 1) as f32);
        }
    }

    let mut fused: Vec<(String, f32)> = scores.into_iter().collect();
    fused.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    fused
}

/// Min-max normalize scores to [0, 1]; a constant list maps to all 1.0
pub fn normalize_scores(results: Vec<(String, f32)>) -> Vec<(String, f32)> {
    if results.is_empty() {
        return results;
    }

    let min = results.iter().map(|(_, s)| *s).fold(f32::INFINITY, f32::min);
    let max = results
        .iter()
        .map(|(_, s)| *s)
        .fold(f32::NEG_INFINITY, f32::max);

    if (max - min).abs() < f32::EPSILON {
        return results.into_iter().map(|(id, _)| (id, 1.0)).collect();
    }

    results
        .into_iter()
        .map(|(id, s)| (id, (s - min) / (max - min)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(ids: &[&str]) -> Vec<(String, f32)> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| (id.to_string(), 1.0 - i as f32 * 0.1))
            .collect()
    }

    #[test]
    fn test_rrf_is_deterministic() {
        let lists = vec![list(&["a", "b", "c"]), list(&["c", "b", "d"])];
        let fused1 = reciprocal_rank_fusion(&lists, 60.0);
        let fused2 = reciprocal_rank_fusion(&lists, 60.0);
        assert_eq!(fused1, fused2);
    }

    #[test]
    fn test_rrf_doc_in_both_lists_beats_equal_rank_in_one() {
        // "b" is rank 2 in both lists; "a" is rank 2 in only one
        let lists = vec![list(&["x", "b", "a"]), list(&["y", "b"])];
        let fused = reciprocal_rank_fusion(&lists, 60.0);

        let pos = |id: &str| fused.iter().position(|(d, _)| d == id).unwrap();
        assert!(pos("b") < pos("a"));
    }

    #[test]
    fn test_rrf_damping_rewards_consistency() {
        // Rank 3 in both lists outranks rank 1 in a single list with k = 60:
        // 2/(60+3) > 1/(60+1)
        let lists = vec![list(&["solo", "p", "both"]), list(&["q", "r", "both"])];
        let fused = reciprocal_rank_fusion(&lists, 60.0);

        let pos = |id: &str| fused.iter().position(|(d, _)| d == id).unwrap();
        assert!(pos("both") < pos("solo"));
    }

    #[test]
    fn test_rrf_scores_sum_over_lists() {
        let lists = vec![list(&["a"]), list(&["a"])];
        let fused = reciprocal_rank_fusion(&lists, 60.0);
        assert_eq!(fused.len(), 1);
        let expected = 2.0 / 61.0;
        assert!((fused[0].1 - expected).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_scores() {
        let normalized = normalize_scores(vec![
            ("a".to_string(), 10.0),
            ("b".to_string(), 5.0),
            ("c".to_string(), 0.0),
        ]);
        assert_eq!(normalized[0].1, 1.0);
        assert_eq!(normalized[1].1, 0.5);
        assert_eq!(normalized[2].1, 0.0);
    }

    #[test]
    fn test_normalize_constant_scores() {
        let normalized = normalize_scores(vec![("a".to_string(), 3.0), ("b".to_string(), 3.0)]);
        assert!(normalized.iter().all(|(_, s)| *s == 1.0));
    }

    #[test]
    fn test_normalize_empty() {
        assert!(normalize_scores(Vec::new()).is_empty());
    }
}
