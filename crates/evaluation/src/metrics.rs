//! Per-user ranking metrics at a cutoff `k`.
//!
//! Relevance is binary: an item is relevant when it appears in the user's
//! ground-truth set. Recommended lists are truncated to their first `k`
//! entries before scoring.

use std::collections::HashSet;
use streamline_core::{ItemId, RecoError, RecoResult};

fn hits_at_k(recommended: &[ItemId], truth: &HashSet<ItemId>, k: usize) -> usize {
    let top: HashSet<&ItemId> = recommended.iter().take(k).collect();
    top.into_iter().filter(|item| truth.contains(*item)).count()
}

/// |top-k ∩ truth| / k.
pub fn precision_at_k(recommended: &[ItemId], truth: &HashSet<ItemId>, k: usize) -> RecoResult<f64> {
    if k == 0 {
        return Err(RecoError::InvalidCutoff(k));
    }
    Ok(hits_at_k(recommended, truth, k) as f64 / k as f64)
}

/// |top-k ∩ truth| / |truth|. An empty truth set is an error rather than a
/// silent zero or NaN.
pub fn recall_at_k(recommended: &[ItemId], truth: &HashSet<ItemId>, k: usize) -> RecoResult<f64> {
    if truth.is_empty() {
        return Err(RecoError::EmptyGroundTruth);
    }
    Ok(hits_at_k(recommended, truth, k) as f64 / truth.len() as f64)
}

/// Discounted cumulative gain with binary relevance:
/// Σ 1 / log2(i + 2) over zero-based positions `i < k` holding a relevant item.
///
/// This is the un-normalized form; the value is not divided by the ideal DCG.
/// Its upper bound for a given cutoff and truth size is [`ideal_dcg_at_k`].
pub fn ndcg_at_k(recommended: &[ItemId], truth: &HashSet<ItemId>, k: usize) -> f64 {
    recommended
        .iter()
        .take(k)
        .enumerate()
        .filter(|(_, item)| truth.contains(*item))
        .map(|(i, _)| 1.0 / ((i + 2) as f64).log2())
        .sum()
}

/// Largest [`ndcg_at_k`] achievable with `relevant` relevant items: all of
/// them packed into the leading positions.
pub fn ideal_dcg_at_k(relevant: usize, k: usize) -> f64 {
    (0..relevant.min(k))
        .map(|i| 1.0 / ((i + 2) as f64).log2())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn truth(items: &[ItemId]) -> HashSet<ItemId> {
        items.iter().copied().collect()
    }

    #[test]
    fn test_precision_and_recall() {
        let recs = vec![1, 2, 3, 4];
        let relevant = truth(&[2, 4, 9]);
        assert_eq!(precision_at_k(&recs, &relevant, 4).unwrap(), 0.5);
        assert!((recall_at_k(&recs, &relevant, 4).unwrap() - 2.0 / 3.0).abs() < 1e-12);
        // Cutoff applies before intersecting.
        assert_eq!(precision_at_k(&recs, &relevant, 2).unwrap(), 0.5);
        assert!((recall_at_k(&recs, &relevant, 2).unwrap() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_precision_divides_by_k_not_list_length() {
        let recs = vec![7];
        assert_eq!(precision_at_k(&recs, &truth(&[7]), 10).unwrap(), 0.1);
    }

    #[test]
    fn test_duplicates_count_once() {
        let recs = vec![5, 5, 5];
        assert_eq!(precision_at_k(&recs, &truth(&[5]), 3).unwrap(), 1.0 / 3.0);
    }

    #[test]
    fn test_perfect_ranking() {
        let recs = vec![3, 1, 2];
        let relevant = truth(&[1, 2, 3]);
        assert_eq!(precision_at_k(&recs, &relevant, 3).unwrap(), 1.0);
        assert_eq!(recall_at_k(&recs, &relevant, 3).unwrap(), 1.0);
        assert!((ndcg_at_k(&recs, &relevant, 3) - ideal_dcg_at_k(3, 3)).abs() < 1e-12);
    }

    #[test]
    fn test_ndcg_second_position() {
        let recs = vec![100, 200, 300];
        let value = ndcg_at_k(&recs, &truth(&[200]), 3);
        assert_eq!(value, 1.0 / 3.0f64.log2());
    }

    #[test]
    fn test_ndcg_first_position_is_one() {
        assert_eq!(ndcg_at_k(&[4, 5], &truth(&[4]), 2), 1.0);
        assert_eq!(ndcg_at_k(&[4, 5], &truth(&[6]), 2), 0.0);
    }

    #[test]
    fn test_ndcg_prefers_early_hits() {
        let relevant = truth(&[1, 2]);
        let early = ndcg_at_k(&[1, 2, 8, 9], &relevant, 4);
        let late = ndcg_at_k(&[8, 9, 1, 2], &relevant, 4);
        assert!(early > late);
        assert!((early - ideal_dcg_at_k(2, 4)).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_inputs_fail_explicitly() {
        assert!(matches!(
            recall_at_k(&[1, 2], &HashSet::new(), 2),
            Err(RecoError::EmptyGroundTruth)
        ));
        assert!(matches!(
            precision_at_k(&[1, 2], &truth(&[1]), 0),
            Err(RecoError::InvalidCutoff(0))
        ));
    }
}
