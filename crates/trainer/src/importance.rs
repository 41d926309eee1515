//! Feature importance ranking

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedFeature {
    pub name: String,
    pub importance: f64,
}

/// Pair `names` with `scores`, sort by descending score and keep `top_k`
///
/// The sort is stable, so equal scores keep their column order.
pub fn rank_features(names: &[String], scores: &[f64], top_k: usize) -> Vec<RankedFeature> {
    let mut ranked: Vec<RankedFeature> = names
        .iter()
        .zip(scores)
        .map(|(name, &importance)| RankedFeature {
            name: name.clone(),
            importance,
        })
        .collect();

    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    ranked.truncate(top_k);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{i}")).collect()
    }

    #[test]
    fn test_sorted_descending_with_stable_ties() {
        let ranked = rank_features(&names(5), &[1.0, 3.0, 1.0, 0.0, 3.0], 10);
        let order: Vec<&str> = ranked.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(order, vec!["f1", "f4", "f0", "f2", "f3"]);
    }

    #[test]
    fn test_truncated_to_top_k() {
        let scores: Vec<f64> = (0..15).map(f64::from).collect();
        let ranked = rank_features(&names(15), &scores, 10);
        assert_eq!(ranked.len(), 10);
        assert_eq!(ranked[0].name, "f14");
        assert_eq!(ranked[9].name, "f5");
    }

    #[test]
    fn test_exactly_ten_features_kept() {
        let ranked = rank_features(&names(10), &[0.0; 10], 10);
        assert_eq!(ranked.len(), 10);
        assert_eq!(ranked[0].name, "f0");
    }

    proptest! {
        #[test]
        fn ranking_is_non_increasing(scores in proptest::collection::vec(0u32..50, 0..40)) {
            let scores: Vec<f64> = scores.into_iter().map(f64::from).collect();
            let ranked = rank_features(&names(scores.len()), &scores, 10);

            prop_assert_eq!(ranked.len(), scores.len().min(10));
            for pair in ranked.windows(2) {
                prop_assert!(pair[0].importance >= pair[1].importance);
            }
        }
    }
}
