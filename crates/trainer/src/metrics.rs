//! Discrimination quality
//!
//! ROC AUC computed from ranks (Mann-Whitney U), with tied scores sharing
//! their average rank.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MetricError {
    #[error("AUC is undefined when all labels belong to one class")]
    SingleClass,

    #[error("{labels} labels but {scores} scores")]
    LengthMismatch { labels: usize, scores: usize },

    #[error("score at position {index} is not a number")]
    NanScore { index: usize },
}

/// Area under the ROC curve of `scores` against binary `labels`
///
/// Fails rather than returning 0.5 when `labels` hold a single class.
pub fn roc_auc(labels: &[f64], scores: &[f64]) -> Result<f64, MetricError> {
    if labels.len() != scores.len() {
        return Err(MetricError::LengthMismatch {
            labels: labels.len(),
            scores: scores.len(),
        });
    }
    if let Some(index) = scores.iter().position(|s| s.is_nan()) {
        return Err(MetricError::NanScore { index });
    }

    let n_pos = labels.iter().filter(|&&l| l > 0.5).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(MetricError::SingleClass);
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i + 1;
        while j < order.len() && scores[order[j]] == scores[order[i]] {
            j += 1;
        }

        // ranks i+1..=j share their mean
        let avg_rank = (i + 1 + j) as f64 / 2.0;
        let tied_pos = order[i..j].iter().filter(|&&k| labels[k] > 0.5).count();
        rank_sum_pos += avg_rank * tied_pos as f64;
        i = j;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    let auc = (rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg);
    Ok(auc.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_perfect_and_inverted_ranking() {
        let labels = [0.0, 0.0, 1.0, 1.0];
        assert_eq!(roc_auc(&labels, &[0.1, 0.2, 0.8, 0.9]), Ok(1.0));
        assert_eq!(roc_auc(&labels, &[0.9, 0.8, 0.2, 0.1]), Ok(0.0));
    }

    #[test]
    fn test_ties_count_half() {
        let labels = [0.0, 1.0];
        assert_eq!(roc_auc(&labels, &[0.5, 0.5]), Ok(0.5));

        // positives win three of the four positive/negative pairs
        let labels = [0.0, 0.0, 1.0, 1.0];
        assert_eq!(roc_auc(&labels, &[0.1, 0.4, 0.35, 0.8]), Ok(0.75));
    }

    #[test]
    fn test_single_class_fails() {
        assert_eq!(
            roc_auc(&[1.0, 1.0, 1.0], &[0.2, 0.4, 0.9]),
            Err(MetricError::SingleClass)
        );
        assert_eq!(roc_auc(&[], &[]), Err(MetricError::SingleClass));
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            roc_auc(&[0.0, 1.0], &[0.5]),
            Err(MetricError::LengthMismatch { .. })
        ));
        assert_eq!(
            roc_auc(&[0.0, 1.0], &[0.5, f64::NAN]),
            Err(MetricError::NanScore { index: 1 })
        );
    }

    proptest! {
        #[test]
        fn auc_matches_pairwise_count(
            data in proptest::collection::vec((any::<bool>(), 0u8..10), 2..80),
        ) {
            let labels: Vec<f64> = data.iter().map(|(l, _)| if *l { 1.0 } else { 0.0 }).collect();
            let scores: Vec<f64> = data.iter().map(|(_, s)| f64::from(*s) / 10.0).collect();
            prop_assume!(labels.contains(&0.0) && labels.contains(&1.0));

            let mut wins = 0.0;
            let mut pairs = 0.0;
            for (i, &li) in labels.iter().enumerate() {
                for (j, &lj) in labels.iter().enumerate() {
                    if li == 1.0 && lj == 0.0 {
                        pairs += 1.0;
                        if scores[i] > scores[j] {
                            wins += 1.0;
                        } else if scores[i] == scores[j] {
                            wins += 0.5;
                        }
                    }
                }
            }

            let auc = roc_auc(&labels, &scores).unwrap();
            prop_assert!((0.0..=1.0).contains(&auc));
            prop_assert!((auc - wins / pairs).abs() < 1e-9);
        }
    }
}
