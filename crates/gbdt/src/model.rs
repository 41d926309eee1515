//! Fitted boosted ensemble
//!
//! Holds the trees produced by [`GbdtTrainer`](crate::GbdtTrainer) and turns raw
//! scores into positive-class probabilities.

use serde::{Deserialize, Serialize};

use crate::matrix::FeatureMatrix;
use crate::objective::sigmoid;
use crate::tree::Tree;

/// Native feature-importance metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImportanceType {
    /// Number of splits that use the feature
    #[default]
    Split,
    /// Total loss reduction of the splits that use the feature
    Gain,
}

/// Boosted ensemble for binary classification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoostedModel {
    /// Log-odds every prediction starts from
    pub init_score: f64,

    pub trees: Vec<Tree>,

    pub feature_count: usize,

    pub categorical_features: Vec<usize>,
}

impl BoostedModel {
    /// Raw additive score (log-odds) for one row
    pub fn predict_raw(&self, features: &[f64]) -> f64 {
        self.trees
            .iter()
            .fold(self.init_score, |acc, tree| acc + tree.evaluate(features))
    }

    /// Positive-class probability for every row of `matrix`
    pub fn predict_proba(&self, matrix: &FeatureMatrix) -> Vec<f64> {
        let mut row = Vec::with_capacity(matrix.n_features());
        (0..matrix.n_rows())
            .map(|i| {
                matrix.fill_row(i, &mut row);
                sigmoid(self.predict_raw(&row))
            })
            .collect()
    }

    /// One score per feature, in feature order
    pub fn feature_importance(&self, importance_type: ImportanceType) -> Vec<f64> {
        let mut scores = vec![0.0; self.feature_count];

        for tree in &self.trees {
            for node in tree.nodes.iter().filter(|n| !n.is_leaf()) {
                if let Some(score) = scores.get_mut(node.feature_idx) {
                    *score += match importance_type {
                        ImportanceType::Split => 1.0,
                        ImportanceType::Gain => node.gain,
                    };
                }
            }
        }

        scores
    }
}
