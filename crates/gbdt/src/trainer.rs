//! Gradient boosting trainer
//!
//! Fits a sequence of histogram trees to the log-loss gradients of a binary
//! target. Given the same data, categorical indices and configuration the
//! produced model is identical across runs.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::binning::BinnedMatrix;
use crate::cart::{CartBuilder, TreeConfig};
use crate::deterministic::LcgRng;
use crate::errors::{GbdtError, Result};
use crate::matrix::FeatureMatrix;
use crate::model::BoostedModel;
use crate::objective::{gradients_hessians, init_score};

/// GBDT training configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbdtConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_data_in_leaf: usize,
    pub min_sum_hessian_in_leaf: f64,
    pub lambda_l2: f64,
    pub max_bins: usize,
    /// Fraction of rows sampled for each tree; 1.0 uses every row
    pub bagging_fraction: f64,
    pub cat_smooth: f64,
    pub max_cat_threshold: usize,
    pub seed: u64,
}

impl Default for GbdtConfig {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            learning_rate: 0.05,
            max_depth: 5,
            min_data_in_leaf: 20,
            min_sum_hessian_in_leaf: 1e-3,
            lambda_l2: 0.0,
            max_bins: 255,
            bagging_fraction: 1.0,
            cat_smooth: 10.0,
            max_cat_threshold: 32,
            seed: 42,
        }
    }
}

impl GbdtConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(GbdtError::InvalidConfig("n_estimators must be at least 1".into()));
        }
        if !(self.learning_rate > 0.0) {
            return Err(GbdtError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.bagging_fraction > 0.0 && self.bagging_fraction <= 1.0) {
            return Err(GbdtError::InvalidConfig(format!(
                "bagging_fraction must be in (0, 1], got {}",
                self.bagging_fraction
            )));
        }
        if self.lambda_l2 < 0.0 || self.cat_smooth < 0.0 {
            return Err(GbdtError::InvalidConfig(
                "lambda_l2 and cat_smooth must be non-negative".into(),
            ));
        }
        if self.max_bins < 2 {
            return Err(GbdtError::InvalidConfig("max_bins must be at least 2".into()));
        }
        Ok(())
    }

    fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            max_depth: self.max_depth,
            min_data_in_leaf: self.min_data_in_leaf,
            min_sum_hessian_in_leaf: self.min_sum_hessian_in_leaf,
            lambda_l2: self.lambda_l2,
            learning_rate: self.learning_rate,
            cat_smooth: self.cat_smooth,
            max_cat_threshold: self.max_cat_threshold,
        }
    }
}

/// GBDT trainer
#[derive(Clone, Debug, Default)]
pub struct GbdtTrainer {
    config: GbdtConfig,
}

impl GbdtTrainer {
    pub fn new(config: GbdtConfig) -> Self {
        Self { config }
    }

    /// Train a model; `labels` must be 0.0 or 1.0
    pub fn train(
        &self,
        features: &FeatureMatrix,
        labels: &[f64],
        categorical: &[usize],
    ) -> Result<BoostedModel> {
        self.train_until(features, labels, categorical, None)
    }

    /// Train a model, giving up between rounds once `deadline` has passed
    pub fn train_until(
        &self,
        features: &FeatureMatrix,
        labels: &[f64],
        categorical: &[usize],
        deadline: Option<Instant>,
    ) -> Result<BoostedModel> {
        self.config.validate()?;
        let categorical = Self::check_inputs(features, labels, categorical)?;

        let n_samples = features.n_rows();
        let binned = BinnedMatrix::from_matrix(features, &categorical, self.config.max_bins);
        let tree_config = self.config.tree_config();

        let init = init_score(labels);
        let mut raw_scores = vec![init; n_samples];
        let mut gradients = vec![0.0; n_samples];
        let mut hessians = vec![0.0; n_samples];

        let mut rng = LcgRng::new(self.config.seed);
        let all_rows: Vec<usize> = (0..n_samples).collect();
        let mut row = Vec::with_capacity(features.n_features());
        let mut trees = Vec::with_capacity(self.config.n_estimators);

        for round in 0..self.config.n_estimators {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(GbdtError::DeadlineExceeded {
                    completed_rounds: round,
                });
            }

            gradients_hessians(labels, &raw_scores, &mut gradients, &mut hessians);

            let rows = self.bagged_rows(&all_rows, &mut rng);
            let tree = CartBuilder::new(&tree_config, &binned, &gradients, &hessians).build(&rows);

            for (i, score) in raw_scores.iter_mut().enumerate() {
                features.fill_row(i, &mut row);
                *score += tree.evaluate(&row);
            }

            debug!(
                "Trained tree {}/{} ({} splits)",
                round + 1,
                self.config.n_estimators,
                tree.split_count()
            );
            trees.push(tree);
        }

        Ok(BoostedModel {
            init_score: init,
            trees,
            feature_count: features.n_features(),
            categorical_features: categorical,
        })
    }

    fn check_inputs(
        features: &FeatureMatrix,
        labels: &[f64],
        categorical: &[usize],
    ) -> Result<Vec<usize>> {
        if features.is_empty() {
            return Err(GbdtError::EmptyDataset);
        }
        if labels.len() != features.n_rows() {
            return Err(GbdtError::LengthMismatch {
                expected: features.n_rows(),
                actual: labels.len(),
            });
        }
        if let Some((row, &value)) = labels
            .iter()
            .enumerate()
            .find(|(_, &y)| y != 0.0 && y != 1.0)
        {
            return Err(GbdtError::InvalidLabel { row, value });
        }

        let mut categorical = categorical.to_vec();
        categorical.sort_unstable();
        categorical.dedup();
        if let Some(&index) = categorical.iter().find(|&&i| i >= features.n_features()) {
            return Err(GbdtError::InvalidCategoricalIndex {
                index,
                n_features: features.n_features(),
            });
        }

        Ok(categorical)
    }

    fn bagged_rows(&self, all_rows: &[usize], rng: &mut LcgRng) -> Vec<usize> {
        if self.config.bagging_fraction >= 1.0 {
            return all_rows.to_vec();
        }

        let take = ((all_rows.len() as f64 * self.config.bagging_fraction).ceil() as usize)
            .clamp(1, all_rows.len());
        let mut rows = all_rows.to_vec();
        rng.shuffle(&mut rows);
        rows.truncate(take);
        rows.sort_unstable();
        rows
    }
}
