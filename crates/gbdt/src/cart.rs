//! Histogram CART builder
//!
//! Grows one depth-limited regression tree on the gradients and hessians of
//! the current boosting round. Numeric features split on bin boundaries;
//! categorical features split on a set of categories ordered by their
//! gradient/hessian ratio.

use crate::binning::{BinnedMatrix, FeatureBins};
use crate::deterministic::SplitTieBreaker;
use crate::tree::{Node, SplitRule, Tree};

/// Gains at or below this are rounding noise
const MIN_SPLIT_GAIN: f64 = 1e-10;

/// Training parameters for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_data_in_leaf: usize,
    pub min_sum_hessian_in_leaf: f64,
    pub lambda_l2: f64,
    /// Shrinkage applied to leaf outputs
    pub learning_rate: f64,
    pub cat_smooth: f64,
    pub max_cat_threshold: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            min_data_in_leaf: 20,
            min_sum_hessian_in_leaf: 1e-3,
            lambda_l2: 0.0,
            learning_rate: 0.05,
            cat_smooth: 10.0,
            max_cat_threshold: 32,
        }
    }
}

/// Gradient statistics of one histogram bin or node
#[derive(Clone, Copy, Debug, Default)]
struct BinStats {
    grad: f64,
    hess: f64,
    count: usize,
}

impl BinStats {
    fn add(&mut self, other: &BinStats) {
        self.grad += other.grad;
        self.hess += other.hess;
        self.count += other.count;
    }

    fn minus(&self, other: &BinStats) -> BinStats {
        BinStats {
            grad: self.grad - other.grad,
            hess: self.hess - other.hess,
            count: self.count - other.count,
        }
    }
}

/// Split candidate with gain and tie-breaker
#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    rule: SplitRule,
    /// Indexed by bin; the missing bin is always `false`
    left_bins: Vec<bool>,
    gain: f64,
    tie_breaker: SplitTieBreaker,
}

impl SplitCandidate {
    fn beats(&self, current: &Option<SplitCandidate>) -> bool {
        match current {
            None => true,
            Some(current) => {
                self.gain > current.gain
                    || (self.gain == current.gain && self.tie_breaker < current.tie_breaker)
            }
        }
    }
}

/// Build a regression tree from binned features and per-row gradients
pub struct CartBuilder<'a> {
    config: &'a TreeConfig,
    data: &'a BinnedMatrix,
    gradients: &'a [f64],
    hessians: &'a [f64],
}

impl<'a> CartBuilder<'a> {
    pub fn new(
        config: &'a TreeConfig,
        data: &'a BinnedMatrix,
        gradients: &'a [f64],
        hessians: &'a [f64],
    ) -> Self {
        assert_eq!(gradients.len(), hessians.len());

        Self {
            config,
            data,
            gradients,
            hessians,
        }
    }

    /// Build a tree from the given training rows
    pub fn build(&self, rows: &[usize]) -> Tree {
        let mut nodes = Vec::new();
        self.build_node(rows, 0, &mut nodes);
        Tree::new(nodes)
    }

    fn build_node(&self, rows: &[usize], depth: usize, nodes: &mut Vec<Node>) -> usize {
        let current_idx = nodes.len();
        let total = self.sum_stats(rows);

        if depth >= self.config.max_depth || rows.len() < 2 * self.config.min_data_in_leaf.max(1)
        {
            nodes.push(Node::leaf(self.leaf_value(&total)));
            return current_idx;
        }

        let Some(split) = self.find_best_split(rows, &total) else {
            nodes.push(Node::leaf(self.leaf_value(&total)));
            return current_idx;
        };

        let (left_rows, right_rows) = self.partition_rows(rows, split.feature_idx, &split.left_bins);

        nodes.push(Node::internal(split.feature_idx, split.rule, split.gain));

        let left_idx = self.build_node(&left_rows, depth + 1, nodes);
        let right_idx = self.build_node(&right_rows, depth + 1, nodes);

        nodes[current_idx].left = left_idx;
        nodes[current_idx].right = right_idx;

        current_idx
    }

    fn find_best_split(&self, rows: &[usize], total: &BinStats) -> Option<SplitCandidate> {
        let mut best: Option<SplitCandidate> = None;

        for feature_idx in 0..self.data.n_features() {
            let bins = &self.data.bins[feature_idx];
            let histogram = self.histogram(feature_idx, rows);

            let candidate = if bins.is_categorical() {
                self.best_categorical_split(feature_idx, bins, &histogram, total)
            } else {
                self.best_numeric_split(feature_idx, bins, &histogram, total)
            };

            if let Some(candidate) = candidate {
                if candidate.beats(&best) {
                    best = Some(candidate);
                }
            }
        }

        best
    }

    fn histogram(&self, feature_idx: usize, rows: &[usize]) -> Vec<BinStats> {
        let bins = &self.data.bins[feature_idx];
        let mut histogram = vec![BinStats::default(); bins.n_bins() + 1];

        for &row in rows {
            let stats = &mut histogram[self.data.bin(feature_idx, row)];
            stats.grad += self.gradients[row];
            stats.hess += self.hessians[row];
            stats.count += 1;
        }

        histogram
    }

    /// Scan bin boundaries left to right; missing values stay on the right
    fn best_numeric_split(
        &self,
        feature_idx: usize,
        bins: &FeatureBins,
        histogram: &[BinStats],
        total: &BinStats,
    ) -> Option<SplitCandidate> {
        let n_bins = bins.n_bins();
        let mut best: Option<SplitCandidate> = None;
        let mut left = BinStats::default();

        for bin in 0..n_bins.saturating_sub(1) {
            left.add(&histogram[bin]);
            let right = total.minus(&left);

            if !self.admissible(&left, &right) {
                continue;
            }

            let gain = self.split_gain(&left, &right, total);
            if gain <= MIN_SPLIT_GAIN {
                continue;
            }

            let mut left_bins = vec![false; n_bins + 1];
            left_bins[..=bin].fill(true);

            let candidate = SplitCandidate {
                feature_idx,
                rule: SplitRule::Numeric {
                    threshold: bins.threshold(bin),
                },
                left_bins,
                gain,
                tie_breaker: SplitTieBreaker::new(feature_idx, bin),
            };

            if candidate.beats(&best) {
                best = Some(candidate);
            }
        }

        best
    }

    /// Order categories by gradient/hessian ratio and scan prefixes from both ends
    fn best_categorical_split(
        &self,
        feature_idx: usize,
        bins: &FeatureBins,
        histogram: &[BinStats],
        total: &BinStats,
    ) -> Option<SplitCandidate> {
        let n_bins = bins.n_bins();
        let ratio = |c: usize| histogram[c].grad / (histogram[c].hess + self.config.cat_smooth);

        let mut ascending: Vec<usize> = (0..n_bins).filter(|&c| histogram[c].count > 0).collect();
        if ascending.len() < 2 {
            return None;
        }
        ascending.sort_by(|&a, &b| ratio(a).total_cmp(&ratio(b)).then(a.cmp(&b)));
        let descending: Vec<usize> = ascending.iter().rev().copied().collect();

        let max_prefix = self.config.max_cat_threshold.max(1).min(ascending.len() - 1);
        let mut best: Option<SplitCandidate> = None;

        for (direction, order) in [ascending, descending].iter().enumerate() {
            let mut left = BinStats::default();

            for k in 0..max_prefix {
                left.add(&histogram[order[k]]);
                let right = total.minus(&left);

                if !self.admissible(&left, &right) {
                    continue;
                }

                let gain = self.split_gain(&left, &right, total);
                if gain <= MIN_SPLIT_GAIN {
                    continue;
                }

                let tie_breaker = SplitTieBreaker::new(feature_idx, direction * n_bins + k);
                let is_better = match &best {
                    None => true,
                    Some(current) => {
                        gain > current.gain
                            || (gain == current.gain && tie_breaker < current.tie_breaker)
                    }
                };
                if !is_better {
                    continue;
                }

                let mut categories: Vec<u32> = order[..=k].iter().map(|&c| c as u32).collect();
                categories.sort_unstable();

                let mut left_bins = vec![false; n_bins + 1];
                for &c in &order[..=k] {
                    left_bins[c] = true;
                }

                best = Some(SplitCandidate {
                    feature_idx,
                    rule: SplitRule::Categorical { left: categories },
                    left_bins,
                    gain,
                    tie_breaker,
                });
            }
        }

        best
    }

    fn admissible(&self, left: &BinStats, right: &BinStats) -> bool {
        let min_data = self.config.min_data_in_leaf.max(1);
        left.count >= min_data
            && right.count >= min_data
            && left.hess >= self.config.min_sum_hessian_in_leaf
            && right.hess >= self.config.min_sum_hessian_in_leaf
    }

    /// Gain = G_left²/(H_left+λ) + G_right²/(H_right+λ) - G_parent²/(H_parent+λ)
    fn split_gain(&self, left: &BinStats, right: &BinStats, parent: &BinStats) -> f64 {
        self.node_score(left) + self.node_score(right) - self.node_score(parent)
    }

    fn node_score(&self, stats: &BinStats) -> f64 {
        let denominator = stats.hess + self.config.lambda_l2;
        if denominator <= 0.0 {
            return 0.0;
        }
        stats.grad * stats.grad / denominator
    }

    /// Optimal leaf output -G/(H+λ), shrunk by the learning rate
    fn leaf_value(&self, stats: &BinStats) -> f64 {
        let denominator = stats.hess + self.config.lambda_l2;
        if denominator <= 0.0 {
            return 0.0;
        }
        -stats.grad / denominator * self.config.learning_rate
    }

    fn sum_stats(&self, rows: &[usize]) -> BinStats {
        let mut stats = BinStats::default();
        for &row in rows {
            stats.grad += self.gradients[row];
            stats.hess += self.hessians[row];
            stats.count += 1;
        }
        stats
    }

    fn partition_rows(
        &self,
        rows: &[usize],
        feature_idx: usize,
        left_bins: &[bool],
    ) -> (Vec<usize>, Vec<usize>) {
        rows.iter()
            .partition(|&&row| left_bins[self.data.bin(feature_idx, row)])
    }
}
