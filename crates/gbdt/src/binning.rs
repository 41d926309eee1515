//! Histogram bins for training
//!
//! Numeric features are cut into at most `max_bins` value ranges whose upper
//! bounds become split thresholds. Categorical features use one bin per
//! category code. Every feature has one extra bin for missing values.

use crate::matrix::FeatureMatrix;

/// Binning of a single feature
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureBins {
    /// Inclusive upper bound of each bin; the last bound is `+inf`
    Numeric { upper_bounds: Vec<f64> },

    /// Codes `0..n_categories`
    Categorical { n_categories: usize },
}

impl FeatureBins {
    pub fn numeric(column: &[f64], max_bins: usize) -> Self {
        FeatureBins::Numeric {
            upper_bounds: numeric_upper_bounds(column, max_bins.max(1)),
        }
    }

    pub fn categorical(column: &[f64]) -> Self {
        let n_categories = column
            .iter()
            .filter(|v| !v.is_nan() && **v >= 0.0)
            .map(|&v| v as usize + 1)
            .max()
            .unwrap_or(0);
        FeatureBins::Categorical { n_categories }
    }

    /// Number of value bins, not counting the missing bin
    pub fn n_bins(&self) -> usize {
        match self {
            FeatureBins::Numeric { upper_bounds } => upper_bounds.len(),
            FeatureBins::Categorical { n_categories } => *n_categories,
        }
    }

    pub fn missing_bin(&self) -> usize {
        self.n_bins()
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self, FeatureBins::Categorical { .. })
    }

    pub fn bin(&self, value: f64) -> usize {
        if value.is_nan() {
            return self.missing_bin();
        }
        match self {
            FeatureBins::Numeric { upper_bounds } => upper_bounds.partition_point(|&b| b < value),
            FeatureBins::Categorical { n_categories } => {
                if value < 0.0 || value as usize >= *n_categories {
                    self.missing_bin()
                } else {
                    value as usize
                }
            }
        }
    }

    /// Split threshold that sends bins `0..=bin` left
    pub fn threshold(&self, bin: usize) -> f64 {
        match self {
            FeatureBins::Numeric { upper_bounds } => upper_bounds[bin],
            FeatureBins::Categorical { .. } => bin as f64,
        }
    }
}

fn numeric_upper_bounds(column: &[f64], max_bins: usize) -> Vec<f64> {
    let mut values: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
    values.sort_by(f64::total_cmp);

    let mut distinct: Vec<(f64, usize)> = Vec::new();
    for v in values {
        match distinct.last_mut() {
            Some((last, count)) if *last == v => *count += 1,
            _ => distinct.push((v, 1)),
        }
    }

    let mut bounds = Vec::new();
    if distinct.len() <= max_bins {
        for pair in distinct.windows(2) {
            bounds.push(midpoint(pair[0].0, pair[1].0));
        }
    } else {
        let total: usize = distinct.iter().map(|(_, c)| c).sum();
        let per_bin = total as f64 / max_bins as f64;
        let mut seen = 0usize;
        for j in 0..distinct.len() - 1 {
            seen += distinct[j].1;
            if bounds.len() + 1 < max_bins && seen as f64 >= per_bin * (bounds.len() + 1) as f64 {
                bounds.push(midpoint(distinct[j].0, distinct[j + 1].0));
            }
        }
    }

    bounds.retain(|b| b.is_finite());
    bounds.push(f64::INFINITY);
    bounds
}

fn midpoint(a: f64, b: f64) -> f64 {
    a + (b - a) / 2.0
}

/// Training rows mapped to bins, column by column
#[derive(Debug, Clone)]
pub struct BinnedMatrix {
    pub bins: Vec<FeatureBins>,
    columns: Vec<Vec<u32>>,
}

impl BinnedMatrix {
    pub fn from_matrix(matrix: &FeatureMatrix, categorical: &[usize], max_bins: usize) -> Self {
        let mut bins = Vec::with_capacity(matrix.n_features());
        let mut columns = Vec::with_capacity(matrix.n_features());

        for feature in 0..matrix.n_features() {
            let column = matrix.column(feature);
            let feature_bins = if categorical.contains(&feature) {
                FeatureBins::categorical(column)
            } else {
                FeatureBins::numeric(column, max_bins)
            };
            columns.push(column.iter().map(|&v| feature_bins.bin(v) as u32).collect());
            bins.push(feature_bins);
        }

        Self { bins, columns }
    }

    pub fn n_features(&self) -> usize {
        self.bins.len()
    }

    pub fn bin(&self, feature: usize, row: usize) -> usize {
        self.columns[feature][row] as usize
    }
}
