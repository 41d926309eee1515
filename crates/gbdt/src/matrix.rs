//! Column-major feature matrix
//!
//! Categorical features are stored as category codes (`0.0, 1.0, ...`);
//! a missing value is `NaN`.

use crate::errors::{GbdtError, Result};

/// Dense feature matrix stored column by column
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureMatrix {
    n_rows: usize,
    columns: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    /// Build a matrix from feature columns that all hold `n_rows` values
    pub fn new(n_rows: usize, columns: Vec<Vec<f64>>) -> Result<Self> {
        for column in &columns {
            if column.len() != n_rows {
                return Err(GbdtError::LengthMismatch {
                    expected: n_rows,
                    actual: column.len(),
                });
            }
        }
        Ok(Self { n_rows, columns })
    }

    /// Build a matrix from row vectors of equal width
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let width = rows.first().map_or(0, Vec::len);
        let mut columns = vec![Vec::with_capacity(rows.len()); width];

        for row in rows {
            if row.len() != width {
                return Err(GbdtError::LengthMismatch {
                    expected: width,
                    actual: row.len(),
                });
            }
            for (column, &value) in columns.iter_mut().zip(row) {
                column.push(value);
            }
        }

        Ok(Self {
            n_rows: rows.len(),
            columns,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    /// All values of one feature
    pub fn column(&self, feature: usize) -> &[f64] {
        &self.columns[feature]
    }

    /// Copy one row into `out`, reusing its allocation
    pub fn fill_row(&self, row: usize, out: &mut Vec<f64>) {
        out.clear();
        out.extend(self.columns.iter().map(|column| column[row]));
    }

    /// New matrix holding the given rows, in the given order
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|column| rows.iter().map(|&r| column[r]).collect())
            .collect();

        Self {
            n_rows: rows.len(),
            columns,
        }
    }
}
