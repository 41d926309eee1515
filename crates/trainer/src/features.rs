//! Feature selection and matrix construction

use propensity_gbdt::{FeatureMatrix, Result};

use crate::dataset::Table;

/// Model inputs chosen from a normalized table
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    /// Feature names in table order
    pub names: Vec<String>,
    /// Positions in `names` of categorical features
    pub categorical: Vec<usize>,
}

impl FeatureSet {
    /// Every numeric, integer and categorical column not listed in `excluded`
    pub fn select(table: &Table, excluded: &[String]) -> Self {
        let mut names = Vec::new();
        let mut categorical = Vec::new();

        for (name, column) in table.iter() {
            if !column.is_feature_type() || excluded.iter().any(|e| e == name) {
                continue;
            }
            if column.is_categorical() {
                categorical.push(names.len());
            }
            names.push(name.to_string());
        }

        Self { names, categorical }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Column-major matrix over every row of `table`; categories are passed
    /// as their codes
    pub fn matrix(&self, table: &Table) -> Result<FeatureMatrix> {
        let n_rows = table.n_rows();
        let columns = self
            .names
            .iter()
            .map(|name| match table.column(name) {
                Some(column) => (0..n_rows).map(|row| column.feature_value(row)).collect(),
                None => vec![f64::NAN; n_rows],
            })
            .collect();

        FeatureMatrix::new(n_rows, columns)
    }
}
