//! Columnar tabular dataset
//!
//! A CSV file loads as all-text columns; [`FeatureNormalizer`](crate::FeatureNormalizer)
//! turns them into numeric, integer and categorical columns.

use std::collections::{BTreeSet, HashSet};
use std::io::Read;
use std::path::Path;

use crate::errors::{PipelineError, Result};

/// Text column reinterpreted as an enumerated domain
#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalColumn {
    /// Index into `levels`; `None` marks a missing value
    pub codes: Vec<Option<u32>>,
    /// Observed values, sorted ascending
    pub levels: Vec<String>,
}

impl CategoricalColumn {
    pub fn from_text(values: &[Option<String>]) -> Self {
        let levels: Vec<String> = values
            .iter()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let codes = values
            .iter()
            .map(|value| {
                value
                    .as_ref()
                    .and_then(|v| levels.binary_search(v).ok())
                    .map(|code| code as u32)
            })
            .collect();

        Self { codes, levels }
    }

    pub fn value(&self, row: usize) -> Option<&str> {
        self.codes[row].map(|code| self.levels[code as usize].as_str())
    }
}

/// One typed column
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Text(Vec<Option<String>>),
    Float(Vec<f64>),
    Integer(Vec<i64>),
    Categorical(CategoricalColumn),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Text(values) => values.len(),
            Column::Float(values) => values.len(),
            Column::Integer(values) => values.len(),
            Column::Categorical(column) => column.codes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Column::Text(_) => "text",
            Column::Float(_) => "float",
            Column::Integer(_) => "integer",
            Column::Categorical(_) => "category",
        }
    }

    /// Whether a model can consume this column
    pub fn is_feature_type(&self) -> bool {
        !matches!(self, Column::Text(_))
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self, Column::Categorical(_))
    }

    pub fn is_missing(&self, row: usize) -> bool {
        match self {
            Column::Text(values) => values[row].is_none(),
            Column::Float(values) => values[row].is_nan(),
            Column::Integer(_) => false,
            Column::Categorical(column) => column.codes[row].is_none(),
        }
    }

    /// Value as the booster sees it: categories become their code
    pub fn feature_value(&self, row: usize) -> f64 {
        match self {
            Column::Text(_) => f64::NAN,
            Column::Float(values) => values[row],
            Column::Integer(values) => values[row] as f64,
            Column::Categorical(column) => column.codes[row].map_or(f64::NAN, f64::from),
        }
    }

    /// Human-readable cell value; `None` when missing
    pub fn display(&self, row: usize) -> Option<String> {
        match self {
            Column::Text(values) => values[row].clone(),
            Column::Float(values) => {
                let v = values[row];
                if v.is_nan() {
                    None
                } else if v.fract() == 0.0 && v.abs() < 1e15 {
                    Some(format!("{}", v as i64))
                } else {
                    Some(v.to_string())
                }
            }
            Column::Integer(values) => Some(values[row].to_string()),
            Column::Categorical(column) => column.value(row).map(str::to_string),
        }
    }
}

/// Ordered set of equally long named columns
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Column>,
    n_rows: usize,
}

impl Table {
    /// Build a table; all columns must have the same length and unique names
    pub fn from_columns(columns: Vec<(String, Column)>) -> Result<Self> {
        let n_rows = columns.first().map_or(0, |(_, c)| c.len());
        let mut seen = HashSet::new();

        for (name, column) in &columns {
            if !seen.insert(name.as_str()) {
                return Err(PipelineError::DuplicateColumn(name.clone()));
            }
            if column.len() != n_rows {
                return Err(PipelineError::ColumnLength {
                    column: name.clone(),
                    expected: n_rows,
                    actual: column.len(),
                });
            }
        }

        let (names, columns) = columns.into_iter().unzip();
        Ok(Self {
            names,
            columns,
            n_rows,
        })
    }

    /// Caller guarantees unique names and `n_rows` long columns
    pub(crate) fn from_parts(columns: Vec<(String, Column)>, n_rows: usize) -> Self {
        debug_assert!(columns.iter().all(|(_, c)| c.len() == n_rows));
        let (names, columns) = columns.into_iter().unzip();
        Self {
            names,
            columns,
            n_rows,
        }
    }

    /// Load a CSV file with a header row; every cell is read as text and
    /// empty cells are missing
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);

        let names: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut values: Vec<Vec<Option<String>>> = vec![Vec::new(); names.len()];

        for record in reader.records() {
            let record = record?;
            for (column, cell) in values.iter_mut().zip(record.iter()) {
                column.push(if cell.is_empty() {
                    None
                } else {
                    Some(cell.to_string())
                });
            }
        }

        Self::from_columns(
            names
                .into_iter()
                .zip(values.into_iter().map(Column::Text))
                .collect(),
        )
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.index_of(name).map(|i| &self.columns[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }

    /// Consume the table into its named columns
    pub fn into_columns(self) -> Vec<(String, Column)> {
        self.names.into_iter().zip(self.columns).collect()
    }
}
