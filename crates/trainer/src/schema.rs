//! Explicit schema descriptor
//!
//! Declares how each column is treated during normalization instead of
//! guessing from runtime types. [`Schema::infer`] builds a descriptor from the
//! configured well-known column names plus a content check for the rest.

use serde::{Deserialize, Serialize};

use crate::dataset::{Column, Table};

/// Declared treatment of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    /// Coerced to a number; unparsable or missing cells become -1
    Numeric,
    /// Replaced by `<name>_year` and `<name>_month` integers (-1 when unparsable)
    Date,
    /// Enumerated domain of the observed values
    Categorical,
    /// Kept as text; never a model feature
    Identifier,
    /// Binary target
    Label,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
    /// Named in the configuration rather than inferred from content.
    /// Declared numeric columns use the -1 sentinel for missing cells,
    /// inferred ones keep them missing.
    pub declared: bool,
}

/// Well-known column names of the purchase dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub label: String,
    pub identifiers: Vec<String>,
    pub dates: Vec<String>,
    pub numerics: Vec<String>,
    pub categoricals: Vec<String>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            label: "purchase".to_string(),
            identifiers: vec![
                "user_ID".to_string(),
                "sku_ID".to_string(),
                "request_time".to_string(),
            ],
            dates: vec![
                "activate_date".to_string(),
                "deactivate_date".to_string(),
                "first_order_month".to_string(),
            ],
            numerics: vec!["attribute1".to_string(), "attribute2".to_string()],
            categoricals: Vec::new(),
        }
    }
}

/// Ordered list of column declarations
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<ColumnSpec>,
}

impl Schema {
    pub fn get(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|spec| spec.name == name)
    }

    pub fn kind_of(&self, name: &str) -> Option<ColumnKind> {
        self.get(name).map(|spec| spec.kind)
    }

    /// Date columns in declaration order
    pub fn date_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|spec| spec.kind == ColumnKind::Date)
            .map(|spec| spec.name.as_str())
    }

    /// Describe every column of `table`
    ///
    /// Configured names take their configured kind. Other text columns are
    /// numeric when every present cell parses as a number, else categorical.
    /// Columns that are already typed keep a matching kind.
    pub fn infer(table: &Table, config: &SchemaConfig) -> Self {
        let columns = table
            .iter()
            .map(|(name, column)| match Self::configured_kind(name, config) {
                Some(kind) => ColumnSpec {
                    name: name.to_string(),
                    kind,
                    declared: true,
                },
                None => ColumnSpec {
                    name: name.to_string(),
                    kind: Self::kind_from_content(column),
                    declared: false,
                },
            })
            .collect();

        Self { columns }
    }

    fn configured_kind(name: &str, config: &SchemaConfig) -> Option<ColumnKind> {
        let listed = |names: &[String]| names.iter().any(|n| n == name);

        if config.label == name {
            Some(ColumnKind::Label)
        } else if listed(&config.identifiers) {
            Some(ColumnKind::Identifier)
        } else if listed(&config.dates) {
            Some(ColumnKind::Date)
        } else if listed(&config.numerics) {
            Some(ColumnKind::Numeric)
        } else if listed(&config.categoricals) {
            Some(ColumnKind::Categorical)
        } else {
            None
        }
    }

    fn kind_from_content(column: &Column) -> ColumnKind {
        match column {
            Column::Float(_) | Column::Integer(_) => ColumnKind::Numeric,
            Column::Categorical(_) => ColumnKind::Categorical,
            Column::Text(values) => {
                let mut present = values.iter().flatten().peekable();
                if present.peek().is_none() {
                    return ColumnKind::Numeric;
                }
                if present.all(|v| v.trim().parse::<f64>().is_ok()) {
                    ColumnKind::Numeric
                } else {
                    ColumnKind::Categorical
                }
            }
        }
    }
}
